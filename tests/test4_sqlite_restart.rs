use rusty_best_ball::ScoreStore;
use rusty_best_ball::model::{Hole, MatchSetup, Player, ScoreEntry, ScoreKey, SyncState, TeamId};
use rusty_best_ball::prefill::db_prefill;
use rusty_best_ball::score::ScoringRules;
use rusty_best_ball::storage::{LocalCache, SqliteBackend, SqliteCache};
use std::error::Error;
use std::sync::Arc;

const MATCH_ID: i64 = 12;

fn prefill_json() -> serde_json::Value {
    let setup = MatchSetup {
        match_id: MATCH_ID,
        round_id: 120,
        players: vec![
            Player {
                id: 1,
                name: "Ann".into(),
                team_id: TeamId::A,
                handicap_index: Some(9.1),
            },
            Player {
                id: 2,
                name: "Cal".into(),
                team_id: TeamId::B,
                handicap_index: None,
            },
        ],
        holes: (1..=18)
            .map(|number| Hole {
                number,
                par: 4,
                handicap_rank: Some(19 - number),
            })
            .collect(),
    };
    let mut json = serde_json::to_value(setup).expect("setup serializes");
    json["course_handicaps"] = serde_json::json!([{"player_id": 1, "course_handicap": 20}]);
    json
}

#[tokio::test]
async fn test4_submit_restart_and_reload() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("scores.db");
    let cache_path = dir.path().join("cache.db");

    {
        let backend = SqliteBackend::open(&db_path)?;
        assert_eq!(db_prefill(&prefill_json(), &backend).await?, 1);
        let store = ScoreStore::new(
            Arc::new(backend),
            Arc::new(SqliteCache::open(&cache_path)?),
            ScoringRules::default(),
        );
        store.load_match(MATCH_ID).await?;
        // Hole 18 is ranked 1: 20 handicap gives one stroke everywhere plus one on ranks 1-2.
        assert!(store.submit_score(MATCH_ID, 1, 18, Some(6)).await.is_accepted());
        assert!(store.submit_score(MATCH_ID, 1, 1, Some(5)).await.is_accepted());
        assert!(store.submit_score(MATCH_ID, 2, 18, Some(5)).await.is_accepted());
        store.settle().await;
        assert_eq!(store.pending_count().await, 0);
    }

    let store = ScoreStore::new(
        Arc::new(SqliteBackend::open(&db_path)?),
        Arc::new(SqliteCache::open(&cache_path)?),
        ScoringRules::default(),
    );
    store.load_match(MATCH_ID).await?;

    let hole18 = store
        .entry(ScoreKey::new(MATCH_ID, 1, 18))
        .await
        .ok_or("missing hole 18")?;
    assert_eq!(hole18.gross_score, Some(6));
    assert_eq!(hole18.handicap_strokes, 2);
    assert_eq!(hole18.net_score, Some(4));
    assert_eq!(hole18.sync_state, SyncState::Clean);

    let hole1 = store
        .entry(ScoreKey::new(MATCH_ID, 1, 1))
        .await
        .ok_or("missing hole 1")?;
    assert_eq!(hole1.handicap_strokes, 1);
    assert_eq!(hole1.net_score, Some(4));

    let standing = store.get_standing(MATCH_ID).await;
    assert_eq!(standing.through_hole, 18);
    assert_eq!(standing.leading_team, Some(TeamId::A));
    Ok(())
}

#[tokio::test]
async fn test4_offline_edit_survives_restart() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("scores.db");
    let cache_path = dir.path().join("cache.db");
    let backend = SqliteBackend::open(&db_path)?;
    db_prefill(&prefill_json(), &backend).await?;

    // Capture to the durable cache only, as if the device lost power before any upload.
    let key = ScoreKey::new(MATCH_ID, 2, 3);
    {
        let cache = SqliteCache::open(&cache_path)?;
        cache.put(
            &key.cache_key(),
            &ScoreEntry {
                match_id: MATCH_ID,
                player_id: 2,
                hole_number: 3,
                gross_score: Some(7),
                handicap_strokes: 0,
                net_score: Some(7),
                sync_state: SyncState::Pending,
            },
        )?;
    }

    let cache = Arc::new(SqliteCache::open(&cache_path)?);
    let store = ScoreStore::new(Arc::new(backend), cache.clone(), ScoringRules::default());
    store.mount(MATCH_ID).await?;
    store.settle().await;

    let entry = store.entry(key).await.ok_or("missing entry")?;
    assert_eq!(entry.gross_score, Some(7));
    assert_eq!(entry.sync_state, SyncState::Clean);
    assert!(cache.list_pending()?.is_empty());
    Ok(())
}
