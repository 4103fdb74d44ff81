#![allow(dead_code)]

use rusty_best_ball::ScoreStore;
use rusty_best_ball::model::{Hole, MatchSetup, Player, PlayerId, TeamId};
use rusty_best_ball::score::ScoringRules;
use rusty_best_ball::storage::{MemoryBackend, MemoryCache};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub const MATCH_ID: i64 = 77;
pub const ROUND_ID: i64 = 700;

pub const ANN: PlayerId = 1;
pub const BEN: PlayerId = 2;
pub const CAL: PlayerId = 3;
pub const DEE: PlayerId = 4;

/// Eighteen par-4 holes with hole N ranked N-th hardest.
pub fn match_setup() -> MatchSetup {
    let player = |id, name: &str, team_id| Player {
        id,
        name: name.to_string(),
        team_id,
        handicap_index: None,
    };
    MatchSetup {
        match_id: MATCH_ID,
        round_id: ROUND_ID,
        players: vec![
            player(ANN, "Ann", TeamId::A),
            player(BEN, "Ben", TeamId::A),
            player(CAL, "Cal", TeamId::B),
            player(DEE, "Dee", TeamId::B),
        ],
        holes: (1..=18)
            .map(|number| Hole {
                number,
                par: 4,
                handicap_rank: Some(number),
            })
            .collect(),
    }
}

pub struct TestContext {
    pub backend: Arc<MemoryBackend>,
    pub cache: Arc<MemoryCache>,
    pub store: ScoreStore,
}

pub fn memory_backend(handicaps: &[(PlayerId, i32)]) -> Result<Arc<MemoryBackend>, Box<dyn Error>> {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert_setup(match_setup())?;
    for (player_id, course_handicap) in handicaps {
        backend.insert_course_handicap(ROUND_ID, *player_id, *course_handicap)?;
    }
    Ok(backend)
}

pub async fn setup_test_context(
    handicaps: &[(PlayerId, i32)],
) -> Result<TestContext, Box<dyn Error>> {
    let backend = memory_backend(handicaps)?;
    let cache = Arc::new(MemoryCache::new());
    let store = ScoreStore::new(backend.clone(), cache.clone(), ScoringRules::default());
    store.load_match(MATCH_ID).await?;
    Ok(TestContext {
        backend,
        cache,
        store,
    })
}

/// Poll until the outbox drains or a second passes.
pub async fn wait_until_synced(store: &ScoreStore) -> bool {
    for _ in 0..100 {
        if store.pending_count().await == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
