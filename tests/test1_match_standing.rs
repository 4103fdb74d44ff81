mod common;

use common::{ANN, BEN, CAL, DEE, MATCH_ID, setup_test_context};
use rusty_best_ball::model::{ScoreKey, TeamId};
use std::error::Error;

async fn post_hole(
    ctx: &common::TestContext,
    hole: i32,
    gross: [i32; 4],
) -> Result<(), Box<dyn Error>> {
    for (player_id, g) in [ANN, BEN, CAL, DEE].into_iter().zip(gross) {
        let outcome = ctx.store.submit_score(MATCH_ID, player_id, hole, Some(g)).await;
        assert!(outcome.is_accepted(), "hole {hole} player {player_id}: {outcome:?}");
    }
    Ok(())
}

#[tokio::test]
async fn test1_aviators_clinch_on_sixteen() -> Result<(), Box<dyn Error>> {
    let ctx = setup_test_context(&[]).await?;

    for hole in 1..=3 {
        post_hole(&ctx, hole, [3, 5, 4, 4]).await?;
    }
    let standing = ctx.store.get_standing(MATCH_ID).await;
    assert_eq!(standing.through_hole, 3);
    assert_eq!(standing.leading_team, Some(TeamId::A));
    assert_eq!(standing.margin_holes, 3);
    assert!(!standing.is_decided);
    assert_eq!(standing.label(), "Aviators 3 UP");

    for hole in 4..=15 {
        post_hole(&ctx, hole, [4, 5, 4, 6]).await?;
    }
    assert!(!ctx.store.get_standing(MATCH_ID).await.is_decided);

    post_hole(&ctx, 16, [4, 4, 4, 4]).await?;
    let standing = ctx.store.get_standing(MATCH_ID).await;
    assert!(standing.is_decided);
    assert_eq!(standing.deciding_hole, Some(16));
    assert_eq!(standing.margin_holes, 3);

    // Producers sweep the rest; the match was already decided.
    for hole in 17..=18 {
        post_hole(&ctx, hole, [6, 6, 2, 2]).await?;
    }
    let after = ctx.store.get_standing(MATCH_ID).await;
    assert_eq!(after, standing);

    ctx.store.settle().await;
    Ok(())
}

#[tokio::test]
async fn test1_best_ball_uses_net_and_lowest_id_on_ties() -> Result<(), Box<dyn Error>> {
    // Ben gets a stroke on holes ranked 1..=10.
    let ctx = setup_test_context(&[(BEN, 10)]).await?;

    // Hole 1: Ann 4 net 4, Ben 5 net 4 -> tie, Ann (id 1) counts.
    post_hole(&ctx, 1, [4, 5, 5, 6]).await?;
    // Hole 12: no stroke for Ben, so Ann's 4 beats his 5.
    post_hole(&ctx, 12, [4, 5, 3, 3]).await?;

    let entry = ctx
        .store
        .entry(ScoreKey::new(MATCH_ID, BEN, 1))
        .await
        .ok_or("missing entry")?;
    assert_eq!(entry.handicap_strokes, 1);
    assert_eq!(entry.net_score, Some(4));

    let results = ctx.store.get_team_results(MATCH_ID).await;
    assert_eq!(results.len(), 36);
    let find = |hole, team| {
        results
            .iter()
            .find(|r| r.hole_number == hole && r.team_id == team)
            .cloned()
    };

    let hole1_a = find(1, TeamId::A).ok_or("hole 1 A")?;
    assert_eq!(hole1_a.best_net_score, Some(4));
    assert_eq!(hole1_a.contributing_player_id, Some(ANN));

    let hole12_b = find(12, TeamId::B).ok_or("hole 12 B")?;
    assert_eq!(hole12_b.best_net_score, Some(3));
    assert_eq!(hole12_b.contributing_player_id, Some(CAL));

    let hole2_a = find(2, TeamId::A).ok_or("hole 2 A")?;
    assert_eq!(hole2_a.best_net_score, None);
    assert_eq!(hole2_a.contributing_player_id, None);

    // Hole 1: 4 vs 5 to Aviators; hole 12: 4 vs 3 to Producers.
    let standing = ctx.store.get_standing(MATCH_ID).await;
    assert_eq!(standing.through_hole, 12);
    assert_eq!(standing.leading_team, None);
    assert_eq!(standing.label(), "AS");

    ctx.store.settle().await;
    Ok(())
}

#[tokio::test]
async fn test1_hole_missing_one_side_does_not_count() -> Result<(), Box<dyn Error>> {
    let ctx = setup_test_context(&[]).await?;

    ctx.store.submit_score(MATCH_ID, ANN, 1, Some(3)).await;
    ctx.store.submit_score(MATCH_ID, CAL, 1, Some(5)).await;
    // Only the Aviators have posted on hole 2.
    ctx.store.submit_score(MATCH_ID, BEN, 2, Some(2)).await;

    let standing = ctx.store.get_standing(MATCH_ID).await;
    assert_eq!(standing.through_hole, 1);
    assert_eq!(standing.margin_holes, 1);
    assert_eq!(standing.leading_team, Some(TeamId::A));

    // Clearing the only Producers score on hole 1 takes it off the board.
    ctx.store.submit_score(MATCH_ID, CAL, 1, None).await;
    let standing = ctx.store.get_standing(MATCH_ID).await;
    assert_eq!(standing.through_hole, 0);
    assert_eq!(standing.label(), "AS");

    ctx.store.settle().await;
    Ok(())
}
