use ahash::AHashMap;

use crate::model::{MatchSetup, PlayerId, ScoreEntry, TeamHoleResult, TeamId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerNet {
    pub player_id: PlayerId,
    pub net_score: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TeamScore {
    pub best_net_score: Option<i32>,
    pub contributing_player_id: Option<PlayerId>,
}

/// Lowest net score among a team's players on one hole. Ties go to the
/// smallest player id so exactly one score is marked as counting.
#[must_use]
pub fn select_team_score(entries: &[PlayerNet]) -> TeamScore {
    entries
        .iter()
        .filter_map(|e| e.net_score.map(|net| (net, e.player_id)))
        .min()
        .map_or_else(TeamScore::default, |(net, player_id)| TeamScore {
            best_net_score: Some(net),
            contributing_player_id: Some(player_id),
        })
}

/// Team best-ball result for every hole of the match, team A before team B.
#[must_use]
pub fn team_results_for_match<'a>(
    setup: &MatchSetup,
    entries: impl IntoIterator<Item = &'a ScoreEntry>,
) -> Vec<TeamHoleResult> {
    let teams: AHashMap<PlayerId, TeamId> =
        setup.players.iter().map(|p| (p.id, p.team_id)).collect();

    let mut by_hole_team: AHashMap<(i32, TeamId), Vec<PlayerNet>> = AHashMap::new();
    for entry in entries {
        if entry.match_id != setup.match_id {
            continue;
        }
        let Some(team) = teams.get(&entry.player_id) else {
            continue;
        };
        by_hole_team
            .entry((entry.hole_number, *team))
            .or_default()
            .push(PlayerNet {
                player_id: entry.player_id,
                net_score: entry.net_score,
            });
    }

    let mut results = Vec::with_capacity(setup.holes.len() * 2);
    for hole_number in setup.hole_numbers() {
        for team_id in [TeamId::A, TeamId::B] {
            let team_score = by_hole_team
                .get(&(hole_number, team_id))
                .map(|nets| select_team_score(nets))
                .unwrap_or_default();
            results.push(TeamHoleResult {
                match_id: setup.match_id,
                hole_number,
                team_id,
                best_net_score: team_score.best_net_score,
                contributing_player_id: team_score.contributing_player_id,
            });
        }
    }
    results
}
