use ahash::AHashMap;

use crate::model::{MatchStanding, TeamHoleResult, TeamId};

use super::rules::DEFAULT_HOLES_PER_ROUND;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchState {
    InProgress {
        aviator_wins: i32,
        producer_wins: i32,
        through_hole: i32,
    },
    Decided {
        leading_team: TeamId,
        margin_holes: i32,
        deciding_hole: i32,
    },
}

impl Default for MatchState {
    fn default() -> Self {
        Self::InProgress {
            aviator_wins: 0,
            producer_wins: 0,
            through_hole: 0,
        }
    }
}

/// Both teams' best net score on one hole. `None` means the team has not
/// posted a score there yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoleOutcome {
    pub hole_number: i32,
    pub aviator_best: Option<i32>,
    pub producer_best: Option<i32>,
}

/// One step of the match-play state machine.
///
/// Holes must arrive in ascending order. A hole missing either team's score
/// is ignored entirely. Once decided, the state no longer changes.
#[must_use]
pub fn update(state: MatchState, outcome: HoleOutcome, holes_per_round: i32) -> MatchState {
    let MatchState::InProgress {
        mut aviator_wins,
        mut producer_wins,
        ..
    } = state
    else {
        return state;
    };
    let (Some(aviator_best), Some(producer_best)) = (outcome.aviator_best, outcome.producer_best)
    else {
        return state;
    };

    match aviator_best.cmp(&producer_best) {
        std::cmp::Ordering::Less => aviator_wins += 1,
        std::cmp::Ordering::Greater => producer_wins += 1,
        std::cmp::Ordering::Equal => {}
    }

    let margin = (aviator_wins - producer_wins).abs();
    let remaining = holes_per_round - outcome.hole_number;
    if margin > remaining {
        let leading_team = if aviator_wins > producer_wins {
            TeamId::A
        } else {
            TeamId::B
        };
        return MatchState::Decided {
            leading_team,
            margin_holes: margin,
            deciding_hole: outcome.hole_number,
        };
    }

    MatchState::InProgress {
        aviator_wins,
        producer_wins,
        through_hole: outcome.hole_number,
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MatchStatusTracker {
    state: MatchState,
    holes_per_round: i32,
}

impl Default for MatchStatusTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HOLES_PER_ROUND)
    }
}

impl MatchStatusTracker {
    #[must_use]
    pub fn new(holes_per_round: i32) -> Self {
        Self {
            state: MatchState::default(),
            holes_per_round,
        }
    }

    pub fn record(&mut self, outcome: HoleOutcome) -> &mut Self {
        self.state = update(self.state, outcome, self.holes_per_round);
        self
    }

    #[must_use]
    pub fn state(&self) -> MatchState {
        self.state
    }

    /// Leading by exactly the number of holes left: the trailing team can at
    /// best halve the match.
    #[must_use]
    pub fn is_dormie(&self) -> bool {
        match self.state {
            MatchState::InProgress {
                aviator_wins,
                producer_wins,
                through_hole,
            } => {
                let margin = (aviator_wins - producer_wins).abs();
                margin > 0 && margin == self.holes_per_round - through_hole
            }
            MatchState::Decided { .. } => false,
        }
    }

    #[must_use]
    pub fn standing(&self) -> MatchStanding {
        match self.state {
            MatchState::InProgress {
                aviator_wins,
                producer_wins,
                through_hole,
            } => {
                let leading_team = match aviator_wins.cmp(&producer_wins) {
                    std::cmp::Ordering::Greater => Some(TeamId::A),
                    std::cmp::Ordering::Less => Some(TeamId::B),
                    std::cmp::Ordering::Equal => None,
                };
                MatchStanding {
                    through_hole,
                    leading_team,
                    margin_holes: (aviator_wins - producer_wins).abs(),
                    is_decided: false,
                    deciding_hole: None,
                }
            }
            MatchState::Decided {
                leading_team,
                margin_holes,
                deciding_hole,
            } => MatchStanding {
                through_hole: deciding_hole,
                leading_team: Some(leading_team),
                margin_holes,
                is_decided: true,
                deciding_hole: Some(deciding_hole),
            },
        }
    }
}

/// Pairs up per-team results by hole, in ascending hole order.
#[must_use]
pub fn hole_outcomes(results: &[TeamHoleResult]) -> Vec<HoleOutcome> {
    let mut by_hole: AHashMap<i32, HoleOutcome> = AHashMap::new();
    for result in results {
        let outcome = by_hole
            .entry(result.hole_number)
            .or_insert_with(|| HoleOutcome {
                hole_number: result.hole_number,
                aviator_best: None,
                producer_best: None,
            });
        match result.team_id {
            TeamId::A => outcome.aviator_best = result.best_net_score,
            TeamId::B => outcome.producer_best = result.best_net_score,
        }
    }
    let mut outcomes: Vec<HoleOutcome> = by_hole.into_values().collect();
    outcomes.sort_by_key(|o| o.hole_number);
    outcomes
}

#[must_use]
pub fn standing_from_results(results: &[TeamHoleResult], holes_per_round: i32) -> MatchStanding {
    let mut tracker = MatchStatusTracker::new(holes_per_round);
    for outcome in hole_outcomes(results) {
        tracker.record(outcome);
    }
    tracker.standing()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hole(hole_number: i32, aviator_best: Option<i32>, producer_best: Option<i32>) -> HoleOutcome {
        HoleOutcome {
            hole_number,
            aviator_best,
            producer_best,
        }
    }

    #[test]
    fn starts_all_square() {
        let tracker = MatchStatusTracker::default();
        let standing = tracker.standing();
        assert_eq!(standing.through_hole, 0);
        assert_eq!(standing.leading_team, None);
        assert_eq!(standing.label(), "AS");
    }

    #[test]
    fn aviators_three_up_clinch_on_sixteen() {
        let mut tracker = MatchStatusTracker::default();
        for n in 1..=3 {
            tracker.record(hole(n, Some(3), Some(4)));
        }
        let after_three = tracker.standing();
        assert_eq!(after_three.leading_team, Some(TeamId::A));
        assert_eq!(after_three.margin_holes, 3);
        assert!(!after_three.is_decided);
        assert_eq!(after_three.label(), "Aviators 3 UP");

        for n in 4..=15 {
            tracker.record(hole(n, Some(4), Some(4)));
        }
        assert!(!tracker.standing().is_decided);
        assert!(tracker.is_dormie());

        tracker.record(hole(16, Some(4), Some(4)));
        let after_sixteen = tracker.standing();
        assert!(after_sixteen.is_decided);
        assert_eq!(after_sixteen.deciding_hole, Some(16));
        assert_eq!(after_sixteen.margin_holes, 3);

        // Nothing after the clinch moves the standing.
        tracker.record(hole(17, Some(6), Some(2)));
        tracker.record(hole(18, Some(6), Some(2)));
        assert_eq!(tracker.standing(), after_sixteen);
    }

    #[test]
    fn incomplete_hole_is_ignored() {
        let mut tracker = MatchStatusTracker::default();
        tracker.record(hole(1, Some(3), Some(5)));
        tracker.record(hole(2, None, Some(2)));
        tracker.record(hole(3, Some(2), None));
        let standing = tracker.standing();
        assert_eq!(standing.through_hole, 1);
        assert_eq!(standing.margin_holes, 1);
        assert_eq!(standing.leading_team, Some(TeamId::A));
    }

    #[test]
    fn producers_lead_and_halved_holes() {
        let mut tracker = MatchStatusTracker::default();
        tracker.record(hole(1, Some(5), Some(4)));
        tracker.record(hole(2, Some(4), Some(4)));
        let standing = tracker.standing();
        assert_eq!(standing.leading_team, Some(TeamId::B));
        assert_eq!(standing.label(), "Producers 1 UP");
        assert_eq!(standing.through_hole, 2);
    }

    #[test]
    fn standing_from_unsorted_results() {
        let result = |hole_number, team_id, best| TeamHoleResult {
            match_id: 1,
            hole_number,
            team_id,
            best_net_score: best,
            contributing_player_id: best.map(|_| 1),
        };
        let results = vec![
            result(2, TeamId::B, Some(3)),
            result(1, TeamId::A, Some(3)),
            result(2, TeamId::A, Some(5)),
            result(1, TeamId::B, Some(4)),
        ];
        let standing = standing_from_results(&results, 18);
        assert_eq!(standing.through_hole, 2);
        assert_eq!(standing.margin_holes, 0);
        assert_eq!(standing.leading_team, None);
    }
}
