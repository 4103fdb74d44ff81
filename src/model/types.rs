use serde::{Deserialize, Serialize};
use std::fmt;

pub type MatchId = i64;
pub type PlayerId = i64;
pub type RoundId = i64;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TeamId {
    A,
    B,
}

impl TeamId {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TeamId::A => "Aviators",
            TeamId::B => "Producers",
        }
    }

    /// Accepts the short code or the team name, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" | "aviators" => Some(TeamId::A),
            "b" | "producers" => Some(TeamId::B),
            _ => None,
        }
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Hole {
    pub number: i32,
    pub par: i32,
    pub handicap_rank: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team_id: TeamId,
    pub handicap_index: Option<f32>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CourseHandicap {
    pub player_id: PlayerId,
    pub round_id: RoundId,
    pub value: i32,
}

/// Everything the engine needs to know about a match before it can score it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MatchSetup {
    pub match_id: MatchId,
    pub round_id: RoundId,
    pub players: Vec<Player>,
    pub holes: Vec<Hole>,
}

impl MatchSetup {
    #[must_use]
    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    #[must_use]
    pub fn hole(&self, hole_number: i32) -> Option<&Hole> {
        self.holes.iter().find(|h| h.number == hole_number)
    }

    /// Hole numbers in ascending order.
    #[must_use]
    pub fn hole_numbers(&self) -> Vec<i32> {
        let mut numbers: Vec<i32> = self.holes.iter().map(|h| h.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScoreKey {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub hole_number: i32,
}

impl ScoreKey {
    #[must_use]
    pub fn new(match_id: MatchId, player_id: PlayerId, hole_number: i32) -> Self {
        Self {
            match_id,
            player_id,
            hole_number,
        }
    }

    /// Opaque key used by the local durable cache.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.match_id, self.player_id, self.hole_number)
    }

    #[must_use]
    pub fn from_cache_key(key: &str) -> Option<Self> {
        let mut parts = key.split(':');
        let match_id = parts.next()?.parse().ok()?;
        let player_id = parts.next()?.parse().ok()?;
        let hole_number = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(match_id, player_id, hole_number))
    }
}

impl fmt::Display for ScoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "match {} player {} hole {}",
            self.match_id, self.player_id, self.hole_number
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Clean,
    Pending,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Clean => "clean",
            SyncState::Pending => "pending",
            SyncState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ScoreEntry {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub hole_number: i32,
    pub gross_score: Option<i32>,
    pub handicap_strokes: i32,
    pub net_score: Option<i32>,
    pub sync_state: SyncState,
}

impl ScoreEntry {
    #[must_use]
    pub fn key(&self) -> ScoreKey {
        ScoreKey::new(self.match_id, self.player_id, self.hole_number)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TeamHoleResult {
    pub match_id: MatchId,
    pub hole_number: i32,
    pub team_id: TeamId,
    pub best_net_score: Option<i32>,
    pub contributing_player_id: Option<PlayerId>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MatchStanding {
    pub through_hole: i32,
    pub leading_team: Option<TeamId>,
    pub margin_holes: i32,
    pub is_decided: bool,
    pub deciding_hole: Option<i32>,
}

impl MatchStanding {
    /// "AS" when all square, otherwise "<n> UP" prefixed with the leader.
    #[must_use]
    pub fn label(&self) -> String {
        match self.leading_team {
            Some(team) if self.margin_holes > 0 => format!("{team} {} UP", self.margin_holes),
            _ => "AS".to_string(),
        }
    }
}
