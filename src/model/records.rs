use serde::{Deserialize, Serialize};

use super::types::{MatchId, PlayerId, ScoreEntry, ScoreKey};

/// Row shape of the authoritative score source; carries precomputed handicap fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthoritativeScore {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub hole_number: i32,
    pub gross_score: Option<i32>,
    pub handicap_strokes: i32,
    pub net_score: Option<i32>,
}

impl AuthoritativeScore {
    #[must_use]
    pub fn key(&self) -> ScoreKey {
        ScoreKey::new(self.match_id, self.player_id, self.hole_number)
    }
}

impl From<&ScoreEntry> for AuthoritativeScore {
    fn from(entry: &ScoreEntry) -> Self {
        Self {
            match_id: entry.match_id,
            player_id: entry.player_id,
            hole_number: entry.hole_number,
            gross_score: entry.gross_score,
            handicap_strokes: entry.handicap_strokes,
            net_score: entry.net_score,
        }
    }
}

/// Row shape of the legacy score source: gross only.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LegacyScore {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub hole_number: i32,
    pub gross_score: Option<i32>,
}

impl LegacyScore {
    #[must_use]
    pub fn key(&self) -> ScoreKey {
        ScoreKey::new(self.match_id, self.player_id, self.hole_number)
    }
}

impl From<&ScoreEntry> for LegacyScore {
    fn from(entry: &ScoreEntry) -> Self {
        Self {
            match_id: entry.match_id,
            player_id: entry.player_id,
            hole_number: entry.hole_number,
            gross_score: entry.gross_score,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CourseHandicapRow {
    pub player_id: PlayerId,
    pub course_handicap: i32,
}
