use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_GROSS: i32 = 1;
pub const DEFAULT_MAX_GROSS: i32 = 12;
pub const DEFAULT_MAX_STROKES_PER_HOLE: i32 = 2;
pub const DEFAULT_HOLES_PER_ROUND: i32 = 18;

/// Tunables for score capture and allocation. Defaults match the house rules.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ScoringRules {
    pub min_gross: i32,
    pub max_gross: i32,
    pub max_strokes_per_hole: i32,
    pub holes_per_round: i32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            min_gross: DEFAULT_MIN_GROSS,
            max_gross: DEFAULT_MAX_GROSS,
            max_strokes_per_hole: DEFAULT_MAX_STROKES_PER_HOLE,
            holes_per_round: DEFAULT_HOLES_PER_ROUND,
        }
    }
}

impl ScoringRules {
    #[must_use]
    pub fn gross_in_range(&self, gross: i32) -> bool {
        (self.min_gross..=self.max_gross).contains(&gross)
    }
}
