use crate::model::Hole;

use super::rules::{DEFAULT_HOLES_PER_ROUND, DEFAULT_MAX_STROKES_PER_HOLE};

/// Strokes a player receives on a hole, given their course handicap and the
/// hole's difficulty rank (1 = hardest).
///
/// One stroke on every hole per full 18 of handicap, plus one more on the
/// holes ranked at or below the remainder. Capped at two strokes.
#[must_use]
pub fn compute_strokes(course_handicap: i32, hole_handicap_rank: i32) -> i32 {
    allocate_strokes(
        course_handicap,
        hole_handicap_rank,
        DEFAULT_MAX_STROKES_PER_HOLE,
    )
}

#[must_use]
pub fn allocate_strokes(course_handicap: i32, hole_handicap_rank: i32, max_strokes: i32) -> i32 {
    if hole_handicap_rank <= 0 {
        return 0;
    }
    let course_handicap = course_handicap.max(0);
    let full_rounds = course_handicap / DEFAULT_HOLES_PER_ROUND;
    let remainder = course_handicap % DEFAULT_HOLES_PER_ROUND;
    let extra = i32::from(hole_handicap_rank <= remainder);
    (full_rounds + extra).clamp(0, max_strokes.max(0))
}

/// Same as [`allocate_strokes`], treating an unranked hole as receiving nothing.
#[must_use]
pub fn strokes_for_hole(course_handicap: i32, hole: &Hole, max_strokes: i32) -> i32 {
    hole.handicap_rank
        .map_or(0, |rank| allocate_strokes(course_handicap, rank, max_strokes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_allocations() {
        assert_eq!(compute_strokes(10, 5), 1);
        assert_eq!(compute_strokes(19, 1), 2);
        assert_eq!(compute_strokes(8, 9), 0);
        assert_eq!(compute_strokes(36, 18), 2);
    }

    #[test]
    fn unranked_or_negative_gets_nothing() {
        assert_eq!(compute_strokes(20, 0), 0);
        assert_eq!(compute_strokes(20, -3), 0);
        assert_eq!(compute_strokes(-4, 1), 0);
        let hole = Hole {
            number: 7,
            par: 4,
            handicap_rank: None,
        };
        assert_eq!(strokes_for_hole(30, &hole, 2), 0);
    }

    #[test]
    fn bounded_and_monotonic_in_handicap() {
        for rank in 1..=18 {
            let mut previous = 0;
            for handicap in 0..=40 {
                let strokes = compute_strokes(handicap, rank);
                assert!((0..=2).contains(&strokes), "hcp {handicap} rank {rank}");
                assert!(strokes >= previous, "hcp {handicap} rank {rank}");
                previous = strokes;
            }
        }
    }

    #[test]
    fn full_eighteen_spreads_one_per_hole() {
        let total: i32 = (1..=18).map(|rank| compute_strokes(18, rank)).sum();
        assert_eq!(total, 18);
        let total: i32 = (1..=18).map(|rank| compute_strokes(5, rank)).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn custom_cap() {
        assert_eq!(allocate_strokes(54, 1, 3), 3);
        assert_eq!(allocate_strokes(54, 1, 1), 1);
    }
}
