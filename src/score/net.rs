/// Net score for a hole, floored at zero. `None` when no gross score was entered.
#[must_use]
pub fn compute_net(gross: Option<i32>, strokes: i32) -> Option<i32> {
    gross.map(|g| (g - strokes).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_scores() {
        assert_eq!(compute_net(None, 1), None);
        assert_eq!(compute_net(Some(5), 2), Some(3));
        assert_eq!(compute_net(Some(5), 7), Some(0));
        assert_eq!(compute_net(Some(4), 0), Some(4));
    }
}
