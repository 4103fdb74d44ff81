use crate::error::CoreError;

use super::rules::ScoringRules;

/// Check a gross score against the accepted range. `None` clears the hole.
///
/// # Errors
/// Returns `CoreError::Validation` when the score is outside the allowed range.
pub fn validate_gross(gross: Option<i32>, rules: &ScoringRules) -> Result<Option<i32>, CoreError> {
    match gross {
        None => Ok(None),
        Some(g) if rules.gross_in_range(g) => Ok(Some(g)),
        Some(g) => Err(CoreError::Validation(format!(
            "gross score {g} outside {}..={}",
            rules.min_gross, rules.max_gross
        ))),
    }
}

/// Parse text from a score input box. Blank input clears the score.
///
/// # Errors
/// Returns `CoreError::Validation` for non-numeric or out-of-range input.
pub fn parse_gross_input(raw: &str, rules: &ScoringRules) -> Result<Option<i32>, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let gross = trimmed
        .parse::<i32>()
        .map_err(|_| CoreError::Validation(format!("gross score '{trimmed}' is not a number")))?;
    validate_gross(Some(gross), rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_house_range_and_blank() {
        let rules = ScoringRules::default();
        assert_eq!(parse_gross_input(" 4 ", &rules).unwrap(), Some(4));
        assert_eq!(parse_gross_input("1", &rules).unwrap(), Some(1));
        assert_eq!(parse_gross_input("12", &rules).unwrap(), Some(12));
        assert_eq!(parse_gross_input("", &rules).unwrap(), None);
        assert_eq!(validate_gross(None, &rules).unwrap(), None);
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        let rules = ScoringRules::default();
        assert!(parse_gross_input("0", &rules).is_err());
        assert!(parse_gross_input("13", &rules).is_err());
        assert!(parse_gross_input("-2", &rules).is_err());
        assert!(parse_gross_input("4.5", &rules).is_err());
        assert!(parse_gross_input("five", &rules).is_err());
    }
}
