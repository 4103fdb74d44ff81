use serde::Deserialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{CourseHandicapRow, MatchSetup};
use crate::storage::SqliteBackend;

/// One match to import, as found in a prefill file:
///
/// ```json
/// [{ "match_id": 1, "round_id": 7,
///    "players": [{"id": 1, "name": "Ann", "team_id": "A", "handicap_index": 9.4}],
///    "holes": [{"number": 1, "par": 4, "handicap_rank": 5}],
///    "course_handicaps": [{"player_id": 1, "course_handicap": 10}] }]
/// ```
#[derive(Debug, Deserialize)]
pub struct MatchImport {
    #[serde(flatten)]
    pub setup: MatchSetup,
    #[serde(default)]
    pub course_handicaps: Vec<CourseHandicapRow>,
}

/// Accepts a single match object or an array of them.
///
/// # Errors
/// Returns `CoreError::Parse` if the JSON does not describe matches.
pub fn parse_match_imports(json: &Value) -> Result<Vec<MatchImport>, CoreError> {
    if json.is_array() {
        Ok(serde_json::from_value(json.clone())?)
    } else {
        Ok(vec![serde_json::from_value(json.clone())?])
    }
}

/// Store every match in the file. Returns the number of matches written.
///
/// # Errors
/// Returns an error if the JSON is malformed or a write fails.
pub async fn db_prefill(json: &Value, backend: &SqliteBackend) -> Result<usize, CoreError> {
    let imports = parse_match_imports(json)?;
    for import in &imports {
        backend.store_match_setup(&import.setup).await?;
        for row in &import.course_handicaps {
            backend
                .store_course_handicap(import.setup.round_id, row.player_id, row.course_handicap)
                .await?;
        }
        tracing::info!(
            match_id = import.setup.match_id,
            players = import.setup.players.len(),
            holes = import.setup.holes.len(),
            "match imported"
        );
    }
    Ok(imports.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ScoreBackend;

    #[tokio::test]
    async fn imports_single_object() {
        let json = serde_json::json!({
            "match_id": 3,
            "round_id": 30,
            "players": [
                {"id": 1, "name": "Ann", "team_id": "A", "handicap_index": null},
                {"id": 2, "name": "Bo", "team_id": "B", "handicap_index": 4.0}
            ],
            "holes": [{"number": 1, "par": 4, "handicap_rank": 3}],
            "course_handicaps": [{"player_id": 2, "course_handicap": 5}]
        });
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert_eq!(db_prefill(&json, &backend).await.unwrap(), 1);
        let setup = backend.read_match_setup(3).await.unwrap();
        assert_eq!(setup.players.len(), 2);
        assert_eq!(backend.read_course_handicaps(30).await.unwrap().len(), 1);
    }

    #[test]
    fn rejects_non_match_json() {
        assert!(parse_match_imports(&serde_json::json!({"hello": 1})).is_err());
    }
}
