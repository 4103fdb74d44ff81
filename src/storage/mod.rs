//! Seams to the world outside the engine: the two back-end score sources and
//! the device-local durable cache.

pub mod memory;
pub mod sqlite;

use crate::model::{
    AuthoritativeScore, CourseHandicapRow, LegacyScore, MatchId, MatchSetup, RoundId, ScoreEntry,
};
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

pub use memory::{MemoryBackend, MemoryCache};
pub use sqlite::{SqliteBackend, SqliteCache};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    message: String,
}

impl StorageError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for StorageError {}

impl From<String> for StorageError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for StorageError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::new(value.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(value.to_string())
    }
}

/// Remote score persistence. Both upserts are idempotent on
/// (match, player, hole).
#[async_trait]
pub trait ScoreBackend: Send + Sync {
    async fn read_match_setup(&self, match_id: MatchId) -> Result<MatchSetup, StorageError>;
    async fn read_course_handicaps(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<CourseHandicapRow>, StorageError>;
    async fn read_authoritative_scores(
        &self,
        match_id: MatchId,
    ) -> Result<Vec<AuthoritativeScore>, StorageError>;
    async fn read_legacy_scores(&self, match_id: MatchId)
    -> Result<Vec<LegacyScore>, StorageError>;
    async fn upsert_authoritative_score(
        &self,
        score: &AuthoritativeScore,
    ) -> Result<(), StorageError>;
    async fn upsert_legacy_score(&self, score: &LegacyScore) -> Result<(), StorageError>;
}

/// Durable key-value log on the scoring device. Keys come from
/// [`crate::model::ScoreKey::cache_key`]; an entry is pending until marked synced.
pub trait LocalCache: Send + Sync {
    fn put(&self, key: &str, entry: &ScoreEntry) -> Result<(), StorageError>;
    fn get(&self, key: &str) -> Result<Option<ScoreEntry>, StorageError>;
    fn list_pending(&self) -> Result<Vec<String>, StorageError>;
    fn mark_synced(&self, key: &str) -> Result<(), StorageError>;
}
