use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{LocalCache, ScoreBackend, StorageError};
use crate::model::{
    AuthoritativeScore, CourseHandicapRow, Hole, LegacyScore, MatchId, MatchSetup, Player,
    RoundId, ScoreEntry, SyncState, TeamId,
};

const BACKEND_SCHEMA: &str = include_str!("sql/backend_schema.sql");
const CACHE_SCHEMA: &str = include_str!("sql/cache_schema.sql");

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn team_code(team: TeamId) -> &'static str {
    match team {
        TeamId::A => "A",
        TeamId::B => "B",
    }
}

/// Both back-end score sources plus the match roster, in one SQLite file.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the database file and ensure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the schema fails to apply.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// # Errors
    /// Returns an error if the schema fails to apply.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(BACKEND_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn interact<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::new("sqlite connection lock poisoned"))?;
            f(&mut *guard).map_err(StorageError::from)
        })
        .await
        .map_err(|e| StorageError::new(e.to_string()))?
    }

    /// Replace the roster and holes for a match.
    ///
    /// # Errors
    /// Returns an error if any statement fails; the transaction is rolled back.
    pub async fn store_match_setup(&self, setup: &MatchSetup) -> Result<(), StorageError> {
        let setup = setup.clone();
        self.interact(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO golf_match (match_id, round_id) VALUES (?1, ?2)
                 ON CONFLICT (match_id) DO UPDATE SET round_id = excluded.round_id",
                params![setup.match_id, setup.round_id],
            )?;
            tx.execute(
                "DELETE FROM match_player WHERE match_id = ?1",
                params![setup.match_id],
            )?;
            tx.execute(
                "DELETE FROM match_hole WHERE match_id = ?1",
                params![setup.match_id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO match_player (match_id, player_id, name, team_id, handicap_index)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for player in &setup.players {
                    stmt.execute(params![
                        setup.match_id,
                        player.id,
                        player.name,
                        team_code(player.team_id),
                        player.handicap_index.map(f64::from),
                    ])?;
                }
                let mut stmt = tx.prepare(
                    "INSERT INTO match_hole (match_id, hole_number, par, handicap_rank)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for hole in &setup.holes {
                    stmt.execute(params![
                        setup.match_id,
                        hole.number,
                        hole.par,
                        hole.handicap_rank
                    ])?;
                }
            }
            tx.commit()
        })
        .await
    }

    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn store_course_handicap(
        &self,
        round_id: RoundId,
        player_id: i64,
        course_handicap: i32,
    ) -> Result<(), StorageError> {
        self.interact(move |conn| {
            conn.execute(
                "INSERT INTO course_handicap (round_id, player_id, course_handicap)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (round_id, player_id)
                 DO UPDATE SET course_handicap = excluded.course_handicap",
                params![round_id, player_id, course_handicap],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ScoreBackend for SqliteBackend {
    async fn read_match_setup(&self, match_id: MatchId) -> Result<MatchSetup, StorageError> {
        let setup = self
            .interact(move |conn| {
                let round_id: Option<RoundId> = conn
                    .query_row(
                        "SELECT round_id FROM golf_match WHERE match_id = ?1",
                        params![match_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(round_id) = round_id else {
                    return Ok(None);
                };

                let mut stmt = conn.prepare(
                    "SELECT player_id, name, team_id, handicap_index
                     FROM match_player WHERE match_id = ?1 ORDER BY player_id",
                )?;
                let players = stmt
                    .query_map(params![match_id], |row| {
                        let team: String = row.get(2)?;
                        let handicap_index: Option<f64> = row.get(3)?;
                        let team_id = TeamId::parse(&team).ok_or_else(|| {
                            rusqlite::Error::FromSqlConversionFailure(
                                2,
                                Type::Text,
                                Box::new(StorageError::new(format!("unknown team code {team}"))),
                            )
                        })?;
                        Ok(Player {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            team_id,
                            handicap_index: handicap_index.map(|v| v as f32),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut stmt = conn.prepare(
                    "SELECT hole_number, par, handicap_rank
                     FROM match_hole WHERE match_id = ?1 ORDER BY hole_number",
                )?;
                let holes = stmt
                    .query_map(params![match_id], |row| {
                        Ok(Hole {
                            number: row.get(0)?,
                            par: row.get(1)?,
                            handicap_rank: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Some(MatchSetup {
                    match_id,
                    round_id,
                    players,
                    holes,
                }))
            })
            .await?;
        setup.ok_or_else(|| StorageError::new(format!("match {match_id} not found")))
    }

    async fn read_course_handicaps(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<CourseHandicapRow>, StorageError> {
        self.interact(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT player_id, course_handicap FROM course_handicap
                 WHERE round_id = ?1 ORDER BY player_id",
            )?;
            let rows = stmt.query_map(params![round_id], |row| {
                Ok(CourseHandicapRow {
                    player_id: row.get(0)?,
                    course_handicap: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn read_authoritative_scores(
        &self,
        match_id: MatchId,
    ) -> Result<Vec<AuthoritativeScore>, StorageError> {
        self.interact(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT player_id, hole_number, gross_score, handicap_strokes, net_score
                 FROM match_score WHERE match_id = ?1 ORDER BY hole_number, player_id",
            )?;
            let rows = stmt.query_map(params![match_id], |row| {
                Ok(AuthoritativeScore {
                    match_id,
                    player_id: row.get(0)?,
                    hole_number: row.get(1)?,
                    gross_score: row.get(2)?,
                    handicap_strokes: row.get(3)?,
                    net_score: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn read_legacy_scores(
        &self,
        match_id: MatchId,
    ) -> Result<Vec<LegacyScore>, StorageError> {
        self.interact(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT player_id, hole_number, gross_score
                 FROM player_score WHERE match_id = ?1 ORDER BY hole_number, player_id",
            )?;
            let rows = stmt.query_map(params![match_id], |row| {
                Ok(LegacyScore {
                    match_id,
                    player_id: row.get(0)?,
                    hole_number: row.get(1)?,
                    gross_score: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn upsert_authoritative_score(
        &self,
        score: &AuthoritativeScore,
    ) -> Result<(), StorageError> {
        let score = score.clone();
        self.interact(move |conn| {
            conn.execute(
                "INSERT INTO match_score
                    (match_id, player_id, hole_number, gross_score, handicap_strokes, net_score, upd_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (match_id, player_id, hole_number) DO UPDATE SET
                    gross_score = excluded.gross_score,
                    handicap_strokes = excluded.handicap_strokes,
                    net_score = excluded.net_score,
                    upd_ts = excluded.upd_ts",
                params![
                    score.match_id,
                    score.player_id,
                    score.hole_number,
                    score.gross_score,
                    score.handicap_strokes,
                    score.net_score,
                    now_ts(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn upsert_legacy_score(&self, score: &LegacyScore) -> Result<(), StorageError> {
        let score = score.clone();
        self.interact(move |conn| {
            conn.execute(
                "INSERT INTO player_score (match_id, player_id, hole_number, gross_score, upd_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (match_id, player_id, hole_number) DO UPDATE SET
                    gross_score = excluded.gross_score,
                    upd_ts = excluded.upd_ts",
                params![
                    score.match_id,
                    score.player_id,
                    score.hole_number,
                    score.gross_score,
                    now_ts(),
                ],
            )?;
            Ok(())
        })
        .await
    }
}

/// Device-local cache that survives a restart.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// # Errors
    /// Returns an error if the file cannot be opened or the schema fails to apply.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// # Errors
    /// Returns an error if the schema fails to apply.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(CACHE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::new("cache connection lock poisoned"))?;
        f(&conn)
    }
}

impl LocalCache for SqliteCache {
    fn put(&self, key: &str, entry: &ScoreEntry) -> Result<(), StorageError> {
        let payload = serde_json::to_string(entry)?;
        let synced = entry.sync_state == SyncState::Clean;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO score_cache (cache_key, payload, synced, queue_seq, upd_ts)
                 VALUES (?1, ?2, ?3,
                    (SELECT COALESCE(MAX(queue_seq), 0) + 1 FROM score_cache), ?4)
                 ON CONFLICT (cache_key) DO UPDATE SET
                    payload = excluded.payload,
                    queue_seq = CASE WHEN score_cache.synced = 0
                        THEN score_cache.queue_seq ELSE excluded.queue_seq END,
                    synced = excluded.synced,
                    upd_ts = excluded.upd_ts",
                params![key, payload, synced, now_ts()],
            )?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> Result<Option<ScoreEntry>, StorageError> {
        let row: Option<(String, bool)> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT payload, synced FROM score_cache WHERE cache_key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })?;
        match row {
            Some((payload, synced)) => {
                let mut entry: ScoreEntry = serde_json::from_str(&payload)?;
                if synced {
                    entry.sync_state = SyncState::Clean;
                }
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn list_pending(&self) -> Result<Vec<String>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cache_key FROM score_cache WHERE synced = 0 ORDER BY queue_seq",
            )?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(keys)
        })
    }

    fn mark_synced(&self, key: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE score_cache SET synced = 1, upd_ts = ?2 WHERE cache_key = ?1",
                params![key, now_ts()],
            )?;
            Ok(())
        })
    }
}
