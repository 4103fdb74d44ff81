use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::{LocalCache, ScoreBackend, StorageError};
use crate::model::{
    AuthoritativeScore, CourseHandicapRow, LegacyScore, MatchId, MatchSetup, RoundId, ScoreEntry,
    ScoreKey, SyncState,
};

#[derive(Default)]
struct BackendState {
    setups: HashMap<MatchId, MatchSetup>,
    handicaps: HashMap<RoundId, Vec<CourseHandicapRow>>,
    authoritative: BTreeMap<ScoreKey, AuthoritativeScore>,
    legacy: BTreeMap<ScoreKey, LegacyScore>,
}

/// In-process back end with switchable write failures and latency.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<BackendState>,
    fail_authoritative: AtomicBool,
    fail_legacy: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    authoritative_writes: AtomicUsize,
    legacy_writes: AtomicUsize,
    authoritative_log: Mutex<Vec<AuthoritativeScore>>,
    active_writes: AtomicUsize,
    peak_writes: AtomicUsize,
}

fn lock_err<T>(_: T) -> StorageError {
    StorageError::new("memory backend lock poisoned")
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_setup(&self, setup: MatchSetup) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(lock_err)?;
        state.setups.insert(setup.match_id, setup);
        Ok(())
    }

    pub fn insert_course_handicap(
        &self,
        round_id: RoundId,
        player_id: i64,
        course_handicap: i32,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(lock_err)?;
        let rows = state.handicaps.entry(round_id).or_default();
        rows.retain(|row| row.player_id != player_id);
        rows.push(CourseHandicapRow {
            player_id,
            course_handicap,
        });
        Ok(())
    }

    pub fn set_fail_authoritative(&self, fail: bool) {
        self.fail_authoritative.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_legacy(&self, fail: bool) {
        self.fail_legacy.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Option<Duration>) -> Result<(), StorageError> {
        *self.write_delay.lock().map_err(lock_err)? = delay;
        Ok(())
    }

    #[must_use]
    pub fn authoritative_write_count(&self) -> usize {
        self.authoritative_writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn legacy_write_count(&self) -> usize {
        self.legacy_writes.load(Ordering::SeqCst)
    }

    /// Every authoritative upsert attempt in call order, failed ones included.
    pub fn authoritative_write_log(&self) -> Result<Vec<AuthoritativeScore>, StorageError> {
        Ok(self.authoritative_log.lock().map_err(lock_err)?.clone())
    }

    pub fn clear_write_log(&self) -> Result<(), StorageError> {
        self.authoritative_log.lock().map_err(lock_err)?.clear();
        self.peak_writes.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Most writes of either kind ever in progress at once.
    #[must_use]
    pub fn peak_concurrent_writes(&self) -> usize {
        self.peak_writes.load(Ordering::SeqCst)
    }

    pub fn authoritative_rows(&self) -> Result<Vec<AuthoritativeScore>, StorageError> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state.authoritative.values().cloned().collect())
    }

    pub fn legacy_rows(&self) -> Result<Vec<LegacyScore>, StorageError> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state.legacy.values().cloned().collect())
    }

    /// Seed a legacy row directly, bypassing failure injection.
    pub fn insert_legacy(&self, score: LegacyScore) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(lock_err)?;
        state.legacy.insert(score.key(), score);
        Ok(())
    }

    /// Seed an authoritative row directly, bypassing failure injection.
    pub fn insert_authoritative(&self, score: AuthoritativeScore) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(lock_err)?;
        state.authoritative.insert(score.key(), score);
        Ok(())
    }

    async fn simulate_latency(&self) -> Result<(), StorageError> {
        let active = self.active_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_writes.fetch_max(active, Ordering::SeqCst);
        let delay = self.write_delay.lock().map(|d| *d).map_err(lock_err);
        if let Ok(Some(delay)) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active_writes.fetch_sub(1, Ordering::SeqCst);
        delay.map(|_| ())
    }
}

#[async_trait]
impl ScoreBackend for MemoryBackend {
    async fn read_match_setup(&self, match_id: MatchId) -> Result<MatchSetup, StorageError> {
        let state = self.state.lock().map_err(lock_err)?;
        state
            .setups
            .get(&match_id)
            .cloned()
            .ok_or_else(|| StorageError::new(format!("match {match_id} not found")))
    }

    async fn read_course_handicaps(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<CourseHandicapRow>, StorageError> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state.handicaps.get(&round_id).cloned().unwrap_or_default())
    }

    async fn read_authoritative_scores(
        &self,
        match_id: MatchId,
    ) -> Result<Vec<AuthoritativeScore>, StorageError> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state
            .authoritative
            .values()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn read_legacy_scores(
        &self,
        match_id: MatchId,
    ) -> Result<Vec<LegacyScore>, StorageError> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state
            .legacy
            .values()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn upsert_authoritative_score(
        &self,
        score: &AuthoritativeScore,
    ) -> Result<(), StorageError> {
        self.simulate_latency().await?;
        self.authoritative_writes.fetch_add(1, Ordering::SeqCst);
        self.authoritative_log
            .lock()
            .map_err(lock_err)?
            .push(score.clone());
        if self.fail_authoritative.load(Ordering::SeqCst) {
            return Err(StorageError::new("authoritative source unreachable"));
        }
        let mut state = self.state.lock().map_err(lock_err)?;
        state.authoritative.insert(score.key(), score.clone());
        Ok(())
    }

    async fn upsert_legacy_score(&self, score: &LegacyScore) -> Result<(), StorageError> {
        self.simulate_latency().await?;
        self.legacy_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_legacy.load(Ordering::SeqCst) {
            return Err(StorageError::new("legacy source unreachable"));
        }
        let mut state = self.state.lock().map_err(lock_err)?;
        state.legacy.insert(score.key(), score.clone());
        Ok(())
    }
}

struct CachedEntry {
    /// Position in the pending queue; kept while the entry stays unsynced.
    seq: u64,
    entry: ScoreEntry,
}

#[derive(Default)]
struct CacheState {
    entries: BTreeMap<String, CachedEntry>,
    next_seq: u64,
}

#[derive(Default)]
pub struct MemoryCache {
    state: Mutex<CacheState>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalCache for MemoryCache {
    fn put(&self, key: &str, entry: &ScoreEntry) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(lock_err)?;
        let queued = state
            .entries
            .get(key)
            .filter(|cached| cached.entry.sync_state != SyncState::Clean)
            .map(|cached| cached.seq);
        let seq = match queued {
            Some(seq) => seq,
            None => {
                state.next_seq += 1;
                state.next_seq
            }
        };
        state.entries.insert(
            key.to_string(),
            CachedEntry {
                seq,
                entry: entry.clone(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<ScoreEntry>, StorageError> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state.entries.get(key).map(|cached| cached.entry.clone()))
    }

    fn list_pending(&self) -> Result<Vec<String>, StorageError> {
        let state = self.state.lock().map_err(lock_err)?;
        let mut pending: Vec<(u64, &String)> = state
            .entries
            .iter()
            .filter(|(_, cached)| cached.entry.sync_state != SyncState::Clean)
            .map(|(key, cached)| (cached.seq, key))
            .collect();
        pending.sort_unstable();
        Ok(pending.into_iter().map(|(_, key)| key.clone()).collect())
    }

    fn mark_synced(&self, key: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(lock_err)?;
        if let Some(cached) = state.entries.get_mut(key) {
            cached.entry.sync_state = SyncState::Clean;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(gross: i32) -> AuthoritativeScore {
        AuthoritativeScore {
            match_id: 1,
            player_id: 2,
            hole_number: 3,
            gross_score: Some(gross),
            handicap_strokes: 1,
            net_score: Some(gross - 1),
        }
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row() {
        let backend = MemoryBackend::new();
        backend.upsert_authoritative_score(&payload(5)).await.unwrap();
        backend.upsert_authoritative_score(&payload(5)).await.unwrap();
        let rows = backend.read_authoritative_scores(1).await.unwrap();
        assert_eq!(rows, vec![payload(5)]);
        assert_eq!(backend.authoritative_write_count(), 2);
    }

    #[tokio::test]
    async fn injected_failure_leaves_store_untouched() {
        let backend = MemoryBackend::new();
        backend.set_fail_legacy(true);
        let legacy = LegacyScore {
            match_id: 1,
            player_id: 2,
            hole_number: 3,
            gross_score: Some(4),
        };
        assert!(backend.upsert_legacy_score(&legacy).await.is_err());
        assert!(backend.read_legacy_scores(1).await.unwrap().is_empty());
    }

    #[test]
    fn cache_pending_until_synced() {
        let cache = MemoryCache::new();
        let entry = ScoreEntry {
            match_id: 1,
            player_id: 2,
            hole_number: 3,
            gross_score: Some(4),
            handicap_strokes: 0,
            net_score: Some(4),
            sync_state: SyncState::Pending,
        };
        let key = entry.key().cache_key();
        cache.put(&key, &entry).unwrap();
        assert_eq!(cache.list_pending().unwrap(), vec![key.clone()]);
        cache.mark_synced(&key).unwrap();
        assert!(cache.list_pending().unwrap().is_empty());
        assert_eq!(
            cache.get(&key).unwrap().map(|e| e.sync_state),
            Some(SyncState::Clean)
        );
    }

    #[test]
    fn cache_lists_pending_in_queue_order() {
        let cache = MemoryCache::new();
        let entry = |player_id, hole_number| ScoreEntry {
            match_id: 77,
            player_id,
            hole_number,
            gross_score: Some(5),
            handicap_strokes: 0,
            net_score: Some(5),
            sync_state: SyncState::Pending,
        };
        for e in [entry(10, 1), entry(2, 1), entry(3, 4)] {
            cache.put(&e.key().cache_key(), &e).unwrap();
        }
        // Rewriting a pending entry keeps its place.
        let first = entry(10, 1);
        cache.put(&first.key().cache_key(), &first).unwrap();
        assert_eq!(
            cache.list_pending().unwrap(),
            vec!["77:10:1".to_string(), "77:2:1".into(), "77:3:4".into()]
        );

        // Once synced, a new edit goes to the back.
        cache.mark_synced("77:10:1").unwrap();
        cache.put(&first.key().cache_key(), &first).unwrap();
        assert_eq!(
            cache.list_pending().unwrap(),
            vec!["77:2:1".to_string(), "77:3:4".into(), "77:10:1".into()]
        );
    }
}
