use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::CoreError;
use crate::model::{
    MatchId, MatchSetup, MatchStanding, PlayerId, ScoreEntry, ScoreKey, TeamHoleResult,
};
use crate::mvu::runtime::Runtime;
use crate::mvu::score::{LoadedMatch, Msg, ScoreModel};
use crate::score::{
    ScoringRules, parse_gross_input, standing_from_results, team_results_for_match,
    validate_gross,
};
use crate::storage::{LocalCache, ScoreBackend};

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Written locally; back-end writes are under way.
    Accepted,
    /// Input failed validation; nothing changed.
    Rejected(CoreError),
    /// Player, hole or match unknown; nothing changed.
    Skipped(CoreError),
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

/// In-memory score state for open matches, kept in step with a local durable
/// cache and two redundant back-end sources.
#[derive(Clone)]
pub struct ScoreStore {
    runtime: Runtime,
    rules: ScoringRules,
}

impl ScoreStore {
    #[must_use]
    pub fn new(
        backend: Arc<dyn ScoreBackend>,
        cache: Arc<dyn LocalCache>,
        rules: ScoringRules,
    ) -> Self {
        Self {
            runtime: Runtime::new(ScoreModel::new(rules), backend, cache),
            rules,
        }
    }

    /// Pull the roster, handicaps and both score sources for a match and
    /// reconcile them with any unsynced local edits.
    ///
    /// Restored local edits go back on the write queue but are not sent;
    /// [`Self::mount`] or [`Self::retry_pending`] replays them in order.
    ///
    /// A failing score source is logged and treated as empty so a match can
    /// still be opened offline from the local cache.
    ///
    /// # Errors
    /// Returns an error if the match roster cannot be read.
    pub async fn load_match(&self, match_id: MatchId) -> Result<(), CoreError> {
        let backend = self.runtime.backend();
        let setup = backend.read_match_setup(match_id).await?;

        let (course_handicaps, authoritative, legacy) = futures::join!(
            backend.read_course_handicaps(setup.round_id),
            backend.read_authoritative_scores(match_id),
            backend.read_legacy_scores(match_id),
        );
        let course_handicaps = course_handicaps.unwrap_or_else(|e| {
            tracing::warn!(
                match_id,
                round_id = setup.round_id,
                error = %e,
                "course handicaps unavailable"
            );
            Vec::new()
        });
        let authoritative = authoritative.unwrap_or_else(|e| {
            tracing::warn!(match_id, error = %e, "authoritative scores unavailable");
            Vec::new()
        });
        let legacy = legacy.unwrap_or_else(|e| {
            tracing::warn!(match_id, error = %e, "legacy scores unavailable");
            Vec::new()
        });
        let cached_pending = self.cached_pending(match_id);

        tracing::info!(
            match_id,
            authoritative = authoritative.len(),
            legacy = legacy.len(),
            cached_pending = cached_pending.len(),
            "match loaded"
        );

        self.runtime
            .dispatch(Msg::MatchLoaded(Box::new(LoadedMatch {
                setup,
                course_handicaps,
                authoritative,
                legacy,
                cached_pending,
            })))
            .await;
        Ok(())
    }

    /// Load a match and replay everything still waiting to sync, one write
    /// at a time. Returns once the replay has finished.
    ///
    /// # Errors
    /// Returns an error if the match roster cannot be read.
    pub async fn mount(&self, match_id: MatchId) -> Result<(), CoreError> {
        self.load_match(match_id).await?;
        self.retry_pending().await;
        Ok(())
    }

    fn cached_pending(&self, match_id: MatchId) -> Vec<ScoreEntry> {
        let cache = self.runtime.cache();
        let keys = match cache.list_pending() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(match_id, error = %e, "local cache unreadable");
                return Vec::new();
            }
        };
        keys.iter()
            .filter(|raw| ScoreKey::from_cache_key(raw).is_some_and(|k| k.match_id == match_id))
            .filter_map(|raw| match cache.get(raw) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(key = %raw, error = %e, "cached score unreadable");
                    None
                }
            })
            .collect()
    }

    /// Record a gross score (or clear it with `None`).
    ///
    /// Local state and the durable cache are updated before this returns; the
    /// two back-end writes continue in the background.
    pub async fn submit_score(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        hole_number: i32,
        gross_score: Option<i32>,
    ) -> SubmitOutcome {
        let gross = match validate_gross(gross_score, &self.rules) {
            Ok(gross) => gross,
            Err(e) => {
                tracing::debug!(match_id, player_id, hole = hole_number, error = %e, "score rejected");
                return SubmitOutcome::Rejected(e);
            }
        };
        self.enter(ScoreKey::new(match_id, player_id, hole_number), gross)
            .await
    }

    /// Same as [`Self::submit_score`] for raw text input. Blank text clears the hole.
    pub async fn submit_raw(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        hole_number: i32,
        raw: &str,
    ) -> SubmitOutcome {
        match parse_gross_input(raw, &self.rules) {
            Ok(gross) => {
                self.enter(ScoreKey::new(match_id, player_id, hole_number), gross)
                    .await
            }
            Err(e) => {
                tracing::debug!(match_id, player_id, hole = hole_number, error = %e, "score rejected");
                SubmitOutcome::Rejected(e)
            }
        }
    }

    async fn enter(&self, key: ScoreKey, gross: Option<i32>) -> SubmitOutcome {
        let (effects, error) = self.runtime.dispatch(Msg::ScoreEntered { key, gross }).await;
        if let Some(e) = error {
            return SubmitOutcome::Skipped(e);
        }
        self.runtime.run_detached(effects);
        SubmitOutcome::Accepted
    }

    /// Change a player's course handicap and re-derive their strokes and net scores.
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` if the match has not been loaded.
    pub async fn set_course_handicap(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        course_handicap: i32,
    ) -> Result<(), CoreError> {
        let (effects, error) = self
            .runtime
            .dispatch(Msg::HandicapChanged {
                match_id,
                player_id,
                course_handicap,
            })
            .await;
        if let Some(e) = error {
            return Err(e);
        }
        self.runtime.run_detached(effects);
        Ok(())
    }

    /// Replay queued writes in FIFO order, one at a time.
    pub async fn retry_pending(&self) {
        let (effects, _) = self.runtime.dispatch(Msg::RetryRequested).await;
        if effects.is_empty() {
            return;
        }
        tracing::info!(writes = effects.len(), "retrying pending score writes");
        self.runtime.run_sequential(effects).await;
    }

    /// Retry whenever the connectivity signal flips to online.
    #[must_use]
    pub fn watch_reconnect(&self, mut online: watch::Receiver<bool>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            while online.changed().await.is_ok() {
                let is_online = *online.borrow_and_update();
                if is_online {
                    tracing::debug!("reconnected");
                    store.retry_pending().await;
                }
            }
        })
    }

    /// Wait for background writes to finish.
    pub async fn settle(&self) {
        self.runtime.settle().await;
    }

    pub async fn get_team_results(&self, match_id: MatchId) -> Vec<TeamHoleResult> {
        let model = self.runtime.model().read().await;
        match model.matches.get(&match_id) {
            Some(context) => team_results_for_match(&context.setup, model.entries.values()),
            None => Vec::new(),
        }
    }

    pub async fn get_standing(&self, match_id: MatchId) -> MatchStanding {
        let results = self.get_team_results(match_id).await;
        standing_from_results(&results, self.rules.holes_per_round)
    }

    pub async fn entry(&self, key: ScoreKey) -> Option<ScoreEntry> {
        self.runtime.model().read().await.entries.get(&key).cloned()
    }

    pub async fn entries(&self, match_id: MatchId) -> Vec<ScoreEntry> {
        self.runtime
            .model()
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.match_id == match_id)
            .cloned()
            .collect()
    }

    pub async fn match_setup(&self, match_id: MatchId) -> Option<MatchSetup> {
        self.runtime
            .model()
            .read()
            .await
            .matches
            .get(&match_id)
            .map(|context| context.setup.clone())
    }

    pub async fn pending_count(&self) -> usize {
        self.runtime.model().read().await.outbox.len()
    }
}
