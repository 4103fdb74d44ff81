use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

use crate::error::CoreError;
use crate::model::ScoreKey;
use crate::mvu::score::{Effect, Msg, ScoreModel, WritePayload, WriteTarget, update};
use crate::storage::{LocalCache, ScoreBackend};

/// Owns the score model and executes the effects its updates produce.
#[derive(Clone)]
pub struct Runtime {
    model: Arc<RwLock<ScoreModel>>,
    backend: Arc<dyn ScoreBackend>,
    cache: Arc<dyn LocalCache>,
    idle: Arc<Notify>,
}

impl Runtime {
    #[must_use]
    pub fn new(
        model: ScoreModel,
        backend: Arc<dyn ScoreBackend>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        Self {
            model: Arc::new(RwLock::new(model)),
            backend,
            cache,
            idle: Arc::new(Notify::new()),
        }
    }

    #[must_use]
    pub fn model(&self) -> &RwLock<ScoreModel> {
        &self.model
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ScoreBackend> {
        &self.backend
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<dyn LocalCache> {
        &self.cache
    }

    /// Apply a message and run its cache effects before releasing the model,
    /// so readers never see sync state ahead of the local cache.
    ///
    /// Returns the back-end writes still to be sent and any error the update recorded.
    pub async fn dispatch(&self, msg: Msg) -> (Vec<Effect>, Option<CoreError>) {
        let mut model = self.model.write().await;
        let effects = update(&mut model, msg);
        let error = model.error.take();
        let mut writes = Vec::new();
        for effect in effects {
            if effect.is_persist() {
                writes.push(effect);
            } else {
                self.run_local(&effect);
            }
        }
        (writes, error)
    }

    /// Start every write in the background.
    pub fn run_detached(&self, writes: Vec<Effect>) {
        for effect in writes {
            if let Effect::Persist {
                key,
                revision,
                payload,
            } = effect
            {
                self.spawn_persist(key, revision, payload);
            }
        }
    }

    /// Send writes one at a time, feeding each result back before the next.
    pub async fn run_sequential(&self, writes: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = writes.into();
        while let Some(effect) = queue.pop_front() {
            if let Effect::Persist {
                key,
                revision,
                payload,
            } = effect
            {
                let msg = self.persist(key, revision, payload).await;
                let (next, _) = self.dispatch(msg).await;
                queue.extend(next);
            }
        }
        self.idle.notify_waiters();
    }

    /// Wait until no write is in flight.
    pub async fn settle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.model.read().await.in_flight_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn spawn_persist(&self, key: ScoreKey, revision: u64, payload: WritePayload) {
        let runtime = self.clone();
        tokio::spawn(async move {
            let msg = runtime.persist(key, revision, payload).await;
            let (next, _) = runtime.dispatch(msg).await;
            runtime.run_detached(next);
            runtime.idle.notify_waiters();
        });
    }

    fn run_local(&self, effect: &Effect) {
        match effect {
            Effect::CacheWrite(entry) => {
                let key = entry.key();
                if let Err(e) = self.cache.put(&key.cache_key(), entry) {
                    tracing::warn!(%key, error = %e, "local cache write failed");
                }
            }
            Effect::MarkSynced(key) => {
                if let Err(e) = self.cache.mark_synced(&key.cache_key()) {
                    tracing::warn!(%key, error = %e, "local cache sync mark failed");
                }
            }
            Effect::Persist { .. } => {}
        }
    }

    async fn persist(&self, key: ScoreKey, revision: u64, payload: WritePayload) -> Msg {
        let (target, result) = match &payload {
            WritePayload::Authoritative(score) => (
                WriteTarget::Authoritative,
                self.backend.upsert_authoritative_score(score).await,
            ),
            WritePayload::Legacy(score) => (
                WriteTarget::Legacy,
                self.backend.upsert_legacy_score(score).await,
            ),
        };
        Msg::Persisted {
            key,
            target,
            revision,
            result,
        }
    }
}
