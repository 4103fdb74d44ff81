use ahash::AHashMap;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::error::CoreError;
use crate::model::{
    AuthoritativeScore, CourseHandicapRow, LegacyScore, MatchId, MatchSetup, PlayerId, ScoreEntry,
    ScoreKey, SyncState,
};
use crate::score::{ScoringRules, compute_net, strokes_for_hole};
use crate::storage::StorageError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WriteTarget {
    Authoritative,
    Legacy,
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteTarget::Authoritative => "authoritative",
            WriteTarget::Legacy => "legacy",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WritePayload {
    Authoritative(AuthoritativeScore),
    Legacy(LegacyScore),
}

impl WritePayload {
    fn for_target(target: WriteTarget, entry: &ScoreEntry) -> Self {
        match target {
            WriteTarget::Authoritative => Self::Authoritative(AuthoritativeScore::from(entry)),
            WriteTarget::Legacy => Self::Legacy(LegacyScore::from(entry)),
        }
    }
}

/// A queued write. `revision` changes whenever a newer value for the key is
/// submitted, so completions of superseded writes can be told apart.
#[derive(Clone, Debug)]
pub struct OutboxItem {
    pub key: ScoreKey,
    pub target: WriteTarget,
    pub revision: u64,
    pub failures: u32,
    pub in_flight: bool,
}

#[derive(Clone, Debug)]
pub struct MatchContext {
    pub setup: MatchSetup,
    pub course_handicaps: AHashMap<PlayerId, i32>,
}

impl MatchContext {
    #[must_use]
    pub fn new(setup: MatchSetup, handicaps: &[CourseHandicapRow]) -> Self {
        let course_handicaps = handicaps
            .iter()
            .map(|row| (row.player_id, row.course_handicap))
            .collect();
        Self {
            setup,
            course_handicaps,
        }
    }

    /// Strokes and net for a gross score, or an error naming the unknown player or hole.
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` if the player or hole is not part of the match.
    pub fn score(
        &self,
        key: ScoreKey,
        gross: Option<i32>,
        rules: &ScoringRules,
    ) -> Result<(i32, Option<i32>), CoreError> {
        if self.setup.player(key.player_id).is_none() {
            return Err(CoreError::NotFound(format!(
                "player {} in match {}",
                key.player_id, key.match_id
            )));
        }
        let hole = self.setup.hole(key.hole_number).ok_or_else(|| {
            CoreError::NotFound(format!("hole {} in match {}", key.hole_number, key.match_id))
        })?;
        let course_handicap = self
            .course_handicaps
            .get(&key.player_id)
            .copied()
            .unwrap_or_else(|| {
                tracing::debug!(
                    match_id = key.match_id,
                    player_id = key.player_id,
                    "no course handicap, playing off scratch"
                );
                0
            });
        let strokes = strokes_for_hole(course_handicap, hole, rules.max_strokes_per_hole);
        Ok((strokes, compute_net(gross, strokes)))
    }
}

#[derive(Debug, Default)]
pub struct ScoreModel {
    pub rules: ScoringRules,
    pub matches: AHashMap<MatchId, MatchContext>,
    pub entries: BTreeMap<ScoreKey, ScoreEntry>,
    pub outbox: VecDeque<OutboxItem>,
    pub error: Option<CoreError>,
    next_revision: u64,
}

/// Everything pulled from storage when a match is opened.
#[derive(Clone, Debug)]
pub struct LoadedMatch {
    pub setup: MatchSetup,
    pub course_handicaps: Vec<CourseHandicapRow>,
    pub authoritative: Vec<AuthoritativeScore>,
    pub legacy: Vec<LegacyScore>,
    pub cached_pending: Vec<ScoreEntry>,
}

#[derive(Clone, Debug)]
pub enum Msg {
    MatchLoaded(Box<LoadedMatch>),
    ScoreEntered {
        key: ScoreKey,
        gross: Option<i32>,
    },
    HandicapChanged {
        match_id: MatchId,
        player_id: PlayerId,
        course_handicap: i32,
    },
    Persisted {
        key: ScoreKey,
        target: WriteTarget,
        revision: u64,
        result: Result<(), StorageError>,
    },
    RetryRequested,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    CacheWrite(ScoreEntry),
    MarkSynced(ScoreKey),
    Persist {
        key: ScoreKey,
        revision: u64,
        payload: WritePayload,
    },
}

impl Effect {
    #[must_use]
    pub fn is_persist(&self) -> bool {
        matches!(self, Effect::Persist { .. })
    }
}

impl ScoreModel {
    #[must_use]
    pub fn new(rules: ScoringRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.outbox.iter().filter(|item| item.in_flight).count()
    }

    fn bump_revision(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }

    fn sync_state_for(&self, key: &ScoreKey) -> SyncState {
        let mut state = SyncState::Clean;
        for item in self.outbox.iter().filter(|item| &item.key == key) {
            if item.failures > 0 {
                return SyncState::Failed;
            }
            state = SyncState::Pending;
        }
        state
    }

    fn refresh_sync_state(&mut self, key: &ScoreKey) -> Option<SyncState> {
        let state = self.sync_state_for(key);
        let entry = self.entries.get_mut(key)?;
        entry.sync_state = state;
        Some(state)
    }

    /// Queue both redundant writes for a key and return the ones that can go out now.
    fn enqueue_writes(&mut self, key: ScoreKey) -> Vec<Effect> {
        self.queue_writes(key)
            .into_iter()
            .filter_map(|target| self.dispatch_item(key, target))
            .collect()
    }

    /// Add or refresh the outbox items for a key without sending anything.
    /// Returns the targets with no write currently out.
    fn queue_writes(&mut self, key: ScoreKey) -> Vec<WriteTarget> {
        let revision = self.bump_revision();
        let mut idle = Vec::new();
        for target in [WriteTarget::Authoritative, WriteTarget::Legacy] {
            let dispatch = match self
                .outbox
                .iter_mut()
                .find(|item| item.key == key && item.target == target)
            {
                Some(item) => {
                    item.revision = revision;
                    item.failures = 0;
                    // An in-flight write is re-sent with the newest value once it lands.
                    !item.in_flight
                }
                None => {
                    self.outbox.push_back(OutboxItem {
                        key,
                        target,
                        revision,
                        failures: 0,
                        in_flight: false,
                    });
                    true
                }
            };
            if dispatch {
                idle.push(target);
            }
        }
        idle
    }

    /// Mark an idle outbox item in flight and build its write from the current entry.
    fn dispatch_item(&mut self, key: ScoreKey, target: WriteTarget) -> Option<Effect> {
        let entry = self.entries.get(&key)?;
        let payload = WritePayload::for_target(target, entry);
        let item = self
            .outbox
            .iter_mut()
            .find(|item| item.key == key && item.target == target && !item.in_flight)?;
        item.in_flight = true;
        Some(Effect::Persist {
            key,
            revision: item.revision,
            payload,
        })
    }

    fn load_match(&mut self, loaded: LoadedMatch) -> Vec<Effect> {
        let LoadedMatch {
            setup,
            course_handicaps,
            authoritative,
            legacy,
            cached_pending,
        } = loaded;
        let match_id = setup.match_id;
        let context = MatchContext::new(setup, &course_handicaps);

        let mut reconciled: BTreeMap<ScoreKey, ScoreEntry> = BTreeMap::new();
        for record in authoritative {
            reconciled.insert(
                record.key(),
                ScoreEntry {
                    match_id: record.match_id,
                    player_id: record.player_id,
                    hole_number: record.hole_number,
                    gross_score: record.gross_score,
                    handicap_strokes: record.handicap_strokes,
                    net_score: record.net_score,
                    sync_state: SyncState::Clean,
                },
            );
        }
        for record in legacy {
            let key = record.key();
            if reconciled.contains_key(&key) {
                continue;
            }
            match context.score(key, record.gross_score, &self.rules) {
                Ok((handicap_strokes, net_score)) => {
                    reconciled.insert(
                        key,
                        ScoreEntry {
                            match_id: key.match_id,
                            player_id: key.player_id,
                            hole_number: key.hole_number,
                            gross_score: record.gross_score,
                            handicap_strokes,
                            net_score,
                            sync_state: SyncState::Clean,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "skipping legacy score");
                }
            }
        }

        // Unsynced local edits are newer than anything the back ends hold.
        let mut resend = Vec::new();
        for entry in cached_pending {
            if entry.match_id != match_id {
                continue;
            }
            let key = entry.key();
            reconciled.insert(key, entry);
            if !self.outbox.iter().any(|item| item.key == key) {
                resend.push(key);
            }
        }
        let queued: Vec<ScoreKey> = self
            .outbox
            .iter()
            .filter(|item| item.key.match_id == match_id)
            .map(|item| item.key)
            .collect();
        for key in queued {
            if let Some(entry) = self.entries.get(&key) {
                reconciled.insert(key, entry.clone());
            }
        }

        self.entries.retain(|key, _| key.match_id != match_id);
        self.entries.extend(reconciled);
        self.matches.insert(match_id, context);

        // Restored writes wait for the next retry so they replay in order.
        for key in resend {
            self.queue_writes(key);
            self.refresh_sync_state(&key);
        }
        Vec::new()
    }

    fn enter_score(&mut self, key: ScoreKey, gross: Option<i32>) -> Vec<Effect> {
        let scored = match self.matches.get(&key.match_id) {
            Some(context) => context.score(key, gross, &self.rules),
            None => Err(CoreError::NotFound(format!("match {} not loaded", key.match_id))),
        };
        let (handicap_strokes, net_score) = match scored {
            Ok(scored) => scored,
            Err(e) => {
                tracing::warn!(%key, error = %e, "score submission skipped");
                self.error = Some(e);
                return vec![];
            }
        };

        self.entries.insert(
            key,
            ScoreEntry {
                match_id: key.match_id,
                player_id: key.player_id,
                hole_number: key.hole_number,
                gross_score: gross,
                handicap_strokes,
                net_score,
                sync_state: SyncState::Pending,
            },
        );
        let mut effects = self.enqueue_writes(key);
        self.refresh_sync_state(&key);
        if let Some(entry) = self.entries.get(&key) {
            effects.insert(0, Effect::CacheWrite(entry.clone()));
        }
        effects
    }

    fn change_handicap(
        &mut self,
        match_id: MatchId,
        player_id: PlayerId,
        course_handicap: i32,
    ) -> Vec<Effect> {
        let Some(context) = self.matches.get_mut(&match_id) else {
            let e = CoreError::NotFound(format!("match {match_id} not loaded"));
            tracing::warn!(match_id, player_id, error = %e, "handicap change skipped");
            self.error = Some(e);
            return vec![];
        };
        context.course_handicaps.insert(player_id, course_handicap);

        let keys: Vec<ScoreKey> = self
            .entries
            .keys()
            .filter(|k| k.match_id == match_id && k.player_id == player_id)
            .copied()
            .collect();
        let mut effects = Vec::new();
        for key in keys {
            let Some(context) = self.matches.get(&match_id) else {
                break;
            };
            let Some(gross) = self.entries.get(&key).map(|e| e.gross_score) else {
                continue;
            };
            let Ok((handicap_strokes, net_score)) = context.score(key, gross, &self.rules) else {
                continue;
            };
            let Some(entry) = self.entries.get_mut(&key) else {
                continue;
            };
            if entry.handicap_strokes == handicap_strokes && entry.net_score == net_score {
                continue;
            }
            entry.handicap_strokes = handicap_strokes;
            entry.net_score = net_score;
            effects.extend(self.enqueue_writes(key));
            self.refresh_sync_state(&key);
            if let Some(entry) = self.entries.get(&key) {
                effects.push(Effect::CacheWrite(entry.clone()));
            }
        }
        effects
    }

    fn persisted(
        &mut self,
        key: ScoreKey,
        target: WriteTarget,
        revision: u64,
        result: Result<(), StorageError>,
    ) -> Vec<Effect> {
        let Some(position) = self
            .outbox
            .iter()
            .position(|item| item.key == key && item.target == target)
        else {
            return vec![];
        };

        let superseded = self.outbox[position].revision != revision;
        self.outbox[position].in_flight = false;
        if superseded {
            // A newer value was queued while this write was out; send it now.
            return self.dispatch_item(key, target).into_iter().collect();
        }

        match result {
            Ok(()) => {
                tracing::debug!(%key, %target, "score synced");
                self.outbox.remove(position);
            }
            Err(e) => {
                tracing::warn!(%key, %target, error = %e, "score write failed");
                self.outbox[position].failures += 1;
            }
        }

        match self.refresh_sync_state(&key) {
            Some(SyncState::Clean) => vec![Effect::MarkSynced(key)],
            _ => vec![],
        }
    }

    fn retry(&mut self) -> Vec<Effect> {
        let idle: Vec<(ScoreKey, WriteTarget)> = self
            .outbox
            .iter()
            .filter(|item| !item.in_flight)
            .map(|item| (item.key, item.target))
            .collect();
        idle.into_iter()
            .filter_map(|(key, target)| self.dispatch_item(key, target))
            .collect()
    }
}

pub fn update(model: &mut ScoreModel, msg: Msg) -> Vec<Effect> {
    match msg {
        Msg::MatchLoaded(loaded) => model.load_match(*loaded),
        Msg::ScoreEntered { key, gross } => model.enter_score(key, gross),
        Msg::HandicapChanged {
            match_id,
            player_id,
            course_handicap,
        } => model.change_handicap(match_id, player_id, course_handicap),
        Msg::Persisted {
            key,
            target,
            revision,
            result,
        } => model.persisted(key, target, revision, result),
        Msg::RetryRequested => model.retry(),
    }
}
