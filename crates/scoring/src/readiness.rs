//! Count-down join over the two loads a round needs before it can be scored.
//!
//! [`ReadinessGate::new`] hands out one ticket per load. A ticket is consumed
//! when its load completes, so each load decrements the pending count exactly
//! once. A ticket dropped without completing counts as a failed load, which
//! keeps the "loading finished" signal from hanging forever.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::domain::{TeamId, TeamReference};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{catalog::CriterionCatalog, error::ScoringError};

const OUTSTANDING_LOADS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSnapshot {
    pub pending: usize,
    pub roster: LoadStatus,
    pub criteria: LoadStatus,
}

impl GateSnapshot {
    pub fn loading_finished(&self) -> bool {
        self.pending == 0
    }

    pub fn all_loaded(&self) -> bool {
        self.roster == LoadStatus::Loaded && self.criteria == LoadStatus::Loaded
    }
}

enum LoadOutcome<T> {
    Pending,
    Loaded(T),
    Failed(String),
}

impl<T> LoadOutcome<T> {
    fn status(&self) -> LoadStatus {
        match self {
            LoadOutcome::Pending => LoadStatus::Pending,
            LoadOutcome::Loaded(_) => LoadStatus::Loaded,
            LoadOutcome::Failed(message) => LoadStatus::Failed(message.clone()),
        }
    }

    fn value(&self) -> Option<&T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            _ => None,
        }
    }

    fn failure(&self) -> Option<&str> {
        match self {
            LoadOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl<T> From<Result<T, ScoringError>> for LoadOutcome<T> {
    fn from(value: Result<T, ScoringError>) -> Self {
        match value {
            Ok(loaded) => LoadOutcome::Loaded(loaded),
            Err(err) => LoadOutcome::Failed(err.to_string()),
        }
    }
}

struct GateState {
    pending: usize,
    roster: LoadOutcome<Vec<TeamReference>>,
    criteria: LoadOutcome<CriterionCatalog>,
}

struct GateInner {
    state: Mutex<GateState>,
    finished: watch::Sender<bool>,
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores one load outcome and decrements in the same critical section.
    fn record(&self, load: &'static str, apply: impl FnOnce(&mut GateState)) {
        let mut state = self.lock();
        apply(&mut state);
        state.pending = state.pending.saturating_sub(1);
        debug!(load, pending = state.pending, "readiness gate: load completed");
        if state.pending == 0 {
            info!(
                roster_loaded = state.roster.value().is_some(),
                criteria_loaded = state.criteria.value().is_some(),
                "readiness gate: loading finished"
            );
            self.finished.send_replace(true);
        }
    }
}

#[derive(Clone)]
pub struct ReadinessGate {
    inner: Arc<GateInner>,
}

impl ReadinessGate {
    pub fn new() -> (Self, RosterTicket, CriteriaTicket) {
        let (finished, _) = watch::channel(false);
        let inner = Arc::new(GateInner {
            state: Mutex::new(GateState {
                pending: OUTSTANDING_LOADS,
                roster: LoadOutcome::Pending,
                criteria: LoadOutcome::Pending,
            }),
            finished,
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            RosterTicket {
                gate: Some(Arc::clone(&inner)),
            },
            CriteriaTicket { gate: Some(inner) },
        )
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().pending
    }

    pub fn is_loading_finished(&self) -> bool {
        *self.inner.finished.borrow()
    }

    pub fn subscribe_finished(&self) -> watch::Receiver<bool> {
        self.inner.finished.subscribe()
    }

    /// Resolves once both loads have completed, whatever their outcome.
    pub async fn wait_loading_finished(&self) {
        let mut finished = self.subscribe_finished();
        // The sender lives inside `self`, so the channel cannot close here.
        let _ = finished.wait_for(|done| *done).await;
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.inner.lock();
        GateSnapshot {
            pending: state.pending,
            roster: state.roster.status(),
            criteria: state.criteria.status(),
        }
    }

    pub fn roster(&self) -> Option<Vec<TeamReference>> {
        self.inner.lock().roster.value().cloned()
    }

    pub fn catalog(&self) -> Option<CriterionCatalog> {
        self.inner.lock().criteria.value().cloned()
    }

    pub fn find_team(&self, team_id: TeamId) -> Option<TeamReference> {
        self.inner
            .lock()
            .roster
            .value()
            .and_then(|teams| teams.iter().find(|team| team.id == team_id).cloned())
    }

    /// User-facing messages of the loads that failed.
    pub fn failures(&self) -> Vec<String> {
        let state = self.inner.lock();
        [state.roster.failure(), state.criteria.failure()]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect()
    }

    /// Both loads succeeded and the rubric is non-empty.
    pub fn loads_succeeded(&self) -> bool {
        let state = self.inner.lock();
        state.roster.value().is_some()
            && state
                .criteria
                .value()
                .is_some_and(|catalog| !catalog.is_empty())
    }

    pub fn can_score(&self, selected: Option<TeamId>) -> bool {
        let Some(team_id) = selected else {
            return false;
        };
        self.loads_succeeded() && self.find_team(team_id).is_some()
    }
}

/// Completion handle for the team roster load.
pub struct RosterTicket {
    gate: Option<Arc<GateInner>>,
}

impl RosterTicket {
    pub fn complete(mut self, result: Result<Vec<TeamReference>, ScoringError>) {
        if let Some(gate) = self.gate.take() {
            if let Err(err) = &result {
                warn!(error = %err, "readiness gate: roster load failed");
            }
            gate.record("roster", |state| state.roster = result.into());
        }
    }
}

impl Drop for RosterTicket {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            warn!("readiness gate: roster load abandoned");
            gate.record("roster", |state| {
                state.roster = LoadOutcome::Failed("roster load was abandoned".to_string())
            });
        }
    }
}

/// Completion handle for the criterion catalog load.
pub struct CriteriaTicket {
    gate: Option<Arc<GateInner>>,
}

impl CriteriaTicket {
    pub fn complete(mut self, result: Result<CriterionCatalog, ScoringError>) {
        if let Some(gate) = self.gate.take() {
            if let Err(err) = &result {
                warn!(error = %err, "readiness gate: criteria load failed");
            }
            gate.record("criteria", |state| state.criteria = result.into());
        }
    }
}

impl Drop for CriteriaTicket {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            warn!("readiness gate: criteria load abandoned");
            gate.record("criteria", |state| {
                state.criteria = LoadOutcome::Failed("criteria load was abandoned".to_string())
            });
        }
    }
}

#[cfg(test)]
#[path = "tests/readiness_tests.rs"]
mod tests;
