use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use scoring::{
    aggregate, CriterionCatalog, Leaderboard, Readiness, ScoringError, ScoringSession,
};
use shared::{
    domain::{
        AggregatedTeamScore, Criterion, CriterionId, JudgeId, RoundId, TeamId, TeamReference,
    },
    protocol::{ScoreRecord, ScoreSubmissionRequest, ServerEvent},
};
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

pub mod transport;

pub use transport::HttpScoringBackend;

/// Request/response boundary to the score store. Every failure is reported
/// as a [`ScoringError`]; only the criteria fetch distinguishes "not found".
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    async fn fetch_round_teams(&self, round_id: RoundId)
        -> Result<Vec<TeamReference>, ScoringError>;
    async fn fetch_round_criteria(&self, round_id: RoundId)
        -> Result<Vec<Criterion>, ScoringError>;
    async fn submit_score(
        &self,
        request: &ScoreSubmissionRequest,
    ) -> Result<ScoreRecord, ScoringError>;
    async fn fetch_round_scores(&self, round_id: RoundId)
        -> Result<Vec<ScoreRecord>, ScoringError>;
    async fn fetch_leaderboard(&self) -> Result<Vec<AggregatedTeamScore>, ScoringError>;
}

pub struct MissingScoringBackend;

#[async_trait]
impl ScoringBackend for MissingScoringBackend {
    async fn fetch_round_teams(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<TeamReference>, ScoringError> {
        Err(ScoringError::external(format!(
            "score store unavailable; cannot load teams for round {round_id}"
        )))
    }

    async fn fetch_round_criteria(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<Criterion>, ScoringError> {
        Err(ScoringError::external(format!(
            "score store unavailable; cannot load criteria for round {round_id}"
        )))
    }

    async fn submit_score(
        &self,
        request: &ScoreSubmissionRequest,
    ) -> Result<ScoreRecord, ScoringError> {
        Err(ScoringError::external(format!(
            "score store unavailable; submission for team {} was not sent",
            request.team_id
        )))
    }

    async fn fetch_round_scores(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<ScoreRecord>, ScoringError> {
        Err(ScoringError::external(format!(
            "score store unavailable; cannot load scores for round {round_id}"
        )))
    }

    async fn fetch_leaderboard(&self) -> Result<Vec<AggregatedTeamScore>, ScoringError> {
        Err(ScoringError::external("score store unavailable"))
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Both loads of a session completed. Fires once per session.
    LoadingFinished {
        round_id: RoundId,
        readiness: Readiness,
    },
    ScoreSubmitted {
        record: ScoreRecord,
    },
    SubmissionFailed {
        round_id: RoundId,
        team_id: TeamId,
        message: String,
    },
    LeaderboardUpdated {
        round_id: RoundId,
        leaderboard: Arc<Leaderboard>,
    },
    Server(ServerEvent),
    Error(String),
}

/// Point-in-time copy of the active scoring session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub round_id: RoundId,
    pub judge_id: JudgeId,
    pub readiness: Readiness,
    pub roster: Vec<TeamReference>,
    pub criteria: Vec<Criterion>,
    pub selected_team: Option<TeamReference>,
    pub entries: HashMap<CriterionId, String>,
    pub submitting: bool,
}

struct JudgeClientState {
    session: Option<ScoringSession>,
    generation: u64,
}

pub struct JudgeClient {
    backend: Arc<dyn ScoringBackend>,
    inner: Mutex<JudgeClientState>,
    leaderboards: RwLock<HashMap<RoundId, Arc<Leaderboard>>>,
    events: broadcast::Sender<ClientEvent>,
}

impl JudgeClient {
    pub fn new() -> Arc<Self> {
        Self::new_with_backend(Arc::new(MissingScoringBackend))
    }

    pub fn new_with_backend(backend: Arc<dyn ScoringBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            inner: Mutex::new(JudgeClientState {
                session: None,
                generation: 0,
            }),
            leaderboards: RwLock::new(HashMap::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Opens the score form for a round, discarding any previous session
    /// and what was typed into it. The roster and criteria loads run
    /// concurrently; each completes its own part of the readiness gate as
    /// soon as it resolves.
    pub async fn start_session(&self, round_id: RoundId, judge_id: JudgeId) -> Readiness {
        let (session, roster_ticket, criteria_ticket) = ScoringSession::new(round_id, judge_id);
        let gate = session.gate().clone();
        let generation = {
            let mut guard = self.inner.lock().await;
            guard.generation += 1;
            guard.session = Some(session);
            guard.generation
        };
        info!(round_id = %round_id, judge_id = %judge_id, generation, "scoring session started");

        let backend = Arc::clone(&self.backend);
        tokio::join!(
            async {
                let roster = backend.fetch_round_teams(round_id).await;
                roster_ticket.complete(roster);
            },
            async {
                let catalog = backend
                    .fetch_round_criteria(round_id)
                    .await
                    .and_then(|criteria| CriterionCatalog::new(round_id, criteria));
                criteria_ticket.complete(catalog);
            },
        );
        gate.wait_loading_finished().await;

        let guard = self.inner.lock().await;
        let current = guard
            .session
            .as_ref()
            .filter(|_| guard.generation == generation);
        match current {
            Some(session) => {
                let readiness = session.readiness();
                info!(round_id = %round_id, ?readiness, "scoring session loaded");
                let _ = self.events.send(ClientEvent::LoadingFinished {
                    round_id,
                    readiness: readiness.clone(),
                });
                readiness
            }
            None => {
                debug!(round_id = %round_id, generation, "loads finished for a replaced session");
                Readiness::Loading
            }
        }
    }

    /// Resolves once the active session's loads have both completed.
    pub async fn wait_until_loaded(&self) -> Result<Readiness, ScoringError> {
        let gate = {
            let guard = self.inner.lock().await;
            let session = guard.session.as_ref().ok_or(ScoringError::NoActiveSession)?;
            session.gate().clone()
        };
        gate.wait_loading_finished().await;
        self.readiness().await.ok_or(ScoringError::NoActiveSession)
    }

    pub async fn readiness(&self) -> Option<Readiness> {
        let guard = self.inner.lock().await;
        guard.session.as_ref().map(ScoringSession::readiness)
    }

    pub async fn view(&self) -> Option<SessionView> {
        let guard = self.inner.lock().await;
        let session = guard.session.as_ref()?;
        let gate = session.gate();
        Some(SessionView {
            round_id: session.round_id(),
            judge_id: session.judge_id(),
            readiness: session.readiness(),
            roster: gate.roster().unwrap_or_default(),
            criteria: gate
                .catalog()
                .map(|catalog| catalog.criteria().to_vec())
                .unwrap_or_default(),
            selected_team: session.selected_team().cloned(),
            entries: session.entries().clone(),
            submitting: session.is_submitting(),
        })
    }

    pub async fn select_team(&self, team_id: TeamId) -> Result<Readiness, ScoringError> {
        let mut guard = self.inner.lock().await;
        let session = guard.session.as_mut().ok_or(ScoringError::NoActiveSession)?;
        session.select_team(team_id)
    }

    pub async fn enter_score(
        &self,
        criterion_id: CriterionId,
        raw: impl Into<String>,
    ) -> Result<(), ScoringError> {
        let mut guard = self.inner.lock().await;
        let session = guard.session.as_mut().ok_or(ScoringError::NoActiveSession)?;
        session.enter_score(criterion_id, raw)
    }

    pub async fn reset_scores(&self) {
        if let Some(session) = self.inner.lock().await.session.as_mut() {
            session.reset_scores();
        }
    }

    pub async fn end_session(&self) {
        let mut guard = self.inner.lock().await;
        guard.generation += 1;
        guard.session = None;
    }

    /// Validates the form, then sends it without holding the session lock.
    /// On success the form is cleared for the next team; on failure the
    /// entered scores stay so the judge can resubmit.
    pub async fn submit(&self) -> Result<ScoreRecord, ScoringError> {
        let (request, generation) = {
            let mut guard = self.inner.lock().await;
            let generation = guard.generation;
            let session = guard.session.as_mut().ok_or(ScoringError::NoActiveSession)?;
            (session.prepare_submission()?.to_request(), generation)
        };

        let outcome = self.backend.submit_score(&request).await;

        let mut guard = self.inner.lock().await;
        let current = guard.generation == generation;
        let session = guard.session.as_mut().filter(|_| current);
        match outcome {
            Ok(record) => {
                if let Some(session) = session {
                    session.submission_accepted();
                }
                info!(
                    score_id = %record.id,
                    round_id = %request.round_id,
                    team_id = %request.team_id,
                    "score submitted"
                );
                let _ = self.events.send(ClientEvent::ScoreSubmitted {
                    record: record.clone(),
                });
                Ok(record)
            }
            Err(err) => {
                if let Some(session) = session {
                    session.submission_failed();
                }
                warn!(
                    round_id = %request.round_id,
                    team_id = %request.team_id,
                    error = %err,
                    "score submission failed"
                );
                let _ = self.events.send(ClientEvent::SubmissionFailed {
                    round_id: request.round_id,
                    team_id: request.team_id,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Fetches the round's stored submissions and aggregates them locally.
    /// The cached board is replaced as a whole.
    pub async fn refresh_round_leaderboard(
        &self,
        round_id: RoundId,
    ) -> Result<Arc<Leaderboard>, ScoringError> {
        let records = self.backend.fetch_round_scores(round_id).await?;
        let leaderboard = Arc::new(aggregate(&records));
        if leaderboard.skipped() > 0 {
            warn!(
                round_id = %round_id,
                skipped = leaderboard.skipped(),
                "leaderboard built with skipped records"
            );
        }
        self.leaderboards
            .write()
            .await
            .insert(round_id, Arc::clone(&leaderboard));
        let _ = self.events.send(ClientEvent::LeaderboardUpdated {
            round_id,
            leaderboard: Arc::clone(&leaderboard),
        });
        Ok(leaderboard)
    }

    pub async fn cached_leaderboard(&self, round_id: RoundId) -> Option<Arc<Leaderboard>> {
        self.leaderboards.read().await.get(&round_id).cloned()
    }

    /// Cross-round totals as computed by the score store.
    pub async fn overall_leaderboard(&self) -> Result<Vec<AggregatedTeamScore>, ScoringError> {
        self.backend.fetch_leaderboard().await
    }

    async fn handle_server_event(&self, event: ServerEvent) {
        match &event {
            ServerEvent::ScoreRecorded { round_id, .. }
            | ServerEvent::ScoreUpdated { round_id, .. } => {
                let round_id = *round_id;
                if self.cached_leaderboard(round_id).await.is_some() {
                    if let Err(err) = self.refresh_round_leaderboard(round_id).await {
                        let _ = self.events.send(ClientEvent::Error(format!(
                            "failed to refresh leaderboard for round {round_id}: {err}"
                        )));
                    }
                }
            }
            ServerEvent::RoundDeleted { round_id } => {
                self.leaderboards.write().await.remove(round_id);
            }
            ServerEvent::TeamDeleted { .. } => {
                let cached: Vec<RoundId> = self.leaderboards.read().await.keys().copied().collect();
                for round_id in cached {
                    if let Err(err) = self.refresh_round_leaderboard(round_id).await {
                        let _ = self.events.send(ClientEvent::Error(format!(
                            "failed to refresh leaderboard for round {round_id}: {err}"
                        )));
                    }
                }
            }
            ServerEvent::RoundUpdated { .. } | ServerEvent::Error(_) => {}
        }
        let _ = self.events.send(ClientEvent::Server(event));
    }

    /// Follows the server's event stream, refreshing cached leaderboards
    /// when new scores land.
    pub async fn spawn_event_stream(
        self: &Arc<Self>,
        server_url: &str,
        round_id: Option<RoundId>,
    ) -> Result<JoinHandle<()>> {
        let ws_url = websocket_url(server_url, round_id)?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (_, mut ws_reader) = ws_stream.split();
        info!(%ws_url, "event stream connected");

        let client = Arc::clone(self);
        Ok(tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => client.handle_server_event(event).await,
                        Err(err) => {
                            let _ = client
                                .events
                                .send(ClientEvent::Error(format!("invalid server event: {err}")));
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = client.events.send(ClientEvent::Error(format!(
                            "websocket receive failed: {err}"
                        )));
                        break;
                    }
                }
            }
            info!("event stream closed");
        }))
    }
}

fn websocket_url(server_url: &str, round_id: Option<RoundId>) -> Result<Url> {
    let mut url =
        Url::parse(server_url).with_context(|| format!("invalid server url: {server_url}"))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(anyhow!("server_url must use http or https, got {other}")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot derive websocket url from {server_url}"))?;
    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base}/ws"));
    match round_id {
        Some(round_id) => url.set_query(Some(&format!("round_id={round_id}"))),
        None => url.set_query(None),
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
