use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use server_api::ApiContext;
use shared::{
    domain::{
        AggregatedTeamScore, Criterion, JudgeId, JudgeSummary, RoundId, RoundSummary, ScoreId,
        TeamId, TeamProfile, TeamReference,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        AssignTeamRequest, CreateJudgeRequest, CreateRoundRequest, CreateTeamRequest, ScoreRecord,
        ScoreSubmissionRequest, ServerEvent, UpdateJudgeRequest, UpdateRoundRequest,
        UpdateScoreRequest, UpdateTeamRequest,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

const MAX_REQUEST_BYTES: usize = 64 * 1024;
const EVENT_CAPACITY: usize = 256;

type HttpResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Default, Deserialize)]
struct WsQuery {
    round_id: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let state = AppState::new(ApiContext { storage }, EVENT_CAPACITY);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(
        %addr,
        public_url = settings.server_public_url.as_deref().unwrap_or("-"),
        "scoring server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/rounds", get(http_list_rounds).post(http_create_round))
        .route(
            "/rounds/:round_id",
            get(http_get_round)
                .put(http_update_round)
                .delete(http_delete_round),
        )
        .route("/rounds/:round_id/criteria", get(http_round_criteria))
        .route(
            "/rounds/:round_id/teams",
            get(http_round_teams).post(http_assign_team),
        )
        .route("/rounds/:round_id/scores", get(http_round_scores))
        .route("/rounds/:round_id/leaderboard", get(http_round_leaderboard))
        .route("/leaderboard", get(http_overall_leaderboard))
        .route("/teams", get(http_list_teams).post(http_create_team))
        .route(
            "/teams/:team_id",
            get(http_get_team)
                .put(http_update_team)
                .delete(http_delete_team),
        )
        .route("/judges", get(http_list_judges).post(http_create_judge))
        .route(
            "/judges/:judge_id",
            get(http_get_judge)
                .put(http_update_judge)
                .delete(http_delete_judge),
        )
        .route("/scores", post(http_submit_score))
        .route("/scores/:score_id", put(http_update_score))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    if err.code == ErrorCode::Internal {
        error!(message = %err.message, "request failed");
    }
    (status_for(err.code), Json(err))
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state.api.storage.health_check().await.map_err(|e| {
        reject(ApiError::new(ErrorCode::Internal, e.to_string()))
    })?;
    Ok("ok")
}

async fn http_list_rounds(State(state): State<Arc<AppState>>) -> HttpResult<Vec<RoundSummary>> {
    server_api::list_rounds(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_round(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoundRequest>,
) -> Result<(StatusCode, Json<RoundSummary>), (StatusCode, Json<ApiError>)> {
    let round = server_api::create_round(&state.api, &req)
        .await
        .map_err(reject)?;
    state.publish(ServerEvent::RoundUpdated {
        round: round.clone(),
    });
    Ok((StatusCode::CREATED, Json(round)))
}

async fn http_get_round(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<i64>,
) -> HttpResult<RoundSummary> {
    server_api::get_round(&state.api, RoundId(round_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_update_round(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<i64>,
    Json(req): Json<UpdateRoundRequest>,
) -> HttpResult<RoundSummary> {
    let event = server_api::update_round(&state.api, RoundId(round_id), &req)
        .await
        .map_err(reject)?;
    let ServerEvent::RoundUpdated { round } = &event else {
        return Err(reject(ApiError::new(
            ErrorCode::Internal,
            "round update produced an unexpected event",
        )));
    };
    let round = round.clone();
    state.publish(event);
    Ok(Json(round))
}

async fn http_delete_round(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let event = server_api::delete_round(&state.api, RoundId(round_id))
        .await
        .map_err(reject)?;
    state.publish(event);
    Ok(StatusCode::NO_CONTENT)
}

async fn http_round_criteria(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<i64>,
) -> HttpResult<Vec<Criterion>> {
    server_api::round_criteria(&state.api, RoundId(round_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_round_teams(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<i64>,
) -> HttpResult<Vec<TeamReference>> {
    server_api::round_teams(&state.api, RoundId(round_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_assign_team(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<i64>,
    Json(req): Json<AssignTeamRequest>,
) -> HttpResult<TeamReference> {
    server_api::assign_team(&state.api, RoundId(round_id), req.team_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_round_scores(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<i64>,
) -> HttpResult<Vec<ScoreRecord>> {
    server_api::round_scores(&state.api, RoundId(round_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_round_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<i64>,
) -> HttpResult<Vec<AggregatedTeamScore>> {
    server_api::round_leaderboard(&state.api, RoundId(round_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_overall_leaderboard(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Vec<AggregatedTeamScore>> {
    server_api::overall_leaderboard(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_list_teams(State(state): State<Arc<AppState>>) -> HttpResult<Vec<TeamProfile>> {
    server_api::list_teams(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_get_team(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
) -> HttpResult<TeamProfile> {
    server_api::get_team(&state.api, TeamId(team_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_team(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamProfile>), (StatusCode, Json<ApiError>)> {
    let team = server_api::create_team(&state.api, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(team)))
}

async fn http_update_team(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
    Json(req): Json<UpdateTeamRequest>,
) -> HttpResult<TeamProfile> {
    server_api::update_team(&state.api, TeamId(team_id), &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_team(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let event = server_api::delete_team(&state.api, TeamId(team_id))
        .await
        .map_err(reject)?;
    state.publish(event);
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_judges(State(state): State<Arc<AppState>>) -> HttpResult<Vec<JudgeSummary>> {
    server_api::list_judges(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_judge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJudgeRequest>,
) -> Result<(StatusCode, Json<JudgeSummary>), (StatusCode, Json<ApiError>)> {
    let judge = server_api::create_judge(&state.api, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(judge)))
}

async fn http_get_judge(
    State(state): State<Arc<AppState>>,
    Path(judge_id): Path<i64>,
) -> HttpResult<JudgeSummary> {
    server_api::get_judge(&state.api, JudgeId(judge_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_update_judge(
    State(state): State<Arc<AppState>>,
    Path(judge_id): Path<i64>,
    Json(req): Json<UpdateJudgeRequest>,
) -> HttpResult<JudgeSummary> {
    server_api::update_judge(&state.api, JudgeId(judge_id), &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_judge(
    State(state): State<Arc<AppState>>,
    Path(judge_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    server_api::delete_judge(&state.api, JudgeId(judge_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_submit_score(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScoreSubmissionRequest>,
) -> Result<(StatusCode, Json<ScoreRecord>), (StatusCode, Json<ApiError>)> {
    let record = server_api::submit_score(&state.api, &req)
        .await
        .map_err(reject)?;
    if let Some(event) = server_api::score_event(&record, false) {
        state.publish(event);
    }
    Ok((StatusCode::CREATED, Json(record)))
}

async fn http_update_score(
    State(state): State<Arc<AppState>>,
    Path(score_id): Path<i64>,
    Json(req): Json<UpdateScoreRequest>,
) -> HttpResult<ScoreRecord> {
    let record = server_api::update_score(&state.api, ScoreId(score_id), &req)
        .await
        .map_err(reject)?;
    if let Some(event) = server_api::score_event(&record, true) {
        state.publish(event);
    }
    Ok(Json(record))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, q.round_id.map(RoundId)))
}

/// Streams server events as JSON text frames. With a round filter, events
/// tied to another round are not sent; events tied to no round always are.
async fn ws_connection(state: Arc<AppState>, socket: WebSocket, round: Option<RoundId>) {
    use futures::{SinkExt, StreamExt};
    use tokio::sync::broadcast::error::RecvError;

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket subscriber lagged; events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if let (Some(wanted), Some(affected)) = (round, event.affected_round()) {
                if wanted != affected {
                    continue;
                }
            }
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
