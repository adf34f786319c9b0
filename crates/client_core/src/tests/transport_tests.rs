use super::*;
use axum::{
    extract::Path,
    http::StatusCode as AxumStatus,
    routing::{get, post},
    Json, Router,
};
use shared::domain::{CriterionId, JudgeId, TeamId};
use tokio::net::TcpListener;

async fn round_teams(Path(round_id): Path<i64>) -> Json<Vec<TeamReference>> {
    Json(vec![TeamReference {
        id: TeamId(round_id * 10),
        name: "T1".into(),
        member_count: 2,
    }])
}

async fn round_criteria(
    Path(round_id): Path<i64>,
) -> Result<Json<Vec<Criterion>>, (AxumStatus, Json<ApiError>)> {
    if round_id != 1 {
        return Err((
            AxumStatus::NOT_FOUND,
            Json(ApiError::not_found(format!("round {round_id} not found"))),
        ));
    }
    Ok(Json(vec![Criterion {
        id: CriterionId(100),
        name: "Creativity".into(),
        max_score: 10,
    }]))
}

async fn reject_score() -> (AxumStatus, Json<ApiError>) {
    (
        AxumStatus::BAD_REQUEST,
        Json(ApiError::validation("score for Creativity must be 0-10")),
    )
}

async fn broken_rounds() -> (AxumStatus, &'static str) {
    (AxumStatus::INTERNAL_SERVER_ERROR, "boom")
}

async fn spawn_scoring_server() -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/rounds", get(broken_rounds))
        .route("/rounds/:round_id/teams", get(round_teams))
        .route("/rounds/:round_id/criteria", get(round_criteria))
        .route("/scores", post(reject_score));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/"))
}

#[test]
fn rejects_non_http_server_url() {
    assert!(HttpScoringBackend::new("ws://127.0.0.1:1").is_err());
    assert!(HttpScoringBackend::new("not a url").is_err());
    let backend = HttpScoringBackend::new("http://127.0.0.1:8443/").expect("backend");
    assert_eq!(backend.server_url(), "http://127.0.0.1:8443");
}

#[tokio::test]
async fn fetches_roster_and_criteria() {
    let url = spawn_scoring_server().await.expect("server");
    let backend = HttpScoringBackend::new(&url).expect("backend");

    let teams = backend.fetch_round_teams(RoundId(3)).await.expect("teams");
    assert_eq!(teams[0].id, TeamId(30));

    let criteria = backend
        .fetch_round_criteria(RoundId(1))
        .await
        .expect("criteria");
    assert_eq!(criteria[0].max_score, 10);
}

#[tokio::test]
async fn missing_criteria_maps_to_not_found() {
    let url = spawn_scoring_server().await.expect("server");
    let backend = HttpScoringBackend::new(&url).expect("backend");

    assert_eq!(
        backend.fetch_round_criteria(RoundId(5)).await,
        Err(ScoringError::NotFound {
            round_id: RoundId(5)
        })
    );
}

#[tokio::test]
async fn rejected_submission_carries_server_message() {
    let url = spawn_scoring_server().await.expect("server");
    let backend = HttpScoringBackend::new(&url).expect("backend");

    let request = ScoreSubmissionRequest {
        team_id: TeamId(10),
        round_id: RoundId(1),
        judge_id: JudgeId(1),
        scores_by_criterion: Vec::new(),
    };
    assert_eq!(
        backend.submit_score(&request).await,
        Err(ScoringError::ExternalFailure(
            "score for Creativity must be 0-10".into()
        ))
    );
}

#[tokio::test]
async fn non_json_error_falls_back_to_status() {
    let url = spawn_scoring_server().await.expect("server");
    let backend = HttpScoringBackend::new(&url).expect("backend");

    let err = backend.list_rounds().await.expect_err("server error");
    let exception = err.downcast_ref::<ApiException>().expect("api exception");
    assert_eq!(exception.code, ErrorCode::Internal);
    assert!(exception.message.contains("500"));
}

#[tokio::test]
async fn unreachable_server_is_external_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let backend = HttpScoringBackend::new(&format!("http://{addr}")).expect("backend");
    let err = backend
        .fetch_round_teams(RoundId(1))
        .await
        .expect_err("connection refused");
    assert!(matches!(err, ScoringError::ExternalFailure(message) if message.starts_with("request failed")));
}
