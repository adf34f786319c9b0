use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use scoring::ScoringError;
use serde::de::DeserializeOwned;
use shared::{
    domain::{AggregatedTeamScore, Criterion, JudgeSummary, RoundId, RoundSummary, TeamReference},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{ScoreRecord, ScoreSubmissionRequest},
};
use url::Url;

use crate::ScoringBackend;

/// [`ScoringBackend`] over the scoring server's HTTP API.
#[derive(Clone)]
pub struct HttpScoringBackend {
    http: Client,
    base: String,
}

impl HttpScoringBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        let parsed =
            Url::parse(server_url).with_context(|| format!("invalid server url: {server_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "server_url must use http or https, got {}",
                parsed.scheme()
            ));
        }
        Ok(Self {
            http: Client::new(),
            base: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.base
    }

    pub async fn list_rounds(&self) -> Result<Vec<RoundSummary>> {
        self.get_json("/rounds").await.map_err(into_exception)
    }

    pub async fn list_judges(&self) -> Result<Vec<JudgeSummary>> {
        self.get_json("/judges").await.map_err(into_exception)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

#[async_trait]
impl ScoringBackend for HttpScoringBackend {
    async fn fetch_round_teams(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<TeamReference>, ScoringError> {
        Ok(self.get_json(&format!("/rounds/{round_id}/teams")).await?)
    }

    async fn fetch_round_criteria(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<Criterion>, ScoringError> {
        match self.get_json(&format!("/rounds/{round_id}/criteria")).await {
            Ok(criteria) => Ok(criteria),
            Err(err) if err.code == ErrorCode::NotFound => {
                Err(ScoringError::NotFound { round_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn submit_score(
        &self,
        request: &ScoreSubmissionRequest,
    ) -> Result<ScoreRecord, ScoringError> {
        let response = self
            .http
            .post(format!("{}/scores", self.base))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(decode(response).await?)
    }

    async fn fetch_round_scores(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<ScoreRecord>, ScoringError> {
        Ok(self.get_json(&format!("/rounds/{round_id}/scores")).await?)
    }

    async fn fetch_leaderboard(&self) -> Result<Vec<AggregatedTeamScore>, ScoringError> {
        Ok(self.get_json("/leaderboard").await?)
    }
}

/// Non-success responses carry an [`ApiError`] body; anything else is
/// reported with the bare status.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(transport_error);
    }
    let body = response.text().await.unwrap_or_default();
    Err(serde_json::from_str::<ApiError>(&body)
        .unwrap_or_else(|_| ApiError::new(code_for(status), format!("server returned {status}"))))
}

fn code_for(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("request failed: {err}"))
}

fn into_exception(err: ApiError) -> anyhow::Error {
    ApiException::from(err).into()
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
