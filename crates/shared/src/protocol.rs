use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        CriterionId, JudgeId, JudgeSummary, RoundId, RoundStatus, RoundSummary, ScoreId, TeamId,
        TeamReference,
    },
    error::ApiError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionScore {
    pub criterion_id: CriterionId,
    pub score: u32,
}

/// Outbound shape of one accepted scoring action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmissionRequest {
    pub team_id: TeamId,
    pub round_id: RoundId,
    pub judge_id: JudgeId,
    pub scores_by_criterion: Vec<CriterionScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScoreRequest {
    pub scores_by_criterion: Vec<CriterionScore>,
}

/// A submission as held by the store. Team and judge metadata ride along so
/// a leaderboard can be built without extra lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub id: ScoreId,
    pub round_id: RoundId,
    #[serde(default)]
    pub team: Option<TeamReference>,
    #[serde(default)]
    pub judge: Option<JudgeSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<u64>,
    #[serde(default)]
    pub scores_by_criterion: Vec<CriterionScore>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCriterion {
    pub name: String,
    pub max_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoundRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: RoundStatus,
    #[serde(default)]
    pub criteria: Vec<NewCriterion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoundRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RoundStatus>,
    #[serde(default)]
    pub add_criteria: Vec<NewCriterion>,
    #[serde(default)]
    pub remove_criterion_ids: Vec<CriterionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Partial team edit. `members`, when present, replaces the whole roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeamRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTeamRequest {
    pub team_id: TeamId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJudgeRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJudgeRequest {
    pub name: String,
}

/// Tags are snake_case; payload fields are camelCase like every other shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    ScoreRecorded {
        round_id: RoundId,
        team_id: TeamId,
        score_id: ScoreId,
    },
    #[serde(rename_all = "camelCase")]
    ScoreUpdated {
        round_id: RoundId,
        team_id: TeamId,
        score_id: ScoreId,
    },
    RoundUpdated {
        round: RoundSummary,
    },
    #[serde(rename_all = "camelCase")]
    RoundDeleted {
        round_id: RoundId,
    },
    /// The team's submissions stay stored but no longer count toward any
    /// leaderboard.
    #[serde(rename_all = "camelCase")]
    TeamDeleted {
        team_id: TeamId,
    },
    Error(ApiError),
}

impl ServerEvent {
    /// Round whose leaderboard this event invalidates, if any.
    pub fn affected_round(&self) -> Option<RoundId> {
        match self {
            ServerEvent::ScoreRecorded { round_id, .. }
            | ServerEvent::ScoreUpdated { round_id, .. }
            | ServerEvent::RoundDeleted { round_id } => Some(*round_id),
            ServerEvent::RoundUpdated { round } => Some(round.id),
            ServerEvent::TeamDeleted { .. } | ServerEvent::Error(_) => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
