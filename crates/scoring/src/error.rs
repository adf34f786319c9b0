use shared::{
    domain::{CriterionId, RoundId, TeamId},
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

/// Every way a scoring action can be refused. Display strings are shown to
/// the judge as-is, so the per-criterion variants carry the criterion name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("select a team first")]
    NoTeamSelected,
    #[error("no criteria loaded for this round")]
    NoCriteriaLoaded,
    #[error("enter a score for {criterion}")]
    MissingScore { criterion: String },
    #[error("score for {criterion} must be a whole number")]
    InvalidScore { criterion: String },
    #[error("score for {criterion} must be 0-{max_score}")]
    OutOfRange { criterion: String, max_score: u32 },
    #[error("{0}")]
    ExternalFailure(String),
    #[error("round {round_id} has no criteria defined")]
    NotFound { round_id: RoundId },
    #[error("invalid criterion: {reason}")]
    InvalidCriterion { reason: String },
    #[error("team {team_id} is not on this round's roster")]
    UnknownTeam { team_id: TeamId },
    #[error("criterion {criterion_id} does not belong to this round")]
    UnknownCriterion { criterion_id: CriterionId },
    #[error("criterion {criterion_id} was scored more than once")]
    DuplicateCriterion { criterion_id: CriterionId },
    #[error("submission targets round {actual}, expected round {expected}")]
    RoundMismatch { expected: RoundId, actual: RoundId },
    #[error("a submission is already in progress")]
    SubmissionInFlight,
    #[error("no round is open for scoring")]
    NoActiveSession,
}

impl ScoringError {
    /// Errors detected on the device before any request is sent. They block
    /// the action but leave the session state untouched.
    pub fn is_local_validation(&self) -> bool {
        matches!(
            self,
            ScoringError::NoTeamSelected
                | ScoringError::NoCriteriaLoaded
                | ScoringError::MissingScore { .. }
                | ScoringError::InvalidScore { .. }
                | ScoringError::OutOfRange { .. }
                | ScoringError::UnknownTeam { .. }
                | ScoringError::UnknownCriterion { .. }
                | ScoringError::DuplicateCriterion { .. }
                | ScoringError::RoundMismatch { .. }
                | ScoringError::SubmissionInFlight
                | ScoringError::NoActiveSession
        )
    }

    pub fn external(message: impl Into<String>) -> Self {
        ScoringError::ExternalFailure(message.into())
    }
}

impl From<ApiError> for ScoringError {
    fn from(value: ApiError) -> Self {
        ScoringError::ExternalFailure(value.message)
    }
}

impl From<ScoringError> for ApiError {
    fn from(value: ScoringError) -> Self {
        let code = match &value {
            ScoringError::NotFound { .. } => ErrorCode::NotFound,
            ScoringError::ExternalFailure(_) => ErrorCode::Internal,
            _ => ErrorCode::Validation,
        };
        ApiError::new(code, value.to_string())
    }
}
