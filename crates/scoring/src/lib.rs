//! Scoring workflow for judged rounds: the criterion rubric, the readiness
//! join over roster and criteria loads, per-judge submission validation, and
//! aggregation of submissions into a leaderboard.

pub mod aggregation;
pub mod catalog;
pub mod error;
pub mod readiness;
pub mod session;
pub mod submission;

pub use aggregation::{aggregate, Leaderboard};
pub use catalog::{validate_authored_criterion, CriterionCatalog};
pub use error::ScoringError;
pub use readiness::{CriteriaTicket, GateSnapshot, LoadStatus, ReadinessGate, RosterTicket};
pub use session::{Readiness, ScoringSession};
pub use submission::{ScoreSubmission, SubmissionDraft};
