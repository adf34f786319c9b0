use std::collections::HashMap;

use shared::domain::{CriterionId, JudgeId, RoundId, TeamId, TeamReference};
use tracing::debug;

use crate::{
    error::ScoringError,
    readiness::{CriteriaTicket, ReadinessGate, RosterTicket},
    submission::{ScoreSubmission, SubmissionDraft},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// At least one of the two loads is still outstanding.
    Loading,
    /// Loading finished but a load failed; scoring stays disabled.
    Failed(Vec<String>),
    AwaitingTeam,
    Ready,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Score form of one judge for one round: which team is being scored and
/// what has been typed so far.
pub struct ScoringSession {
    round_id: RoundId,
    judge_id: JudgeId,
    gate: ReadinessGate,
    selected_team: Option<TeamReference>,
    entries: HashMap<CriterionId, String>,
    submitting: bool,
}

impl ScoringSession {
    pub fn new(round_id: RoundId, judge_id: JudgeId) -> (Self, RosterTicket, CriteriaTicket) {
        let (gate, roster, criteria) = ReadinessGate::new();
        (
            Self {
                round_id,
                judge_id,
                gate,
                selected_team: None,
                entries: HashMap::new(),
                submitting: false,
            },
            roster,
            criteria,
        )
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn judge_id(&self) -> JudgeId {
        self.judge_id
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn selected_team(&self) -> Option<&TeamReference> {
        self.selected_team.as_ref()
    }

    pub fn entries(&self) -> &HashMap<CriterionId, String> {
        &self.entries
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn readiness(&self) -> Readiness {
        if !self.gate.is_loading_finished() {
            return Readiness::Loading;
        }
        let failures = self.gate.failures();
        if !failures.is_empty() || !self.gate.loads_succeeded() {
            return Readiness::Failed(failures);
        }
        match &self.selected_team {
            Some(team) if self.gate.can_score(Some(team.id)) => Readiness::Ready,
            _ => Readiness::AwaitingTeam,
        }
    }

    /// Switches the form to another team. Anything typed for the previous
    /// team is discarded, even when the same team is picked again.
    pub fn select_team(&mut self, team_id: TeamId) -> Result<Readiness, ScoringError> {
        let team = self
            .gate
            .find_team(team_id)
            .ok_or(ScoringError::UnknownTeam { team_id })?;
        debug!(
            round_id = %self.round_id,
            team_id = %team_id,
            discarded_entries = self.entries.len(),
            "scoring session: team selected"
        );
        self.entries.clear();
        self.selected_team = Some(team);
        Ok(self.readiness())
    }

    pub fn clear_selection(&mut self) {
        self.selected_team = None;
        self.entries.clear();
    }

    pub fn enter_score(
        &mut self,
        criterion_id: CriterionId,
        raw: impl Into<String>,
    ) -> Result<(), ScoringError> {
        if self.selected_team.is_none() {
            return Err(ScoringError::NoTeamSelected);
        }
        let catalog = self.gate.catalog().ok_or(ScoringError::NoCriteriaLoaded)?;
        if !catalog.contains(criterion_id) {
            return Err(ScoringError::UnknownCriterion { criterion_id });
        }
        self.entries.insert(criterion_id, raw.into());
        Ok(())
    }

    pub fn clear_score(&mut self, criterion_id: CriterionId) {
        self.entries.remove(&criterion_id);
    }

    pub fn reset_scores(&mut self) {
        self.entries.clear();
    }

    /// Validates the form and marks the session as submitting. The caller
    /// sends the submission and reports back through
    /// [`submission_accepted`](Self::submission_accepted) or
    /// [`submission_failed`](Self::submission_failed).
    pub fn prepare_submission(&mut self) -> Result<ScoreSubmission, ScoringError> {
        if self.submitting {
            return Err(ScoringError::SubmissionInFlight);
        }
        let catalog = self.gate.catalog();
        let submission = SubmissionDraft {
            round_id: self.round_id,
            judge_id: self.judge_id,
            team_id: self.selected_team.as_ref().map(|team| team.id),
            catalog: catalog.as_ref(),
            entries: &self.entries,
        }
        .build()?;
        self.submitting = true;
        Ok(submission)
    }

    /// The store took the submission: start the next one from a blank form.
    pub fn submission_accepted(&mut self) {
        self.submitting = false;
        self.clear_selection();
    }

    /// The store refused or was unreachable: keep everything for a resubmit.
    pub fn submission_failed(&mut self) {
        self.submitting = false;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
