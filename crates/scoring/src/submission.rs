use std::collections::{HashMap, HashSet};

use shared::{
    domain::{Criterion, CriterionId, JudgeId, RoundId, TeamId},
    protocol::{CriterionScore, ScoreSubmissionRequest},
};

use crate::{catalog::CriterionCatalog, error::ScoringError};

/// One judge's complete, validated scores for one team in one round.
///
/// Scores are kept in catalog order and cover exactly the catalog's
/// criteria. The only constructors are [`SubmissionDraft::build`] and
/// [`ScoreSubmission::from_request`], both of which enforce that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSubmission {
    team_id: TeamId,
    round_id: RoundId,
    judge_id: JudgeId,
    scores: Vec<CriterionScore>,
}

impl ScoreSubmission {
    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn judge_id(&self) -> JudgeId {
        self.judge_id
    }

    pub fn scores(&self) -> &[CriterionScore] {
        &self.scores
    }

    pub fn score_for(&self, criterion_id: CriterionId) -> Option<u32> {
        self.scores
            .iter()
            .find(|entry| entry.criterion_id == criterion_id)
            .map(|entry| entry.score)
    }

    pub fn total(&self) -> u64 {
        self.scores.iter().map(|entry| u64::from(entry.score)).sum()
    }

    pub fn to_request(&self) -> ScoreSubmissionRequest {
        ScoreSubmissionRequest {
            team_id: self.team_id,
            round_id: self.round_id,
            judge_id: self.judge_id,
            scores_by_criterion: self.scores.clone(),
        }
    }

    /// Re-checks a submission received over the wire against the round's
    /// catalog: same round, no unknown or repeated criteria, none missing,
    /// every score within its bound.
    pub fn from_request(
        request: &ScoreSubmissionRequest,
        catalog: &CriterionCatalog,
    ) -> Result<Self, ScoringError> {
        if request.round_id != catalog.round_id() {
            return Err(ScoringError::RoundMismatch {
                expected: catalog.round_id(),
                actual: request.round_id,
            });
        }
        let scores = checked_scores(&request.scores_by_criterion, catalog)?;
        Ok(Self {
            team_id: request.team_id,
            round_id: request.round_id,
            judge_id: request.judge_id,
            scores,
        })
    }
}

/// Validates a replacement score set for an already stored submission.
pub fn checked_scores(
    entries: &[CriterionScore],
    catalog: &CriterionCatalog,
) -> Result<Vec<CriterionScore>, ScoringError> {
    let mut by_id = HashMap::with_capacity(entries.len());
    for entry in entries {
        if !catalog.contains(entry.criterion_id) {
            return Err(ScoringError::UnknownCriterion {
                criterion_id: entry.criterion_id,
            });
        }
        if by_id.insert(entry.criterion_id, entry.score).is_some() {
            return Err(ScoringError::DuplicateCriterion {
                criterion_id: entry.criterion_id,
            });
        }
    }

    catalog
        .criteria()
        .iter()
        .map(|criterion| {
            let score = by_id
                .get(&criterion.id)
                .copied()
                .ok_or_else(|| missing(criterion))?;
            bounded(criterion, i64::from(score))
        })
        .collect()
}

/// Inputs of the submit action as the judge left them.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionDraft<'a> {
    pub round_id: RoundId,
    pub judge_id: JudgeId,
    pub team_id: Option<TeamId>,
    pub catalog: Option<&'a CriterionCatalog>,
    pub entries: &'a HashMap<CriterionId, String>,
}

impl SubmissionDraft<'_> {
    /// Validates in a fixed order and stops at the first problem, so the
    /// judge is pointed at a single field.
    pub fn build(&self) -> Result<ScoreSubmission, ScoringError> {
        let team_id = self.team_id.ok_or(ScoringError::NoTeamSelected)?;
        let catalog = self
            .catalog
            .filter(|catalog| !catalog.is_empty())
            .ok_or(ScoringError::NoCriteriaLoaded)?;

        let scores = catalog
            .criteria()
            .iter()
            .map(|criterion| {
                let raw = self
                    .entries
                    .get(&criterion.id)
                    .map(|raw| raw.trim())
                    .filter(|raw| !raw.is_empty())
                    .ok_or_else(|| missing(criterion))?;
                let value = raw
                    .parse::<i64>()
                    .map_err(|_| ScoringError::InvalidScore {
                        criterion: criterion.name.clone(),
                    })?;
                bounded(criterion, value)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug_assert_eq!(
            scores.iter().map(|s| s.criterion_id).collect::<HashSet<_>>(),
            catalog.ids().collect::<HashSet<_>>()
        );

        Ok(ScoreSubmission {
            team_id,
            round_id: self.round_id,
            judge_id: self.judge_id,
            scores,
        })
    }
}

fn missing(criterion: &Criterion) -> ScoringError {
    ScoringError::MissingScore {
        criterion: criterion.name.clone(),
    }
}

fn bounded(criterion: &Criterion, value: i64) -> Result<CriterionScore, ScoringError> {
    if !(0..=i64::from(criterion.max_score)).contains(&value) {
        return Err(ScoringError::OutOfRange {
            criterion: criterion.name.clone(),
            max_score: criterion.max_score,
        });
    }
    Ok(CriterionScore {
        criterion_id: criterion.id,
        score: value as u32,
    })
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
