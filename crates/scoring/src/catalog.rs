use std::collections::HashSet;

use shared::{
    domain::{Criterion, CriterionId, RoundId},
    protocol::NewCriterion,
};

use crate::error::ScoringError;

/// Ordered scoring rubric of one round. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriterionCatalog {
    round_id: RoundId,
    criteria: Vec<Criterion>,
}

impl CriterionCatalog {
    pub fn new(round_id: RoundId, criteria: Vec<Criterion>) -> Result<Self, ScoringError> {
        if criteria.is_empty() {
            return Err(ScoringError::NotFound { round_id });
        }

        let mut seen = HashSet::with_capacity(criteria.len());
        for criterion in &criteria {
            if criterion.name.trim().is_empty() {
                return Err(ScoringError::InvalidCriterion {
                    reason: format!("criterion {} has a blank name", criterion.id),
                });
            }
            if !seen.insert(criterion.id) {
                return Err(ScoringError::InvalidCriterion {
                    reason: format!("criterion {} is listed twice", criterion.id),
                });
            }
        }

        Ok(Self { round_id, criteria })
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn get(&self, criterion_id: CriterionId) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == criterion_id)
    }

    pub fn contains(&self, criterion_id: CriterionId) -> bool {
        self.get(criterion_id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = CriterionId> + '_ {
        self.criteria.iter().map(|c| c.id)
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Highest total a single submission can reach.
    pub fn max_total(&self) -> u64 {
        self.criteria.iter().map(|c| u64::from(c.max_score)).sum()
    }
}

/// Rule every authoring flow applies before a criterion becomes visible to
/// judges. `max_score` is unsigned, so only the name needs checking.
pub fn validate_authored_criterion(criterion: &NewCriterion) -> Result<(), ScoringError> {
    if criterion.name.trim().is_empty() {
        return Err(ScoringError::InvalidCriterion {
            reason: "criterion name must not be blank".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
