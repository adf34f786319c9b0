use std::collections::HashMap;

use shared::{
    domain::{AggregatedTeamScore, TeamId},
    protocol::ScoreRecord,
};
use tracing::warn;

/// Ranked per-team totals, highest first. Teams with equal totals keep the
/// order in which they first appeared in the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leaderboard {
    entries: Vec<AggregatedTeamScore>,
    skipped: usize,
}

impl Leaderboard {
    pub fn entries(&self) -> &[AggregatedTeamScore] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<AggregatedTeamScore> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, team_id: TeamId) -> Option<&AggregatedTeamScore> {
        self.entries.iter().find(|entry| entry.team_id == team_id)
    }

    /// 1-based position on the board.
    pub fn rank_of(&self, team_id: TeamId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.team_id == team_id)
            .map(|index| index + 1)
    }

    pub fn ranked(&self) -> impl Iterator<Item = (usize, &AggregatedTeamScore)> {
        self.entries.iter().enumerate().map(|(i, entry)| (i + 1, entry))
    }

    /// Records left out because they had no team or no score data.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn record_total(record: &ScoreRecord) -> Option<u64> {
    if !record.scores_by_criterion.is_empty() {
        return Some(
            record
                .scores_by_criterion
                .iter()
                .fold(0u64, |acc, entry| acc.saturating_add(u64::from(entry.score))),
        );
    }
    record.total_score
}

/// Folds score records into one total per team.
///
/// Every record counts, including several records by the same judge for the
/// same team. Records are never mutated.
pub fn aggregate<'a, I>(records: I) -> Leaderboard
where
    I: IntoIterator<Item = &'a ScoreRecord>,
{
    let mut entries: Vec<AggregatedTeamScore> = Vec::new();
    let mut index: HashMap<TeamId, usize> = HashMap::new();
    let mut skipped = 0;

    for record in records {
        let Some(team) = &record.team else {
            warn!(score_id = %record.id, "aggregation: record without team skipped");
            skipped += 1;
            continue;
        };
        let Some(total) = record_total(record) else {
            warn!(
                score_id = %record.id,
                team_id = %team.id,
                "aggregation: record without scores skipped"
            );
            skipped += 1;
            continue;
        };

        let slot = *index.entry(team.id).or_insert_with(|| {
            entries.push(AggregatedTeamScore {
                team_id: team.id,
                team_name: team.name.clone(),
                member_count: team.member_count,
                total_score: 0,
            });
            entries.len() - 1
        });
        let entry = &mut entries[slot];
        entry.total_score = entry.total_score.saturating_add(total);
    }

    // Stable: equal totals stay in first-appearance order.
    entries.sort_by(|a, b| b.total_score.cmp(&a.total_score));

    Leaderboard { entries, skipped }
}

#[cfg(test)]
#[path = "tests/aggregation_tests.rs"]
mod tests;
