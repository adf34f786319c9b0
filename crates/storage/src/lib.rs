use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{
        Criterion, CriterionId, JudgeId, JudgeSummary, RoundId, RoundStatus, RoundSummary,
        ScoreId, TeamId, TeamReference,
    },
    protocol::{CriterionScore, NewCriterion, ScoreRecord, UpdateRoundRequest, UpdateTeamRequest},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTeam {
    pub team_id: TeamId,
    pub name: String,
    pub college: Option<String>,
    pub members: Vec<String>,
}

impl StoredTeam {
    pub fn reference(&self) -> TeamReference {
        TeamReference {
            id: self.team_id,
            name: self.name.clone(),
            member_count: u32::try_from(self.members.len()).unwrap_or(u32::MAX),
        }
    }
}

const SCORE_COLUMNS: &str = "SELECT s.id, s.round_id, s.team_id, t.name,
        (SELECT COUNT(*) FROM team_members tm WHERE tm.team_id = s.team_id),
        s.judge_id, j.name, s.total_score, s.submitted_at
     FROM scores s
     LEFT JOIN teams t ON t.id = s.team_id
     LEFT JOIN judges j ON j.id = s.judge_id";

const ENTRY_COLUMNS: &str = "SELECT cs.score_id, cs.criterion_id, cs.score
     FROM criterion_scores cs
     INNER JOIN scores s ON s.id = cs.score_id
     INNER JOIN criteria c ON c.id = cs.criterion_id";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Creates a round together with its criteria. Criteria keep the order
    /// they are given in.
    pub async fn create_round(
        &self,
        name: &str,
        description: Option<&str>,
        status: RoundStatus,
        criteria: &[NewCriterion],
    ) -> Result<RoundId> {
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO rounds (name, description, status) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(description)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert round")?;
        let round_id = RoundId(rec.get::<i64, _>(0));

        for (position, criterion) in criteria.iter().enumerate() {
            sqlx::query(
                "INSERT INTO criteria (round_id, name, max_score, position) VALUES (?, ?, ?, ?)",
            )
            .bind(round_id.0)
            .bind(criterion.name.trim())
            .bind(criterion.max_score)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert criterion '{}'", criterion.name))?;
        }

        tx.commit().await?;
        Ok(round_id)
    }

    /// Applies a partial edit. Returns `false` when the round does not exist.
    pub async fn update_round(&self, round_id: RoundId, update: &UpdateRoundRequest) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let exists = sqlx::query("SELECT 1 FROM rounds WHERE id = ?")
            .bind(round_id.0)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Ok(false);
        }

        if let Some(name) = &update.name {
            sqlx::query("UPDATE rounds SET name = ? WHERE id = ?")
                .bind(name)
                .bind(round_id.0)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(description) = &update.description {
            sqlx::query("UPDATE rounds SET description = ? WHERE id = ?")
                .bind(description)
                .bind(round_id.0)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(status) = update.status {
            sqlx::query("UPDATE rounds SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(round_id.0)
                .execute(&mut *tx)
                .await?;
        }
        for criterion_id in &update.remove_criterion_ids {
            sqlx::query("DELETE FROM criteria WHERE id = ? AND round_id = ?")
                .bind(criterion_id.0)
                .bind(round_id.0)
                .execute(&mut *tx)
                .await?;
        }
        if !update.remove_criterion_ids.is_empty() {
            // Removed criteria take their per-criterion scores with them.
            sqlx::query(
                "UPDATE scores SET total_score = (
                     SELECT COALESCE(SUM(cs.score), 0) FROM criterion_scores cs
                     WHERE cs.score_id = scores.id
                 ) WHERE round_id = ?",
            )
            .bind(round_id.0)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to recompute score totals for round {round_id}"))?;
        }
        for criterion in &update.add_criteria {
            sqlx::query(
                "INSERT INTO criteria (round_id, name, max_score, position)
                 VALUES (?, ?, ?, (SELECT COALESCE(MAX(position) + 1, 0) FROM criteria WHERE round_id = ?))",
            )
            .bind(round_id.0)
            .bind(criterion.name.trim())
            .bind(criterion.max_score)
            .bind(round_id.0)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to add criterion '{}'", criterion.name))?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete_round(&self, round_id: RoundId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rounds WHERE id = ?")
            .bind(round_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn load_round(&self, round_id: RoundId) -> Result<Option<RoundSummary>> {
        let row = sqlx::query("SELECT id, name, description, status FROM rounds WHERE id = ?")
            .bind(round_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut round = round_from_row(&row);
        round.criteria = self.list_criteria_for_round(round_id).await?;
        Ok(Some(round))
    }

    pub async fn list_rounds(&self) -> Result<Vec<RoundSummary>> {
        let rows = sqlx::query("SELECT id, name, description, status FROM rounds ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut rounds: Vec<RoundSummary> = rows.iter().map(round_from_row).collect();

        let criteria_rows = sqlx::query(
            "SELECT round_id, id, name, max_score FROM criteria ORDER BY round_id, position, id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut by_round: HashMap<i64, Vec<Criterion>> = HashMap::new();
        for r in criteria_rows {
            by_round
                .entry(r.get::<i64, _>(0))
                .or_default()
                .push(criterion_from_row(&r, 1));
        }
        for round in &mut rounds {
            round.criteria = by_round.remove(&round.id.0).unwrap_or_default();
        }
        Ok(rounds)
    }

    /// Criteria of a round in authoring order. Empty for an unknown round.
    pub async fn list_criteria_for_round(&self, round_id: RoundId) -> Result<Vec<Criterion>> {
        let rows = sqlx::query(
            "SELECT id, name, max_score FROM criteria WHERE round_id = ? ORDER BY position, id",
        )
        .bind(round_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| criterion_from_row(r, 0)).collect())
    }

    pub async fn create_team(
        &self,
        name: &str,
        college: Option<&str>,
        members: &[String],
    ) -> Result<TeamId> {
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query("INSERT INTO teams (name, college) VALUES (?, ?) RETURNING id")
            .bind(name)
            .bind(college)
            .fetch_one(&mut *tx)
            .await
            .context("failed to insert team")?;
        let team_id = TeamId(rec.get::<i64, _>(0));
        for member in members {
            sqlx::query("INSERT INTO team_members (team_id, name) VALUES (?, ?)")
                .bind(team_id.0)
                .bind(member)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(team_id)
    }

    pub async fn load_team(&self, team_id: TeamId) -> Result<Option<StoredTeam>> {
        let row = sqlx::query("SELECT id, name, college FROM teams WHERE id = ?")
            .bind(team_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let members = sqlx::query("SELECT name FROM team_members WHERE team_id = ? ORDER BY id")
            .bind(team_id.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|r| r.get::<String, _>(0))
            .collect();
        Ok(Some(StoredTeam {
            team_id: TeamId(row.get::<i64, _>(0)),
            name: row.get::<String, _>(1),
            college: row.get::<Option<String>, _>(2),
            members,
        }))
    }

    pub async fn list_teams(&self) -> Result<Vec<StoredTeam>> {
        let rows = sqlx::query("SELECT id, name, college FROM teams ORDER BY lower(name) ASC, id")
            .fetch_all(&self.pool)
            .await?;
        let member_rows =
            sqlx::query("SELECT team_id, name FROM team_members ORDER BY team_id, id")
                .fetch_all(&self.pool)
                .await?;
        let mut members: HashMap<i64, Vec<String>> = HashMap::new();
        for r in member_rows {
            members
                .entry(r.get::<i64, _>(0))
                .or_default()
                .push(r.get::<String, _>(1));
        }
        Ok(rows
            .into_iter()
            .map(|r| {
                let id = r.get::<i64, _>(0);
                StoredTeam {
                    team_id: TeamId(id),
                    name: r.get::<String, _>(1),
                    college: r.get::<Option<String>, _>(2),
                    members: members.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Applies a partial edit. A present member list replaces the old one.
    /// Returns `false` when the team does not exist.
    pub async fn update_team(&self, team_id: TeamId, update: &UpdateTeamRequest) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let exists = sqlx::query("SELECT 1 FROM teams WHERE id = ?")
            .bind(team_id.0)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Ok(false);
        }

        if let Some(name) = &update.name {
            sqlx::query("UPDATE teams SET name = ? WHERE id = ?")
                .bind(name)
                .bind(team_id.0)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(college) = &update.college {
            let college = Some(college.as_str()).filter(|college| !college.is_empty());
            sqlx::query("UPDATE teams SET college = ? WHERE id = ?")
                .bind(college)
                .bind(team_id.0)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(members) = &update.members {
            sqlx::query("DELETE FROM team_members WHERE team_id = ?")
                .bind(team_id.0)
                .execute(&mut *tx)
                .await?;
            for member in members {
                sqlx::query("INSERT INTO team_members (team_id, name) VALUES (?, ?)")
                    .bind(team_id.0)
                    .bind(member)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Removes a team. Its submissions stay on record without team metadata.
    pub async fn delete_team(&self, team_id: TeamId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(team_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Idempotent: assigning an already assigned team is a no-op.
    pub async fn assign_team_to_round(&self, round_id: RoundId, team_id: TeamId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO round_teams (round_id, team_id) VALUES (?, ?)")
            .bind(round_id.0)
            .bind(team_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to assign team {team_id} to round {round_id}"))?;
        Ok(())
    }

    pub async fn list_teams_for_round(&self, round_id: RoundId) -> Result<Vec<TeamReference>> {
        let rows = sqlx::query(
            "SELECT t.id, t.name,
                    (SELECT COUNT(*) FROM team_members tm WHERE tm.team_id = t.id)
             FROM round_teams rt
             INNER JOIN teams t ON t.id = rt.team_id
             WHERE rt.round_id = ?
             ORDER BY lower(t.name) ASC, t.id",
        )
        .bind(round_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| TeamReference {
                id: TeamId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
                member_count: count(r.get::<i64, _>(2)),
            })
            .collect())
    }

    pub async fn team_in_round(&self, round_id: RoundId, team_id: TeamId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM round_teams WHERE round_id = ? AND team_id = ?")
            .bind(round_id.0)
            .bind(team_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn create_judge(&self, name: &str) -> Result<JudgeId> {
        let rec = sqlx::query("INSERT INTO judges (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context("failed to insert judge")?;
        Ok(JudgeId(rec.get::<i64, _>(0)))
    }

    pub async fn load_judge(&self, judge_id: JudgeId) -> Result<Option<JudgeSummary>> {
        let row = sqlx::query("SELECT id, name FROM judges WHERE id = ?")
            .bind(judge_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| JudgeSummary {
            id: JudgeId(r.get::<i64, _>(0)),
            name: r.get::<String, _>(1),
        }))
    }

    pub async fn update_judge(&self, judge_id: JudgeId, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE judges SET name = ? WHERE id = ?")
            .bind(name)
            .bind(judge_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to rename judge {judge_id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes a judge. Their submissions keep counting without judge metadata.
    pub async fn delete_judge(&self, judge_id: JudgeId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM judges WHERE id = ?")
            .bind(judge_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_judges(&self) -> Result<Vec<JudgeSummary>> {
        let rows = sqlx::query("SELECT id, name FROM judges ORDER BY lower(name) ASC, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| JudgeSummary {
                id: JudgeId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
            })
            .collect())
    }

    /// Stores one submission and its per-criterion breakdown atomically.
    /// Callers validate the entries against the round's criteria first.
    pub async fn insert_score(
        &self,
        round_id: RoundId,
        team_id: TeamId,
        judge_id: JudgeId,
        entries: &[CriterionScore],
    ) -> Result<ScoreId> {
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO scores (round_id, team_id, judge_id, total_score) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(round_id.0)
        .bind(team_id.0)
        .bind(judge_id.0)
        .bind(total_of(entries))
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert score")?;
        let score_id = ScoreId(rec.get::<i64, _>(0));
        insert_entries(&mut tx, score_id, entries).await?;
        tx.commit().await?;
        Ok(score_id)
    }

    /// Replaces the breakdown of a stored submission. Returns `false` when
    /// the submission does not exist.
    pub async fn update_score_entries(
        &self,
        score_id: ScoreId,
        entries: &[CriterionScore],
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE scores SET total_score = ? WHERE id = ?")
            .bind(total_of(entries))
            .bind(score_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(false);
        }
        sqlx::query("DELETE FROM criterion_scores WHERE score_id = ?")
            .bind(score_id.0)
            .execute(&mut *tx)
            .await?;
        insert_entries(&mut tx, score_id, entries).await?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn load_score(&self, score_id: ScoreId) -> Result<Option<ScoreRecord>> {
        let mut records = self
            .fetch_score_records("WHERE s.id = ?", Some(score_id.0))
            .await?;
        Ok(records.pop())
    }

    pub async fn list_scores_for_round(&self, round_id: RoundId) -> Result<Vec<ScoreRecord>> {
        self.fetch_score_records("WHERE s.round_id = ?", Some(round_id.0))
            .await
    }

    pub async fn list_all_scores(&self) -> Result<Vec<ScoreRecord>> {
        self.fetch_score_records("", None).await
    }

    async fn fetch_score_records(
        &self,
        filter: &str,
        bind: Option<i64>,
    ) -> Result<Vec<ScoreRecord>> {
        let score_sql = format!("{SCORE_COLUMNS} {filter} ORDER BY s.id ASC");
        let entry_sql = format!("{ENTRY_COLUMNS} {filter} ORDER BY cs.score_id, c.position, c.id");

        let mut score_query = sqlx::query(&score_sql);
        let mut entry_query = sqlx::query(&entry_sql);
        if let Some(value) = bind {
            score_query = score_query.bind(value);
            entry_query = entry_query.bind(value);
        }
        let rows = score_query
            .fetch_all(&self.pool)
            .await
            .context("failed to list scores")?;
        let entry_rows = entry_query
            .fetch_all(&self.pool)
            .await
            .context("failed to list criterion scores")?;

        let mut entries: HashMap<i64, Vec<CriterionScore>> = HashMap::new();
        for r in entry_rows {
            entries
                .entry(r.get::<i64, _>(0))
                .or_default()
                .push(CriterionScore {
                    criterion_id: CriterionId(r.get::<i64, _>(1)),
                    score: count(r.get::<i64, _>(2)),
                });
        }

        Ok(rows
            .into_iter()
            .map(|r| {
                let id = r.get::<i64, _>(0);
                let team = match (r.get::<Option<i64>, _>(2), r.get::<Option<String>, _>(3)) {
                    (Some(team_id), Some(name)) => Some(TeamReference {
                        id: TeamId(team_id),
                        name,
                        member_count: count(r.get::<i64, _>(4)),
                    }),
                    _ => None,
                };
                let judge = match (r.get::<Option<i64>, _>(5), r.get::<Option<String>, _>(6)) {
                    (Some(judge_id), Some(name)) => Some(JudgeSummary {
                        id: JudgeId(judge_id),
                        name,
                    }),
                    _ => None,
                };
                ScoreRecord {
                    id: ScoreId(id),
                    round_id: RoundId(r.get::<i64, _>(1)),
                    team,
                    judge,
                    total_score: u64::try_from(r.get::<i64, _>(7)).ok(),
                    scores_by_criterion: entries.remove(&id).unwrap_or_default(),
                    submitted_at: r.get::<DateTime<Utc>, _>(8),
                }
            })
            .collect())
    }
}

async fn insert_entries(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    score_id: ScoreId,
    entries: &[CriterionScore],
) -> Result<()> {
    for entry in entries {
        sqlx::query("INSERT INTO criterion_scores (score_id, criterion_id, score) VALUES (?, ?, ?)")
            .bind(score_id.0)
            .bind(entry.criterion_id.0)
            .bind(entry.score)
            .execute(&mut **tx)
            .await
            .with_context(|| {
                format!(
                    "failed to store score for criterion {} on submission {score_id}",
                    entry.criterion_id
                )
            })?;
    }
    Ok(())
}

fn total_of(entries: &[CriterionScore]) -> i64 {
    entries.iter().map(|entry| i64::from(entry.score)).sum()
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

fn round_from_row(r: &SqliteRow) -> RoundSummary {
    RoundSummary {
        id: RoundId(r.get::<i64, _>(0)),
        name: r.get::<String, _>(1),
        description: r.get::<Option<String>, _>(2),
        status: RoundStatus::parse(&r.get::<String, _>(3)).unwrap_or_default(),
        criteria: Vec::new(),
    }
}

fn criterion_from_row(r: &SqliteRow, offset: usize) -> Criterion {
    Criterion {
        id: CriterionId(r.get::<i64, _>(offset)),
        name: r.get::<String, _>(offset + 1),
        max_score: count(r.get::<i64, _>(offset + 2)),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
