use scoring::{
    aggregate, submission::checked_scores, validate_authored_criterion, CriterionCatalog,
    ScoreSubmission,
};
use shared::{
    domain::{
        AggregatedTeamScore, Criterion, JudgeId, JudgeSummary, RoundId, RoundSummary, ScoreId,
        TeamId, TeamProfile, TeamReference,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        CreateJudgeRequest, CreateRoundRequest, CreateTeamRequest, NewCriterion, ScoreRecord,
        ScoreSubmissionRequest, ServerEvent, UpdateJudgeRequest, UpdateRoundRequest,
        UpdateScoreRequest, UpdateTeamRequest,
    },
};
use storage::{Storage, StoredTeam};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_rounds(ctx: &ApiContext) -> Result<Vec<RoundSummary>, ApiError> {
    ctx.storage.list_rounds().await.map_err(internal)
}

pub async fn get_round(ctx: &ApiContext, round_id: RoundId) -> Result<RoundSummary, ApiError> {
    ctx.storage
        .load_round(round_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| round_not_found(round_id))
}

pub async fn create_round(
    ctx: &ApiContext,
    request: &CreateRoundRequest,
) -> Result<RoundSummary, ApiError> {
    let name = required_name(&request.name, "round")?;
    validate_criteria(&request.criteria)?;
    let round_id = ctx
        .storage
        .create_round(
            name,
            request.description.as_deref(),
            request.status,
            &request.criteria,
        )
        .await
        .map_err(internal)?;
    info!(round_id = %round_id, criteria = request.criteria.len(), "round created");
    get_round(ctx, round_id).await
}

pub async fn update_round(
    ctx: &ApiContext,
    round_id: RoundId,
    request: &UpdateRoundRequest,
) -> Result<ServerEvent, ApiError> {
    if let Some(name) = &request.name {
        required_name(name, "round")?;
    }
    validate_criteria(&request.add_criteria)?;
    let updated = ctx
        .storage
        .update_round(round_id, request)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(round_not_found(round_id));
    }
    let round = get_round(ctx, round_id).await?;
    Ok(ServerEvent::RoundUpdated { round })
}

pub async fn delete_round(ctx: &ApiContext, round_id: RoundId) -> Result<ServerEvent, ApiError> {
    let deleted = ctx.storage.delete_round(round_id).await.map_err(internal)?;
    if !deleted {
        return Err(round_not_found(round_id));
    }
    info!(round_id = %round_id, "round deleted");
    Ok(ServerEvent::RoundDeleted { round_id })
}

/// Ordered rubric of a round. A round without criteria is reported as not
/// found, the same as an unknown round.
pub async fn round_criteria(
    ctx: &ApiContext,
    round_id: RoundId,
) -> Result<Vec<Criterion>, ApiError> {
    Ok(load_catalog(ctx, round_id).await?.criteria().to_vec())
}

pub async fn round_teams(
    ctx: &ApiContext,
    round_id: RoundId,
) -> Result<Vec<TeamReference>, ApiError> {
    ensure_round_exists(ctx, round_id).await?;
    ctx.storage
        .list_teams_for_round(round_id)
        .await
        .map_err(internal)
}

pub async fn assign_team(
    ctx: &ApiContext,
    round_id: RoundId,
    team_id: TeamId,
) -> Result<TeamReference, ApiError> {
    ensure_round_exists(ctx, round_id).await?;
    let team = load_team(ctx, team_id).await?;
    ctx.storage
        .assign_team_to_round(round_id, team_id)
        .await
        .map_err(internal)?;
    Ok(team.reference())
}

pub async fn round_scores(
    ctx: &ApiContext,
    round_id: RoundId,
) -> Result<Vec<ScoreRecord>, ApiError> {
    ensure_round_exists(ctx, round_id).await?;
    ctx.storage
        .list_scores_for_round(round_id)
        .await
        .map_err(internal)
}

pub async fn round_leaderboard(
    ctx: &ApiContext,
    round_id: RoundId,
) -> Result<Vec<AggregatedTeamScore>, ApiError> {
    let records = round_scores(ctx, round_id).await?;
    Ok(aggregate(&records).into_entries())
}

/// Totals across every round, one entry per team.
pub async fn overall_leaderboard(ctx: &ApiContext) -> Result<Vec<AggregatedTeamScore>, ApiError> {
    let records = ctx.storage.list_all_scores().await.map_err(internal)?;
    Ok(aggregate(&records).into_entries())
}

pub async fn list_teams(ctx: &ApiContext) -> Result<Vec<TeamProfile>, ApiError> {
    let teams = ctx.storage.list_teams().await.map_err(internal)?;
    Ok(teams.into_iter().map(profile).collect())
}

pub async fn get_team(ctx: &ApiContext, team_id: TeamId) -> Result<TeamProfile, ApiError> {
    load_team(ctx, team_id).await.map(profile)
}

pub async fn create_team(
    ctx: &ApiContext,
    request: &CreateTeamRequest,
) -> Result<TeamProfile, ApiError> {
    let name = required_name(&request.name, "team")?;
    let members = clean_members(&request.members);
    let college = request
        .college
        .as_deref()
        .map(str::trim)
        .filter(|college| !college.is_empty());
    let team_id = ctx
        .storage
        .create_team(name, college, &members)
        .await
        .map_err(internal)?;
    get_team(ctx, team_id).await
}

pub async fn update_team(
    ctx: &ApiContext,
    team_id: TeamId,
    request: &UpdateTeamRequest,
) -> Result<TeamProfile, ApiError> {
    let name = request
        .name
        .as_deref()
        .map(|name| required_name(name, "team"))
        .transpose()?;
    let update = UpdateTeamRequest {
        name: name.map(str::to_string),
        college: request.college.as_deref().map(|college| college.trim().to_string()),
        members: request.members.as_deref().map(clean_members),
    };
    let updated = ctx
        .storage
        .update_team(team_id, &update)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(team_not_found(team_id));
    }
    get_team(ctx, team_id).await
}

/// Removes a team from the registry and every roster. Its stored
/// submissions remain but drop out of all leaderboards.
pub async fn delete_team(ctx: &ApiContext, team_id: TeamId) -> Result<ServerEvent, ApiError> {
    let deleted = ctx.storage.delete_team(team_id).await.map_err(internal)?;
    if !deleted {
        return Err(team_not_found(team_id));
    }
    info!(team_id = %team_id, "team deleted");
    Ok(ServerEvent::TeamDeleted { team_id })
}

pub async fn list_judges(ctx: &ApiContext) -> Result<Vec<JudgeSummary>, ApiError> {
    ctx.storage.list_judges().await.map_err(internal)
}

pub async fn create_judge(
    ctx: &ApiContext,
    request: &CreateJudgeRequest,
) -> Result<JudgeSummary, ApiError> {
    let name = required_name(&request.name, "judge")?;
    let judge_id = ctx.storage.create_judge(name).await.map_err(internal)?;
    Ok(JudgeSummary {
        id: judge_id,
        name: name.to_string(),
    })
}

pub async fn get_judge(ctx: &ApiContext, judge_id: JudgeId) -> Result<JudgeSummary, ApiError> {
    ctx.storage
        .load_judge(judge_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| judge_not_found(judge_id))
}

pub async fn update_judge(
    ctx: &ApiContext,
    judge_id: JudgeId,
    request: &UpdateJudgeRequest,
) -> Result<JudgeSummary, ApiError> {
    let name = required_name(&request.name, "judge")?;
    let updated = ctx
        .storage
        .update_judge(judge_id, name)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(judge_not_found(judge_id));
    }
    Ok(JudgeSummary {
        id: judge_id,
        name: name.to_string(),
    })
}

/// Submissions by a deleted judge keep counting toward team totals.
pub async fn delete_judge(ctx: &ApiContext, judge_id: JudgeId) -> Result<(), ApiError> {
    let deleted = ctx.storage.delete_judge(judge_id).await.map_err(internal)?;
    if !deleted {
        return Err(judge_not_found(judge_id));
    }
    info!(judge_id = %judge_id, "judge deleted");
    Ok(())
}

/// Re-validates a judge's submission against the stored rubric and roster,
/// then records it. Every accepted submission is kept, including repeats by
/// the same judge for the same team.
pub async fn submit_score(
    ctx: &ApiContext,
    request: &ScoreSubmissionRequest,
) -> Result<ScoreRecord, ApiError> {
    let catalog = load_catalog(ctx, request.round_id).await?;
    let submission = ScoreSubmission::from_request(request, &catalog).map_err(|err| {
        warn!(
            round_id = %request.round_id,
            team_id = %request.team_id,
            error = %err,
            "score rejected"
        );
        ApiError::from(err)
    })?;

    let on_roster = ctx
        .storage
        .team_in_round(submission.round_id(), submission.team_id())
        .await
        .map_err(internal)?;
    if !on_roster {
        return Err(ApiError::validation(format!(
            "team {} is not assigned to round {}",
            submission.team_id(),
            submission.round_id()
        )));
    }
    if ctx
        .storage
        .load_judge(submission.judge_id())
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err(ApiError::validation(format!(
            "judge {} does not exist",
            submission.judge_id()
        )));
    }

    let score_id = ctx
        .storage
        .insert_score(
            submission.round_id(),
            submission.team_id(),
            submission.judge_id(),
            submission.scores(),
        )
        .await
        .map_err(internal)?;
    info!(
        score_id = %score_id,
        round_id = %submission.round_id(),
        team_id = %submission.team_id(),
        judge_id = %submission.judge_id(),
        total = submission.total(),
        "score recorded"
    );
    load_score(ctx, score_id).await
}

/// Replaces the per-criterion scores of a stored submission.
pub async fn update_score(
    ctx: &ApiContext,
    score_id: ScoreId,
    request: &UpdateScoreRequest,
) -> Result<ScoreRecord, ApiError> {
    let existing = load_score(ctx, score_id).await?;
    let catalog = load_catalog(ctx, existing.round_id).await?;
    let entries = checked_scores(&request.scores_by_criterion, &catalog)?;
    let updated = ctx
        .storage
        .update_score_entries(score_id, &entries)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(score_not_found(score_id));
    }
    info!(score_id = %score_id, round_id = %existing.round_id, "score corrected");
    load_score(ctx, score_id).await
}

/// Event announcing a stored or corrected submission. Records that lost
/// their team produce no event.
pub fn score_event(record: &ScoreRecord, corrected: bool) -> Option<ServerEvent> {
    let team_id = record.team.as_ref()?.id;
    let (round_id, score_id) = (record.round_id, record.id);
    Some(if corrected {
        ServerEvent::ScoreUpdated {
            round_id,
            team_id,
            score_id,
        }
    } else {
        ServerEvent::ScoreRecorded {
            round_id,
            team_id,
            score_id,
        }
    })
}

async fn load_catalog(ctx: &ApiContext, round_id: RoundId) -> Result<CriterionCatalog, ApiError> {
    let round = get_round(ctx, round_id).await?;
    Ok(CriterionCatalog::new(round_id, round.criteria)?)
}

async fn ensure_round_exists(ctx: &ApiContext, round_id: RoundId) -> Result<(), ApiError> {
    get_round(ctx, round_id).await.map(|_| ())
}

async fn load_team(ctx: &ApiContext, team_id: TeamId) -> Result<StoredTeam, ApiError> {
    ctx.storage
        .load_team(team_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| team_not_found(team_id))
}

async fn load_score(ctx: &ApiContext, score_id: ScoreId) -> Result<ScoreRecord, ApiError> {
    ctx.storage
        .load_score(score_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| score_not_found(score_id))
}

fn validate_criteria(criteria: &[NewCriterion]) -> Result<(), ApiError> {
    for criterion in criteria {
        validate_authored_criterion(criterion)?;
    }
    Ok(())
}

fn required_name<'a>(raw: &'a str, what: &str) -> Result<&'a str, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::validation(format!("{what} name must not be blank")));
    }
    Ok(name)
}

fn clean_members(members: &[String]) -> Vec<String> {
    members
        .iter()
        .map(|member| member.trim())
        .filter(|member| !member.is_empty())
        .map(str::to_string)
        .collect()
}

fn profile(team: StoredTeam) -> TeamProfile {
    TeamProfile {
        id: team.team_id,
        name: team.name,
        college: team.college,
        members: team.members,
    }
}

fn round_not_found(round_id: RoundId) -> ApiError {
    ApiError::not_found(format!("round {round_id} not found"))
}

fn team_not_found(team_id: TeamId) -> ApiError {
    ApiError::not_found(format!("team {team_id} not found"))
}

fn judge_not_found(judge_id: JudgeId) -> ApiError {
    ApiError::not_found(format!("judge {judge_id} not found"))
}

fn score_not_found(score_id: ScoreId) -> ApiError {
    ApiError::not_found(format!("score {score_id} not found"))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{domain::RoundStatus, protocol::CriterionScore};

    struct Fixture {
        ctx: ApiContext,
        round: RoundSummary,
        team: TeamId,
        judge: JudgeSummary,
    }

    async fn setup() -> Fixture {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let ctx = ApiContext { storage };
        let round = create_round(
            &ctx,
            &CreateRoundRequest {
                name: "Finals".into(),
                description: None,
                status: RoundStatus::Live,
                criteria: vec![
                    NewCriterion {
                        name: "Creativity".into(),
                        max_score: 10,
                    },
                    NewCriterion {
                        name: "Timing".into(),
                        max_score: 10,
                    },
                ],
            },
        )
        .await
        .expect("round");
        let team = create_team(
            &ctx,
            &CreateTeamRequest {
                name: "Beat Street".into(),
                college: None,
                members: vec!["Ana".into(), "  ".into(), "Ben".into()],
            },
        )
        .await
        .expect("team");
        assign_team(&ctx, round.id, team.id).await.expect("assign");
        let judge = create_judge(&ctx, &CreateJudgeRequest { name: "Dee".into() })
            .await
            .expect("judge");
        Fixture {
            ctx,
            round,
            team: team.id,
            judge,
        }
    }

    fn request(fx: &Fixture, scores: [u32; 2]) -> ScoreSubmissionRequest {
        ScoreSubmissionRequest {
            team_id: fx.team,
            round_id: fx.round.id,
            judge_id: fx.judge.id,
            scores_by_criterion: fx
                .round
                .criteria
                .iter()
                .zip(scores)
                .map(|(criterion, score)| CriterionScore {
                    criterion_id: criterion.id,
                    score,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let ctx = ApiContext { storage };
        let err = create_round(
            &ctx,
            &CreateRoundRequest {
                name: "R".into(),
                description: None,
                status: RoundStatus::Upcoming,
                criteria: vec![NewCriterion {
                    name: "  ".into(),
                    max_score: 5,
                }],
            },
        )
        .await
        .expect_err("blank criterion");
        assert_eq!(err.code, ErrorCode::Validation);

        let err = create_judge(&ctx, &CreateJudgeRequest { name: " ".into() })
            .await
            .expect_err("blank judge");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn round_without_criteria_reports_not_found() {
        let fx = setup().await;
        let empty = create_round(
            &fx.ctx,
            &CreateRoundRequest {
                name: "Empty".into(),
                description: None,
                status: RoundStatus::Upcoming,
                criteria: Vec::new(),
            },
        )
        .await
        .expect("round");

        let err = round_criteria(&fx.ctx, empty.id).await.expect_err("empty");
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = round_criteria(&fx.ctx, RoundId(404))
            .await
            .expect_err("missing");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(
            round_criteria(&fx.ctx, fx.round.id).await.expect("criteria"),
            fx.round.criteria
        );
    }

    #[tokio::test]
    async fn member_names_are_trimmed() {
        let fx = setup().await;
        let team = get_team(&fx.ctx, fx.team).await.expect("team");
        assert_eq!(team.members, vec!["Ana".to_string(), "Ben".to_string()]);
        let roster = round_teams(&fx.ctx, fx.round.id).await.expect("roster");
        assert_eq!(roster[0].member_count, 2);
    }

    #[tokio::test]
    async fn accepted_submission_is_listed_and_ranked() {
        let fx = setup().await;
        let record = submit_score(&fx.ctx, &request(&fx, [8, 7]))
            .await
            .expect("submit");
        assert_eq!(record.total_score, Some(15));
        assert!(matches!(
            score_event(&record, false),
            Some(ServerEvent::ScoreRecorded { team_id, .. }) if team_id == fx.team
        ));

        submit_score(&fx.ctx, &request(&fx, [9, 6]))
            .await
            .expect("second judge pass");

        let board = round_leaderboard(&fx.ctx, fx.round.id)
            .await
            .expect("leaderboard");
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].total_score, 30);
        assert_eq!(overall_leaderboard(&fx.ctx).await.expect("overall"), board);
    }

    #[tokio::test]
    async fn out_of_range_submission_is_validation_error() {
        let fx = setup().await;
        let err = submit_score(&fx.ctx, &request(&fx, [11, 0]))
            .await
            .expect_err("out of range");
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.message, "score for Creativity must be 0-10");
        assert!(round_scores(&fx.ctx, fx.round.id)
            .await
            .expect("scores")
            .is_empty());
    }

    #[tokio::test]
    async fn unassigned_team_and_unknown_judge_are_rejected() {
        let fx = setup().await;
        let outsider = create_team(
            &fx.ctx,
            &CreateTeamRequest {
                name: "Outsiders".into(),
                college: None,
                members: Vec::new(),
            },
        )
        .await
        .expect("team");

        let mut wrong_team = request(&fx, [1, 1]);
        wrong_team.team_id = outsider.id;
        let err = submit_score(&fx.ctx, &wrong_team)
            .await
            .expect_err("not on roster");
        assert_eq!(err.code, ErrorCode::Validation);

        let mut ghost_judge = request(&fx, [1, 1]);
        ghost_judge.judge_id = JudgeId(999);
        let err = submit_score(&fx.ctx, &ghost_judge)
            .await
            .expect_err("unknown judge");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn correction_replaces_scores() {
        let fx = setup().await;
        let record = submit_score(&fx.ctx, &request(&fx, [2, 2]))
            .await
            .expect("submit");

        let corrected = update_score(
            &fx.ctx,
            record.id,
            &UpdateScoreRequest {
                scores_by_criterion: request(&fx, [9, 9]).scores_by_criterion,
            },
        )
        .await
        .expect("update");
        assert_eq!(corrected.total_score, Some(18));
        assert!(matches!(
            score_event(&corrected, true),
            Some(ServerEvent::ScoreUpdated { .. })
        ));

        let err = update_score(
            &fx.ctx,
            record.id,
            &UpdateScoreRequest {
                scores_by_criterion: request(&fx, [9, 9]).scores_by_criterion[..1].to_vec(),
            },
        )
        .await
        .expect_err("partial");
        assert_eq!(err.code, ErrorCode::Validation);

        let err = update_score(
            &fx.ctx,
            ScoreId(999),
            &UpdateScoreRequest {
                scores_by_criterion: Vec::new(),
            },
        )
        .await
        .expect_err("missing");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn update_and_delete_round_emit_events() {
        let fx = setup().await;
        let event = update_round(
            &fx.ctx,
            fx.round.id,
            &UpdateRoundRequest {
                status: Some(RoundStatus::Finished),
                ..UpdateRoundRequest::default()
            },
        )
        .await
        .expect("update");
        assert!(matches!(
            event,
            ServerEvent::RoundUpdated { ref round } if round.status == RoundStatus::Finished
        ));

        let event = delete_round(&fx.ctx, fx.round.id).await.expect("delete");
        assert_eq!(event.affected_round(), Some(fx.round.id));
        let err = get_round(&fx.ctx, fx.round.id).await.expect_err("gone");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn removing_criteria_keeps_totals_consistent() {
        let fx = setup().await;
        submit_score(&fx.ctx, &request(&fx, [8, 7]))
            .await
            .expect("submit");

        let removal = |index: usize| UpdateRoundRequest {
            remove_criterion_ids: vec![fx.round.criteria[index].id],
            ..UpdateRoundRequest::default()
        };

        update_round(&fx.ctx, fx.round.id, &removal(0))
            .await
            .expect("remove first");
        let records = round_scores(&fx.ctx, fx.round.id).await.expect("scores");
        let breakdown: u64 = records[0]
            .scores_by_criterion
            .iter()
            .map(|entry| u64::from(entry.score))
            .sum();
        assert_eq!(records[0].total_score, Some(breakdown));
        let board = round_leaderboard(&fx.ctx, fx.round.id)
            .await
            .expect("leaderboard");
        assert_eq!(board[0].total_score, 7);

        update_round(&fx.ctx, fx.round.id, &removal(1))
            .await
            .expect("remove second");
        let records = round_scores(&fx.ctx, fx.round.id).await.expect("scores");
        assert!(records[0].scores_by_criterion.is_empty());
        assert_eq!(records[0].total_score, Some(0));
        let board = round_leaderboard(&fx.ctx, fx.round.id)
            .await
            .expect("leaderboard");
        assert_eq!(board[0].total_score, 0);
    }

    #[tokio::test]
    async fn deleted_team_drops_out_of_leaderboards() {
        let fx = setup().await;
        submit_score(&fx.ctx, &request(&fx, [5, 5]))
            .await
            .expect("submit");

        let event = delete_team(&fx.ctx, fx.team).await.expect("delete");
        assert!(matches!(event, ServerEvent::TeamDeleted { team_id } if team_id == fx.team));
        assert_eq!(
            delete_team(&fx.ctx, fx.team).await.expect_err("again").code,
            ErrorCode::NotFound
        );

        let records = round_scores(&fx.ctx, fx.round.id).await.expect("scores");
        assert_eq!(records.len(), 1);
        assert_eq!(aggregate(&records).skipped(), 1);
        assert!(round_leaderboard(&fx.ctx, fx.round.id)
            .await
            .expect("leaderboard")
            .is_empty());
        assert!(round_teams(&fx.ctx, fx.round.id)
            .await
            .expect("roster")
            .is_empty());
    }

    #[tokio::test]
    async fn team_edits_are_trimmed_and_validated() {
        let fx = setup().await;
        let team = update_team(
            &fx.ctx,
            fx.team,
            &UpdateTeamRequest {
                name: Some("  Bass Line ".into()),
                college: None,
                members: Some(vec![" Cy ".into(), "".into()]),
            },
        )
        .await
        .expect("update");
        assert_eq!(team.name, "Bass Line");
        assert_eq!(team.members, vec!["Cy".to_string()]);

        let err = update_team(
            &fx.ctx,
            fx.team,
            &UpdateTeamRequest {
                name: Some(" ".into()),
                ..UpdateTeamRequest::default()
            },
        )
        .await
        .expect_err("blank");
        assert_eq!(err.code, ErrorCode::Validation);

        let err = update_team(&fx.ctx, TeamId(404), &UpdateTeamRequest::default())
            .await
            .expect_err("missing");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn judge_registry_round_trip() {
        let fx = setup().await;
        assert_eq!(get_judge(&fx.ctx, fx.judge.id).await.expect("get"), fx.judge);

        let renamed = update_judge(
            &fx.ctx,
            fx.judge.id,
            &UpdateJudgeRequest {
                name: " Judge Dee ".into(),
            },
        )
        .await
        .expect("rename");
        assert_eq!(renamed.name, "Judge Dee");

        submit_score(&fx.ctx, &request(&fx, [3, 4]))
            .await
            .expect("submit");
        delete_judge(&fx.ctx, fx.judge.id).await.expect("delete");
        assert_eq!(
            get_judge(&fx.ctx, fx.judge.id).await.expect_err("gone").code,
            ErrorCode::NotFound
        );
        let board = round_leaderboard(&fx.ctx, fx.round.id)
            .await
            .expect("leaderboard");
        assert_eq!(board[0].total_score, 7);
    }
}
