use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scoring::{aggregate, validate_authored_criterion};
use shared::{
    domain::{RoundId, RoundStatus, TeamId},
    protocol::{NewCriterion, UpdateRoundRequest},
};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/scoring.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a round. Each `--criterion` is `NAME:MAX_SCORE`.
    CreateRound {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "upcoming")]
        status: String,
        #[arg(long = "criterion", value_name = "NAME:MAX_SCORE")]
        criteria: Vec<String>,
    },
    SetRoundStatus {
        round_id: i64,
        status: String,
    },
    DeleteRound {
        round_id: i64,
    },
    CreateTeam {
        name: String,
        #[arg(long)]
        college: Option<String>,
        #[arg(long = "member")]
        members: Vec<String>,
    },
    DeleteTeam {
        team_id: i64,
    },
    AssignTeam {
        round_id: i64,
        team_id: i64,
    },
    CreateJudge {
        name: String,
    },
    /// Print the aggregated leaderboard of one round.
    Standings {
        round_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateRound {
            name,
            description,
            status,
            criteria,
        } => {
            let status = parse_status(&status)?;
            let criteria = criteria
                .iter()
                .map(|raw| parse_criterion(raw))
                .collect::<Result<Vec<_>>>()?;
            let round_id = storage
                .create_round(name.trim(), description.as_deref(), status, &criteria)
                .await?;
            println!(
                "created round_id={} with {} criteria",
                round_id.0,
                criteria.len()
            );
        }
        Command::SetRoundStatus { round_id, status } => {
            let update = UpdateRoundRequest {
                status: Some(parse_status(&status)?),
                ..UpdateRoundRequest::default()
            };
            if !storage.update_round(RoundId(round_id), &update).await? {
                bail!("round {round_id} not found");
            }
            println!("round_id={round_id} is now {status}");
        }
        Command::DeleteRound { round_id } => {
            if !storage.delete_round(RoundId(round_id)).await? {
                bail!("round {round_id} not found");
            }
            println!("deleted round_id={round_id}");
        }
        Command::CreateTeam {
            name,
            college,
            members,
        } => {
            let members: Vec<String> = members
                .iter()
                .map(|member| member.trim().to_string())
                .filter(|member| !member.is_empty())
                .collect();
            let team_id = storage
                .create_team(name.trim(), college.as_deref(), &members)
                .await?;
            println!(
                "created team_id={} with {} members",
                team_id.0,
                members.len()
            );
        }
        Command::DeleteTeam { team_id } => {
            if !storage.delete_team(TeamId(team_id)).await? {
                bail!("team {team_id} not found");
            }
            println!("deleted team_id={team_id}; its submissions no longer count toward totals");
        }
        Command::AssignTeam { round_id, team_id } => {
            if storage.load_round(RoundId(round_id)).await?.is_none() {
                bail!("round {round_id} not found");
            }
            if storage.load_team(TeamId(team_id)).await?.is_none() {
                bail!("team {team_id} not found");
            }
            storage
                .assign_team_to_round(RoundId(round_id), TeamId(team_id))
                .await?;
            println!("assigned team_id={team_id} to round_id={round_id}");
        }
        Command::CreateJudge { name } => {
            let judge_id = storage.create_judge(name.trim()).await?;
            println!("created judge_id={}", judge_id.0);
        }
        Command::Standings { round_id } => {
            let records = storage.list_scores_for_round(RoundId(round_id)).await?;
            let board = aggregate(&records);
            for (rank, entry) in board.ranked() {
                println!("{rank:>3}. {:<24} {:>6}", entry.team_name, entry.total_score);
            }
            if board.skipped() > 0 {
                println!("({} submissions without a team were skipped)", board.skipped());
            }
        }
    }

    Ok(())
}

fn parse_status(raw: &str) -> Result<RoundStatus> {
    RoundStatus::parse(raw)
        .with_context(|| format!("unknown round status '{raw}'; use upcoming, live or finished"))
}

fn parse_criterion(raw: &str) -> Result<NewCriterion> {
    let (name, max_score) = raw
        .rsplit_once(':')
        .with_context(|| format!("expected NAME:MAX_SCORE, got '{raw}'"))?;
    let max_score = max_score
        .trim()
        .parse::<u32>()
        .with_context(|| format!("max score of '{name}' must be a whole number"))?;
    let criterion = NewCriterion {
        name: name.trim().to_string(),
        max_score,
    };
    validate_authored_criterion(&criterion)?;
    Ok(criterion)
}
