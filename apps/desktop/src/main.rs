use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{ClientEvent, HttpScoringBackend, JudgeClient, ScoringBackend};
use scoring::Readiness;
use shared::{
    domain::{AggregatedTeamScore, Criterion, JudgeId, RoundId, TeamId},
    protocol::ServerEvent,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Judge console for scoring rounds")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    /// Print results as JSON instead of tables.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Rounds,
    Judges,
    /// Score one team in a round. Each `--score` is `CRITERION=VALUE`, where
    /// CRITERION is the criterion name or id.
    Score {
        #[arg(long)]
        round: i64,
        #[arg(long)]
        judge: i64,
        #[arg(long)]
        team: i64,
        #[arg(long = "score", value_name = "CRITERION=VALUE", required = true)]
        scores: Vec<String>,
    },
    Leaderboard {
        #[arg(long)]
        round: Option<i64>,
    },
    /// Print the round leaderboard and reprint it whenever scores land.
    Watch {
        #[arg(long)]
        round: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let backend = Arc::new(HttpScoringBackend::new(&args.server_url)?);
    let client = JudgeClient::new_with_backend(Arc::clone(&backend) as Arc<dyn ScoringBackend>);

    match args.command {
        Command::Rounds => {
            let rounds = backend.list_rounds().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&rounds)?);
            } else {
                for round in rounds {
                    println!(
                        "{:>4}  {:<10} {} ({} criteria)",
                        round.id,
                        round.status.as_str(),
                        round.name,
                        round.criteria.len()
                    );
                }
            }
        }
        Command::Judges => {
            let judges = backend.list_judges().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&judges)?);
            } else {
                for judge in judges {
                    println!("{:>4}  {}", judge.id, judge.name);
                }
            }
        }
        Command::Score {
            round,
            judge,
            team,
            scores,
        } => {
            score_team(&client, RoundId(round), JudgeId(judge), TeamId(team), &scores).await?;
        }
        Command::Leaderboard { round: Some(round) } => {
            let board = client.refresh_round_leaderboard(RoundId(round)).await?;
            print_leaderboard(board.entries(), args.json)?;
        }
        Command::Leaderboard { round: None } => {
            let board = client.overall_leaderboard().await?;
            print_leaderboard(&board, args.json)?;
        }
        Command::Watch { round } => {
            watch_round(&client, &args.server_url, RoundId(round), args.json).await?;
        }
    }

    Ok(())
}

async fn score_team(
    client: &JudgeClient,
    round_id: RoundId,
    judge_id: JudgeId,
    team_id: TeamId,
    raw_scores: &[String],
) -> Result<()> {
    if let Readiness::Failed(reasons) = client.start_session(round_id, judge_id).await {
        bail!("round {round_id} cannot be scored: {}", reasons.join("; "));
    }
    client.select_team(team_id).await?;

    let view = client
        .view()
        .await
        .ok_or_else(|| anyhow!("scoring session closed unexpectedly"))?;
    for raw in raw_scores {
        let (key, value) = parse_score_arg(raw)?;
        let criterion = resolve_criterion(&view.criteria, key)?;
        client.enter_score(criterion.id, value).await?;
    }

    let record = client.submit().await?;
    info!(score_id = %record.id, "submission stored");
    let team_name = view
        .selected_team
        .map(|team| team.name)
        .unwrap_or_else(|| team_id.to_string());
    let total: u64 = record
        .scores_by_criterion
        .iter()
        .map(|entry| u64::from(entry.score))
        .sum();
    println!(
        "recorded score_id={} for {team_name} in round {round_id}: total {total}",
        record.id
    );
    client.end_session().await;
    Ok(())
}

async fn watch_round(
    client: &Arc<JudgeClient>,
    server_url: &str,
    round_id: RoundId,
    json: bool,
) -> Result<()> {
    let mut events = client.subscribe_events();
    let board = client.refresh_round_leaderboard(round_id).await?;
    print_leaderboard(board.entries(), json)?;
    // The initial refresh already printed; skip its event.
    let _ = events.try_recv();

    let stream = client.spawn_event_stream(server_url, Some(round_id)).await?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ClientEvent::LeaderboardUpdated { leaderboard, .. }) => {
                    print_leaderboard(leaderboard.entries(), json)?;
                }
                Ok(ClientEvent::Server(ServerEvent::RoundDeleted { .. })) => {
                    println!("round {round_id} was deleted");
                    break;
                }
                Ok(ClientEvent::Error(message)) => warn!(%message, "event stream error"),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "fell behind on client events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    stream.abort();
    Ok(())
}

fn print_leaderboard(entries: &[AggregatedTeamScore], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("no scores yet");
        return Ok(());
    }
    for (rank, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}. {:<24} {:>6}  ({} members)",
            rank + 1,
            entry.team_name,
            entry.total_score,
            entry.member_count
        );
    }
    Ok(())
}

fn parse_score_arg(raw: &str) -> Result<(&str, &str)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected CRITERION=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("missing criterion in '{raw}'");
    }
    Ok((key, value))
}

fn resolve_criterion<'a>(criteria: &'a [Criterion], key: &str) -> Result<&'a Criterion> {
    if let Ok(id) = key.parse::<i64>() {
        if let Some(criterion) = criteria.iter().find(|criterion| criterion.id.0 == id) {
            return Ok(criterion);
        }
    }
    criteria
        .iter()
        .find(|criterion| criterion.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| anyhow!("round has no criterion named '{key}'"))
}
