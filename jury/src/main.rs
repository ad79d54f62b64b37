//! Main entry point for the jury binary
//!
//! Validates startup settings, then runs a judging round against the
//! in-memory store: judges work concurrently through their assignments,
//! voting by a hidden project quality blurred with noise, and the resulting
//! leaderboard and statistics are printed as JSON.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use futures_util::future::join_all;
use rand::Rng;

use jury::services::{InMemoryStore, ManualClock, RealEnvSource};
use jury::{parse_devpost, EngineResult, JudgingService, JurySettings};
use shared::{
    judge_debug, logging, AssignmentOutcome, FlagReason, GroupLayout, JudgeId, NewJudge,
    NewProject, ProjectId,
};

type Service = JudgingService<InMemoryStore, InMemoryStore, ManualClock>;

/// Pairwise judging engine with a built-in simulated event
#[derive(Parser)]
#[command(name = "jury")]
#[command(about = "Runs a simulated judging round and prints the resulting ranking")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Number of simulated judges
    #[arg(long, default_value = "6")]
    pub judges: usize,

    /// Number of simulated projects
    #[arg(long, default_value = "24")]
    pub projects: i64,

    /// Table groups when JURY_GROUPS is not set
    #[arg(long, default_value = "3")]
    pub groups: i64,

    /// Assignments each judge asks for at most
    #[arg(long, default_value = "40")]
    pub rounds: usize,

    /// How far a judge's impression may stray from the true quality
    #[arg(long, default_value = "0.5")]
    pub noise: f64,

    /// Judge sheet (name, email, notes; with header) used instead of generated judges
    #[arg(long)]
    pub judges_csv: Option<PathBuf>,

    /// Devpost export used instead of generated projects
    #[arg(long)]
    pub devpost_csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing_with_level(Some(&args.log_level));

    let settings = match JurySettings::load(&RealEnvSource::new()) {
        Ok(settings) => settings,
        Err(err) => {
            logging::log_error("Startup configuration", &err);
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    logging::log_startup("jury judging round");
    tracing::debug!(email_from = %settings.email_from, "settings loaded");

    let judge_sheet = match &args.judges_csv {
        Some(path) => Some(read_input(path).await?),
        None => None,
    };
    let devpost_export = match &args.devpost_csv {
        Some(path) => Some(read_input(path).await?),
        None => None,
    };
    let project_count = match &devpost_export {
        Some(data) => parse_devpost(data)
            .context("Invalid Devpost export")?
            .projects
            .len() as i64,
        None => args.projects,
    };

    let mut config = settings.engine;
    let groups = args.groups.min(project_count);
    if config.group_layout.is_empty() && groups > 1 {
        config.group_layout = GroupLayout::even(project_count, groups)
            .context("Invalid --groups for the number of projects")?;
    }
    let idle_timeout = config.idle_timeout;

    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = Arc::new(
        JudgingService::new(store.clone(), store, clock.clone(), config)
            .context("Failed to build judging service")?,
    );

    let projects = match &devpost_export {
        Some(data) => service.import_devpost(data).await?,
        None => {
            let mut projects = Vec::with_capacity(args.projects.max(0) as usize);
            for i in 0..args.projects {
                let project = service
                    .add_project(NewProject {
                        name: format!("Project {}", i + 1),
                        description: format!("Demo at table {}", i + 1),
                        ..Default::default()
                    })
                    .await?;
                projects.push(project);
            }
            projects
        }
    };
    let quality: HashMap<ProjectId, f64> = {
        let mut rng = rand::thread_rng();
        projects
            .iter()
            .map(|p| (p.id, rng.gen_range(-2.0..2.0)))
            .collect()
    };
    let quality = Arc::new(quality);

    let judges = match &judge_sheet {
        Some(data) => service.import_judges(data, true).await?,
        None => {
            let mut judges = Vec::with_capacity(args.judges);
            for i in 0..args.judges {
                let judge = service
                    .add_judge(NewJudge {
                        name: format!("Judge {}", i + 1),
                        email: format!("judge{}@example.com", i + 1),
                        notes: String::new(),
                    })
                    .await?;
                judges.push(judge);
            }
            judges
        }
    };
    let judge_ids: Vec<JudgeId> = judges.iter().map(|j| j.id).collect();

    let tasks = judge_ids.iter().map(|&judge_id| {
        let service = service.clone();
        let quality = quality.clone();
        let (rounds, noise) = (args.rounds, args.noise.abs());
        tokio::spawn(async move { run_judge(service, judge_id, quality, rounds, noise).await })
    });

    let mut votes = 0;
    for result in join_all(tasks).await {
        votes += result.context("Judge task panicked")??;
    }
    logging::log_success(&format!("{votes} votes recorded"));

    // Everyone has gone quiet; let the idle sweep clear the rotation
    clock.advance(idle_timeout + chrono::Duration::minutes(1));
    let evicted = service.evict_idle().await?;
    tracing::info!(evicted = evicted.len(), "idle judges evicted");

    let report = serde_json::json!({
        "leaderboard": service.leaderboard().await?,
        "stats": service.stats().await?,
        "flags": service.flags().await?.len(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to encode report")?
    );

    logging::log_shutdown("judging round finished");
    Ok(())
}

async fn read_input(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Drive one judge until it has seen everything or runs out of rounds
async fn run_judge(
    service: Arc<Service>,
    judge_id: JudgeId,
    quality: Arc<HashMap<ProjectId, f64>>,
    rounds: usize,
    noise: f64,
) -> EngineResult<usize> {
    let mut votes = 0;
    for _ in 0..rounds {
        match service.request_assignment(judge_id).await? {
            AssignmentOutcome::Assigned(assignment) => match assignment.partner {
                Some(partner) => {
                    let (winner, loser) =
                        perceive(&quality, assignment.project.id, partner.id, noise);
                    service.submit_vote(judge_id, winner, loser).await?;
                    votes += 1;
                }
                None => {
                    service.skip_project(judge_id, FlagReason::Busy).await?;
                }
            },
            AssignmentOutcome::ProjectsBusy { .. } => tokio::task::yield_now().await,
            AssignmentOutcome::JudgingComplete { .. } | AssignmentOutcome::NoActiveJudges => break,
        }
    }
    judge_debug!(judge_id, "simulate", votes, "judge finished");
    Ok(votes)
}

/// Which of the two the judge prefers, given noisy impressions
fn perceive(
    quality: &HashMap<ProjectId, f64>,
    a: ProjectId,
    b: ProjectId,
    noise: f64,
) -> (ProjectId, ProjectId) {
    let mut rng = rand::thread_rng();
    let mut impression = |id: ProjectId| {
        quality.get(&id).copied().unwrap_or_default() + rng.gen_range(-noise..=noise)
    };
    if impression(a) >= impression(b) {
        (a, b)
    } else {
        (b, a)
    }
}
