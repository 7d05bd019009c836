//! Autopilot - competitive improvement loop
//!
//! Command-line driver. Exit status carries the cycle decision: 0 continue,
//! 10 escalate, 11 pivot, 2 branch guard, 3 already running, 7 config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use autopilot::config::validation::ValidationReport;
use autopilot::cycle::{now_utc, CycleReport};
use autopilot::operations::{GhMetricsProvider, RealGitOperations, ShellCommandRunner};
use autopilot::persistence::JsonDocument;
use autopilot::{
    AutopilotConfig, CycleController, CycleOptions, CycleState, Result, ScoreEngine, Snapshot,
    TaskQueue, TaskStatus,
};

#[derive(Parser)]
#[command(name = "autopilot")]
#[command(version = "0.1.0")]
#[command(about = "Fetch market metrics, run the next queued task and re-score", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, env = "AUTOPILOT_PROJECT", default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle, or keep cycling with --loop
    Run {
        /// Repeat until a cycle escalates or pivots
        #[arg(long = "loop")]
        repeat: bool,

        /// Seconds to sleep between cycles (overrides loop_sleep_secs)
        #[arg(long, value_name = "SECS")]
        sleep: Option<u64>,

        /// Do not commit changed documents
        #[arg(long)]
        no_commit: bool,

        /// Commit but do not push
        #[arg(long)]
        no_push: bool,
    },

    /// Show scores, loop state and queue without changing anything
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate autopilot.toml
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "autopilot=debug,info"
    } else {
        "autopilot=info,warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(1);
    }

    let code = match dispatch(cli.command, &project_path).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn dispatch(command: Commands, project_path: &Path) -> Result<i32> {
    match command {
        Commands::Run {
            repeat,
            sleep,
            no_commit,
            no_push,
        } => {
            let config = AutopilotConfig::load(project_path)?;
            let sleep = sleep.map_or_else(|| config.loop_sleep(), Duration::from_secs);
            let self_entity = config.self_entity.clone();

            let controller = CycleController::new(
                project_path,
                config.clone(),
                RealGitOperations::new(project_path.to_path_buf()),
                GhMetricsProvider::new(),
                ShellCommandRunner::new(project_path.to_path_buf(), config.task_shell.clone()),
            )
            .with_options(CycleOptions {
                commit: !no_commit,
                push: !no_commit && !no_push,
            });

            if !GhMetricsProvider::is_available() {
                println!(
                    "{} gh CLI not found, using previous snapshot or defaults",
                    "Warning:".yellow()
                );
            }

            let report = if repeat {
                controller
                    .run_loop(sleep, |r| print_cycle(r, &self_entity))
                    .await?
            } else {
                let report = controller.run_cycle().await?;
                print_cycle(&report, &self_entity);
                report
            };
            Ok(report.decision.exit_code())
        }

        Commands::Status { json } => {
            show_status(project_path, json)?;
            Ok(0)
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                let config = AutopilotConfig::load(project_path)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    print_config(&config, project_path);
                }
                Ok(0)
            }

            ConfigAction::Validate => {
                let config_path = AutopilotConfig::config_path(project_path);
                if !config_path.exists() {
                    println!(
                        "{} {} not found (using defaults)",
                        "Info:".blue(),
                        config_path.display()
                    );
                }

                let config = AutopilotConfig::load_unchecked(project_path)?;
                let report = ValidationReport::check(&config);
                for issue in &report.errors {
                    eprintln!("{} {}", "Error:".red(), issue);
                }
                for issue in &report.warnings {
                    println!("{} {}", "Warning:".yellow(), issue);
                }

                if report.is_valid() {
                    println!("{} {}", "OK".green(), report.summary());
                    Ok(0)
                } else {
                    eprintln!("{}", report.summary());
                    Ok(autopilot::error::EXIT_CONFIG)
                }
            }
        },
    }
}

fn print_cycle(report: &CycleReport, self_entity: &str) {
    let decision = match report.decision {
        autopilot::Decision::Continue => report.decision.to_string().green(),
        autopilot::Decision::Escalate => report.decision.to_string().yellow().bold(),
        autopilot::Decision::Pivot => report.decision.to_string().red().bold(),
    };
    println!(
        "{} task: {} | {} score: {} (delta {:+}) | no-delta cycles: {} | decision: {}",
        "[autopilot]".cyan().bold(),
        report.outcome,
        self_entity,
        report.total,
        report.delta,
        report.no_delta_cycles,
        decision
    );
}

fn print_config(config: &AutopilotConfig, project_path: &Path) {
    println!("\n{} Autopilot Configuration", "Config:".cyan().bold());
    println!("{}", "─".repeat(40));
    println!("   Required branch: {}", config.required_branch);
    println!("   Self entity: {}", config.self_entity);
    println!("   Stagnation limit: {}", config.stagnation_limit);
    println!("   Loop sleep: {}s", config.loop_sleep_secs);
    println!("   Task shell: {}", config.task_shell.join(" "));
    println!(
        "   Fetch: {} attempt(s), {}ms backoff",
        config.fetch.attempts, config.fetch.backoff_ms
    );

    let paths = config.paths.resolve(project_path);
    println!("\n{} Documents", "Paths:".cyan().bold());
    println!("{}", "─".repeat(40));
    println!("   Queue: {}", paths.queue.display());
    println!("   State: {}", paths.state.display());
    println!("   Snapshot: {}", paths.snapshot.display());
    println!("   Score report: {}", paths.score_report.display());
    println!("   Scorecard: {}", paths.scorecard.display());
    println!("   Escalations: {}", paths.escalations.display());

    println!("\n{} Entities", "Market:".cyan().bold());
    println!("{}", "─".repeat(40));
    for entity in &config.entities {
        println!(
            "   {} ({}) product={} ai_fit={} reliability={}",
            entity.key, entity.repo, entity.product, entity.ai_fit, entity.reliability
        );
    }
}

fn show_status(project_path: &Path, json: bool) -> Result<()> {
    let config = AutopilotConfig::load(project_path)?;
    let paths = config.paths.resolve(project_path);

    let state: CycleState = JsonDocument::new(&paths.state).load_or_default()?;
    let queue: TaskQueue = JsonDocument::new(&paths.queue).load_or_default()?;
    let snapshot: Snapshot = JsonDocument::new(&paths.snapshot)
        .load_lenient()
        .unwrap_or_else(|| {
            config.entities.iter().fold(Snapshot::new(now_utc()), |s, e| {
                s.with_repo(e.key.clone(), e.fallback.clone())
            })
        });

    let engine = ScoreEngine::new(&config.entities, &config.self_entity);
    let scores = engine.compute(&snapshot, &state.boost);
    let total = engine.self_total(&scores);
    let next = queue.next_pending().map(|i| &queue.tasks[i]);

    if json {
        let status = serde_json::json!({
            "self_entity": config.self_entity,
            "total": total,
            "scores": scores,
            "snapshot_updated_at": snapshot.updated_at,
            "state": state,
            "stagnation_limit": config.stagnation_limit,
            "queue": {
                "todo": queue.count(TaskStatus::Todo),
                "done": queue.count(TaskStatus::Done),
                "failed": queue.count(TaskStatus::Failed),
                "blocked": queue.count(TaskStatus::Blocked),
                "next": next.map(|t| t.id.clone()),
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("\n{} Scores", "Status:".cyan().bold());
    println!("{}", "─".repeat(40));
    for (key, s) in scores.ranked() {
        let line = format!("   {:<12} {:>3}", key, s.total);
        if key == config.self_entity {
            println!("{}", line.bold());
        } else {
            println!("{line}");
        }
    }
    println!("   Snapshot: {}", snapshot.updated_at.to_rfc3339());

    println!("\n{} Loop", "Status:".cyan().bold());
    println!("{}", "─".repeat(40));
    match state.last_total {
        Some(last) => println!("   Last total: {last}"),
        None => println!("   Last total: (no cycles yet)"),
    }
    println!(
        "   No-delta cycles: {}/{}",
        state.no_delta_cycles, config.stagnation_limit
    );
    println!("   Completed tasks: {}", state.completed_tasks.len());
    if let Some(outcome) = state.last_task_result {
        println!("   Last task result: {outcome}");
    }

    println!("\n{} Queue", "Status:".cyan().bold());
    println!("{}", "─".repeat(40));
    println!(
        "   todo: {}  done: {}  failed: {}  blocked: {}",
        queue.count(TaskStatus::Todo),
        queue.count(TaskStatus::Done),
        queue.count(TaskStatus::Failed),
        queue.count(TaskStatus::Blocked)
    );
    match next {
        Some(task) => println!("   Next: {} ({}) [{:?}]", task.id, task.title, task.kind),
        None => println!("   Next: {}", "queue exhausted".dimmed()),
    }

    Ok(())
}
