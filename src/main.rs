//! TripAgent CLI entry point

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use tripagent::cli::{Cli, Command, OutputFormat};
use tripagent::config::Config;
use tripagent::export::to_markdown;
use tripagent::orchestrator::{PlanRequest, Planner, PlanStatus};
use tripagent::repair::EditPatch;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripagent")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Log to file; stdout is reserved for the rendered plan
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("tripagent.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

fn print_response(response: &tripagent::PlanResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Markdown => match response.status {
            PlanStatus::Done => {
                let itinerary = response.itinerary.as_ref().expect("done response has itinerary");
                println!("{}", to_markdown(itinerary));
                if !response.issues.is_empty() {
                    println!("## Known issues\n");
                    for issue in &response.issues {
                        println!("- [{:?}] {}: {}", issue.severity, issue.code, issue.evidence);
                    }
                }
                println!("\n(session: {}, degrade: {})", response.session_id, response.degrade_level);
            }
            PlanStatus::Clarifying => {
                println!("{}\n", response.message);
                for question in &response.next_questions {
                    println!("- {question}");
                }
                println!("\n(continue with: tripagent chat {} \"...\")", response.session_id);
            }
            PlanStatus::Error => {
                eprintln!(
                    "error [{}]: {}",
                    response.error_code.as_deref().unwrap_or("unknown"),
                    response.message
                );
            }
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Plan { message, session, format } => {
            let planner = Planner::from_config(config).context("Failed to initialize planner")?;
            let response = planner
                .plan(PlanRequest {
                    message,
                    session_id: session,
                    ..Default::default()
                })
                .await;
            print_response(&response, format)?;
        }

        Command::Chat { session, message, edit, format } => {
            let edit_patch: Option<EditPatch> = match edit {
                Some(raw) => {
                    Some(serde_json::from_str(&raw).context("Failed to parse --edit JSON")?)
                }
                None => None,
            };
            let planner = Planner::from_config(config).context("Failed to initialize planner")?;
            let response = planner.chat(&session, &message, edit_patch).await;
            print_response(&response, format)?;
        }

        Command::CheckConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            let planner = Planner::from_config(config).context("Failed to initialize planner")?;
            println!("active sessions: {}", planner.sessions().active_count());
        }
    }

    Ok(())
}
