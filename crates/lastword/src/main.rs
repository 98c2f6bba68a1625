// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lastword - a dead man's switch delivery service.
//!
//! Binary entry point: loads configuration, installs logging and dispatches
//! to `serve` or one of the one-shot maintenance commands.

mod app;
mod doctor;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;

use lastword_config::model::LastwordConfig;
use lastword_core::{Location, PanicSignal};
use lastword_scheduler::ProcessRequest;

#[derive(Parser, Debug)]
#[command(name = "lastword", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the processing loop and HTTP gateway until interrupted.
    Serve,
    /// Run one processing cycle.
    Process {
        /// Only process entries of this message.
        #[arg(long)]
        message: Option<String>,
        /// Send pending entries regardless of their scheduled time.
        #[arg(long)]
        force: bool,
        /// Print the outcome of every entry.
        #[arg(long)]
        debug: bool,
    },
    /// Rebuild the pending schedule of a message.
    Regenerate { message_id: String },
    /// Reset stuck entries and recover missed final deliveries.
    FixStuck,
    /// Print schedule counters.
    Stats,
    /// Record a check-in for a message, or for every message of a user.
    CheckIn(CheckInArgs),
    /// Make a condition the active one for its message.
    Arm { condition_id: String },
    /// Deactivate a message's active condition.
    Disarm { message_id: String },
    /// Fire a panic signal for a user.
    Panic(PanicArgs),
    /// Check storage and channel health.
    Doctor,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct CheckInArgs {
    /// Message whose active condition is checked in.
    #[arg(long)]
    message: Option<String>,
    /// User whose check-in conditions are all checked in.
    #[arg(long)]
    user: Option<String>,
}

#[derive(Args, Debug)]
struct PanicArgs {
    user_id: String,
    /// Only fire conditions armed with this keyword.
    #[arg(long)]
    keyword: Option<String>,
    #[arg(long, requires = "longitude", allow_hyphen_values = true)]
    latitude: Option<f64>,
    #[arg(long, requires = "latitude", allow_hyphen_values = true)]
    longitude: Option<f64>,
    /// Location accuracy in meters.
    #[arg(long, requires = "latitude")]
    accuracy: Option<f64>,
}

impl PanicArgs {
    fn into_signal(self) -> PanicSignal {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location {
                latitude,
                longitude,
                accuracy_m: self.accuracy,
            }),
            _ => None,
        };
        PanicSignal {
            user_id: self.user_id,
            keyword: self.keyword,
            location,
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    init_tracing(&config.service.log_level);

    if let Commands::Serve = cli.command {
        return serve::run_serve(config).await.into_diagnostic();
    }
    if let Commands::Doctor = cli.command {
        return doctor::run_doctor(&config).await.into_diagnostic();
    }

    let engine = app::build_engine(&config).await.into_diagnostic()?;
    match cli.command {
        Commands::Process {
            message,
            force,
            debug,
        } => {
            let summary = engine
                .process(ProcessRequest {
                    message_id: message,
                    force_send: force,
                    debug,
                })
                .await
                .into_diagnostic()?;
            print_json(&summary)
        }
        Commands::Regenerate { message_id } => {
            print_json(&engine.regenerate_schedule(&message_id).await.into_diagnostic()?)
        }
        Commands::FixStuck => print_json(&engine.fix_stuck().await.into_diagnostic()?),
        Commands::Stats => print_json(&engine.stats().await.into_diagnostic()?),
        Commands::CheckIn(CheckInArgs { message, user }) => match (message, user) {
            (Some(message_id), _) => {
                let deadline = engine.check_in(&message_id).await.into_diagnostic()?;
                print_json(&serde_json::json!({ "message_id": message_id, "deadline": deadline }))
            }
            (None, Some(user_id)) => {
                let count = engine.check_in_user(&user_id).await.into_diagnostic()?;
                print_json(&serde_json::json!({ "user_id": user_id, "conditions_reset": count }))
            }
            (None, None) => Err(miette::miette!("pass --message or --user")),
        },
        Commands::Arm { condition_id } => {
            print_json(&engine.arm(&condition_id).await.into_diagnostic()?)
        }
        Commands::Disarm { message_id } => {
            let disarmed = engine.disarm(&message_id).await.into_diagnostic()?;
            print_json(&serde_json::json!({ "message_id": message_id, "disarmed": disarmed }))
        }
        Commands::Panic(args) => {
            let outcome = engine
                .trigger_panic(args.into_signal())
                .await
                .into_diagnostic()?;
            print_json(&outcome)
        }
        Commands::Serve | Commands::Doctor => Ok(()),
    }
}

/// Load and validate configuration, exiting with rendered diagnostics on error.
fn load_config(path: Option<&std::path::Path>) -> LastwordConfig {
    let result = match path {
        Some(path) => lastword_config::load_and_validate_path(path),
        None => lastword_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            lastword_config::render_errors(&errors);
            std::process::exit(2);
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let out = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{out}");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so command output on stdout stays parseable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lastword={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
