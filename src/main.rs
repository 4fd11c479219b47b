//! Roster generation CLI.
//!
//! Runs the full pipeline against a demo-seeded in-memory store and prints
//! the run report as JSON. Exit codes: 0 feasible, 2 infeasible, 64
//! invalid input, 70 internal error.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use physician_rota::api;
use physician_rota::demo_data::{self, DemoData};
use physician_rota::engine::DfsEngine;
use physician_rota::error::Error;
use physician_rota::store::MemoryStore;

const EXIT_INFEASIBLE: u8 = 2;
const EXIT_INVALID_INPUT: u8 = 64;
const EXIT_INTERNAL: u8 = 70;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Demo data set to seed the in-memory store with (small | standard)
    #[arg(long, global = true, default_value = "small")]
    demo: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the roster for a month
    Generate {
        /// Month to generate (1-12)
        #[arg(long)]
        month: u32,
        /// Year to generate (>= 2024)
        #[arg(long)]
        year: i32,
        /// Solver time limit in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// Re-run the validator against the persisted schedule afterwards
        #[arg(long)]
        revalidate: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            if err.is_input_error() {
                ExitCode::from(EXIT_INVALID_INPUT)
            } else {
                ExitCode::from(EXIT_INTERNAL)
            }
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Error> {
    let demo: DemoData = match cli.demo.parse() {
        Ok(demo) => demo,
        Err(message) => {
            error!("{message}");
            return Ok(ExitCode::from(EXIT_INVALID_INPUT));
        }
    };

    match cli.cmd {
        Commands::Generate {
            month,
            year,
            timeout,
            revalidate,
        } => {
            // The loader re-checks this, but the demo seeder needs a real
            // calendar month before the pipeline ever runs.
            if !(1..=12).contains(&month) || year < 2024 {
                return Err(Error::InvalidPeriod { month, year });
            }

            let store = MemoryStore::new();
            demo_data::seed(&store, demo, month, year);

            let report = api::generate(&store, DfsEngine::new(), month, year, timeout)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .map_err(|e| Error::Internal(e.to_string()))?
            );

            if revalidate {
                let validation = api::validate(&store, report.schedule_id)?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&validation)
                        .map_err(|e| Error::Internal(e.to_string()))?
                );
            }

            if report.is_feasible() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_INFEASIBLE))
            }
        }
    }
}
