pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "costgate",
    about = "Cost-change approval gate operator CLI",
    long_about = "Preview threshold decisions, replay recorded cost-change events, and check gate readiness.",
    after_help = "Examples:\n  costgate evaluate --total 1040 --past 1000 --diff 40\n  costgate handle --event event.json --dry-run\n  costgate doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Evaluate the threshold policy for one cost change without side effects")]
    Evaluate {
        #[arg(long, allow_hyphen_values = true, help = "New total monthly cost")]
        total: String,
        #[arg(long, allow_hyphen_values = true, help = "Previous total monthly cost")]
        past: String,
        #[arg(long, allow_hyphen_values = true, help = "Difference in monthly cost")]
        diff: String,
        #[arg(long, help = "Override the absolute threshold (currency units)")]
        absolute: Option<String>,
        #[arg(long, help = "Override the percent threshold (0-100)")]
        percent: Option<String>,
    },
    #[command(about = "Run a recorded queue batch through the gate")]
    Handle {
        #[arg(long, help = "Path to a JSON batch with a `Records` array")]
        event: PathBuf,
        #[arg(long, help = "Only report the planned action; do not notify or approve")]
        dry_run: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config and pipeline review-stage reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Evaluate { total, past, diff, absolute, percent } => {
            commands::evaluate::run(commands::evaluate::EvaluateArgs {
                total,
                past,
                diff,
                absolute,
                percent,
            })
        }
        Command::Handle { event, dry_run } => commands::handle::run(&event, dry_run),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
