pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "showroom",
    about = "Showroom operator CLI",
    long_about = "Apply migrations, inspect configuration, list open test-drive slots, and run action envelopes locally.",
    after_help = "Examples:\n  showroom migrate\n  showroom slots --from 2026-10-20 --to 2026-10-22\n  showroom invoke --file booking.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Print open test-drive slots after reconciling with stored bookings")]
    Slots {
        #[arg(long, help = "Inclusive lower date bound (YYYY-MM-DD)")]
        from: Option<String>,
        #[arg(long, help = "Inclusive upper date bound (YYYY-MM-DD)")]
        to: Option<String>,
    },
    #[command(about = "Dispatch one tool-invocation envelope read from a JSON file")]
    Invoke {
        #[arg(long, help = "Path to the request envelope")]
        file: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Slots { from, to } => commands::slots::run(from.as_deref(), to.as_deref()),
        Command::Invoke { file } => commands::invoke::run(&file),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
