//! Voxpost CLI - Audio Post-Processing
//!
//! Command-line interface for the Voxpost pipeline.

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use voxpost::cli::{commands, Cli, Commands};
use voxpost::Result;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Voxpost v{}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error [{}]: {}", e.error_code(), e.friendly_message());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Some(cmd) = cli.command else {
        println!("Voxpost v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for available commands");
        return Ok(());
    };

    let pipeline = commands::build_pipeline(cli.config.as_deref())?;
    let defaults = pipeline.config().default_effects;

    match cmd {
        Commands::Process {
            input,
            output,
            effects,
        } => commands::process(&pipeline, &input, &output, &effects.resolve(&defaults)),
        Commands::Tone {
            output,
            frequency,
            duration,
            effects,
        } => commands::tone(
            &pipeline,
            &output,
            frequency,
            duration,
            &effects.resolve(&defaults),
        ),
        Commands::Placeholder {
            output,
            duration,
            effects,
        } => commands::placeholder(&pipeline, &output, duration, &effects.resolve(&defaults)),
        Commands::Inspect { path } => commands::inspect(&path),
        Commands::Batch {
            input_dir,
            output_dir,
            effects,
        } => commands::batch(
            &pipeline,
            &input_dir,
            &output_dir,
            &effects.resolve(&defaults),
        ),
    }
}
