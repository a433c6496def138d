//! stamp CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or inputs
//! - 4: Template error

use std::process::ExitCode;

use clap::Parser;
use stamp_spec::SpecError;
use stamp_templates::RenderError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const TEMPLATE_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "stamp=debug"
    } else if cli.quiet {
        "stamp=warn"
    } else {
        "stamp=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Render(args) => commands::render::execute(args).await,
        Commands::Inspect(args) => commands::inspect::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<RenderError>() {
        return match err.root_cause() {
            RenderError::InvalidParams(_) | RenderError::MissingInput(_) => ExitCodes::INVALID_ARGS,
            RenderError::Cancelled | RenderError::Io { .. } => ExitCodes::GENERAL_ERROR,
            RenderError::Spec(SpecError::NotFound(_)) => ExitCodes::INVALID_ARGS,
            _ => ExitCodes::TEMPLATE_ERROR,
        };
    }
    if let Some(err) = e.downcast_ref::<SpecError>() {
        return match err {
            SpecError::NotFound(_) => ExitCodes::INVALID_ARGS,
            _ => ExitCodes::TEMPLATE_ERROR,
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
