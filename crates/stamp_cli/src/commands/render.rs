//! Render command - Render a template into a destination directory.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use stamp_spec::DEFAULT_SPEC_FILE;
use stamp_templates::{render, CancellationToken, OsFs, RenderConfig, RenderOutcome};

#[derive(Args)]
pub struct RenderArgs {
    /// Template directory containing the spec file
    pub template: PathBuf,

    /// Destination directory
    #[arg(short, long, default_value = ".")]
    pub dest: PathBuf,

    /// Input value, repeatable
    #[arg(short, long = "input", value_name = "NAME=VALUE", value_parser = parse_input)]
    pub inputs: Vec<(String, String)>,

    /// Replace existing destination files (they are backed up first)
    #[arg(long)]
    pub force_overwrite: bool,

    /// Keep the scratch directory for debugging
    #[arg(long)]
    pub keep_temp_dirs: bool,

    /// Run all steps and checks without touching the destination
    #[arg(long)]
    pub dry_run: bool,

    /// Accept inputs the template does not declare
    #[arg(long)]
    pub allow_unknown_inputs: bool,

    /// Directory under which backups of overwritten files are created
    #[arg(long, env = "STAMP_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Spec file name inside the template directory
    #[arg(long, default_value = DEFAULT_SPEC_FILE)]
    pub spec_file: String,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_input(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {:?}", s)),
    }
}

pub async fn execute(args: RenderArgs) -> Result<()> {
    if !args.template.is_dir() {
        anyhow::bail!("Template directory not found: {:?}", args.template);
    }
    info!("Rendering template {:?}", args.template);

    let mut config = RenderConfig::new(&args.template, &args.dest)
        .with_inputs(args.inputs.iter().cloned())
        .force_overwrite(args.force_overwrite)
        .dry_run(args.dry_run)
        .keep_temp_dirs(args.keep_temp_dirs)
        .allow_unknown_inputs(args.allow_unknown_inputs)
        .with_spec_file(&args.spec_file);
    if let Some(dir) = &args.backup_dir {
        config = config.with_backup_root(dir);
    }

    let token = CancellationToken::new();
    let handle = token.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current file");
            handle.cancel();
        }
    });

    // `print` output goes to stderr when stdout carries the JSON report.
    let json = args.json;
    let result = tokio::task::spawn_blocking(move || {
        if json {
            render(&OsFs, &config, &mut io::stderr(), Some(&token))
        } else {
            render(&OsFs, &config, &mut io::stdout(), Some(&token))
        }
    })
    .await
    .context("Render task failed")?;
    watcher.abort();

    let outcome =
        result.with_context(|| format!("Failed to render template {:?}", args.template))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }
    Ok(())
}

fn print_summary(outcome: &RenderOutcome) {
    if outcome.dry_run {
        println!(
            "🔍 Dry run: {} file(s) would be written to {}",
            outcome.files.len(),
            outcome.dest_dir.display()
        );
    } else {
        println!(
            "✅ Rendered {} file(s) into {}",
            outcome.files.len(),
            outcome.dest_dir.display()
        );
    }
    for file in &outcome.files {
        println!("   - {}", file);
    }
    if let Some(backup) = &outcome.backup_dir {
        println!("💾 Overwritten files were backed up to {}", backup.display());
    }
    if let Some(scratch) = &outcome.scratch_dir {
        println!("📁 Scratch directory kept at {}", scratch.display());
    }
}
