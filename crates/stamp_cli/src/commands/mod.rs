//! CLI command definitions.

use clap::{Parser, Subcommand};

pub mod inspect;
pub mod render;

/// stamp - render project templates
#[derive(Parser)]
#[command(name = "stamp")]
#[command(version, about = "stamp - render project templates")]
#[command(long_about = r#"
stamp renders a template directory into a destination directory. A template
is a tree of files plus a spec.yaml that declares its inputs and the steps
that turn the files into output.

COMMANDS:
  render   → Render a template into a destination directory
  inspect  → Show a template's inputs and steps

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or inputs
  4 - Template error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a template into a destination directory
    Render(render::RenderArgs),

    /// Show a template's inputs and steps
    Inspect(inspect::InspectArgs),
}
