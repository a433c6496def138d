//! Inspect command - Show a template's inputs and steps.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stamp_spec::{Action, Spec, SpecReader, Step, DEFAULT_SPEC_FILE};

#[derive(Args)]
pub struct InspectArgs {
    /// Template directory containing the spec file
    pub template: PathBuf,

    /// Spec file name inside the template directory
    #[arg(long, default_value = DEFAULT_SPEC_FILE)]
    pub spec_file: String,
}

pub async fn execute(args: InspectArgs) -> Result<()> {
    info!("Inspecting template {:?}", args.template);

    let spec = SpecReader::read_template(&args.template, &args.spec_file)
        .with_context(|| format!("Failed to read spec of template {:?}", args.template))?;

    for line in describe(&spec) {
        println!("{}", line);
    }
    Ok(())
}

fn describe(spec: &Spec) -> Vec<String> {
    let mut lines = Vec::new();
    if !spec.desc.is_empty() {
        lines.push(format!("📋 {}", spec.desc));
    }

    lines.push(format!("Inputs ({}):", spec.inputs.len()));
    for input in &spec.inputs {
        let default = match &input.default {
            Some(value) => format!(" [default: {:?}]", value),
            None => " [required]".to_string(),
        };
        if input.desc.is_empty() {
            lines.push(format!("   - {}{}", input.name, default));
        } else {
            lines.push(format!("   - {}{}: {}", input.name, default, input.desc));
        }
    }

    lines.push(format!("Steps ({}):", spec.steps.len()));
    describe_steps(&spec.steps, 1, &mut lines);
    lines
}

fn describe_steps(steps: &[Step], depth: usize, lines: &mut Vec<String>) {
    let indent = "   ".repeat(depth);
    for (i, step) in steps.iter().enumerate() {
        if step.desc.is_empty() {
            lines.push(format!("{}{}. {}", indent, i + 1, step.action.name()));
        } else {
            lines.push(format!("{}{}. {} - {}", indent, i + 1, step.action.name(), step.desc));
        }
        if let Action::ForEach(params) = &step.action {
            describe_steps(&params.steps, depth + 1, lines);
        }
    }
}
