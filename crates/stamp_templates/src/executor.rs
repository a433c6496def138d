//! Sequential step execution.

use std::collections::HashMap;

use stamp_spec::{Action, ForEachParams, Step};
use tracing::{debug, error, info};

use crate::actions::{self, StepContext};
use crate::error::{RenderError, RenderResult};
use crate::scope::Scope;

/// Run `steps` in order against the scratch directory.
///
/// Cancellation is checked before every step. A failing step stops the
/// sequence and is reported with its 1-based position and action name;
/// whatever earlier steps wrote stays in place.
pub fn execute_steps(ctx: &mut StepContext<'_>, scope: &Scope, steps: &[Step]) -> RenderResult<()> {
    for (i, step) in steps.iter().enumerate() {
        if let Some(token) = ctx.cancel {
            token.check()?;
        }

        let index = i + 1;
        let action = step.action.name();
        if step.desc.is_empty() {
            info!("Step {}/{}: {}", index, steps.len(), action);
        } else {
            info!("Step {}/{}: {} ({})", index, steps.len(), action, step.desc);
        }

        match execute_step(ctx, scope, &step.action) {
            Ok(()) => debug!("Step {} completed", index),
            Err(RenderError::Cancelled) => return Err(RenderError::Cancelled),
            Err(e) => {
                error!("Step {} ({}) failed: {}", index, action, e);
                return Err(RenderError::Step {
                    index,
                    action,
                    source: Box::new(e),
                });
            }
        }
    }
    Ok(())
}

fn execute_step(ctx: &mut StepContext<'_>, scope: &Scope, action: &Action) -> RenderResult<()> {
    match action {
        Action::Include(params) => actions::include::run(ctx, scope, params),
        Action::Append(params) => actions::append::run(ctx, scope, params),
        Action::StringReplace(params) => actions::replace::run_string(ctx, scope, params),
        Action::RegexReplace(params) => actions::replace::run_regex(ctx, scope, params),
        Action::RegexNameLookup(params) => actions::regex_name_lookup::run(ctx, scope, params),
        Action::GoTemplate(params) => actions::go_template::run(ctx, scope, params),
        Action::Print(params) => actions::print::run(ctx, scope, params),
        Action::ForEach(params) => for_each(ctx, scope, params),
    }
}

/// Run the nested steps once per value, binding `key` in a child scope.
fn for_each(ctx: &mut StepContext<'_>, scope: &Scope, params: &ForEachParams) -> RenderResult<()> {
    let key = &params.iterator.key;
    if key.is_empty() {
        return Err(RenderError::InvalidParams(
            "for_each: iterator key must not be empty".to_string(),
        ));
    }

    for raw in &params.iterator.values {
        let value = ctx.expand(scope, raw)?;
        debug!("for_each {} = {:?}", key, value);
        let child = scope.with(HashMap::from([(key.clone(), value)]));
        execute_steps(ctx, &child, &params.steps)?;
    }
    Ok(())
}
