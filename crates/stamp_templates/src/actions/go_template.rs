//! `go_template`: render whole files as templates.

use stamp_spec::GoTemplateParams;
use tracing::debug;

use super::StepContext;
use crate::error::RenderResult;
use crate::scope::Scope;

pub fn run(ctx: &StepContext<'_>, scope: &Scope, params: &GoTemplateParams) -> RenderResult<()> {
    let stats = ctx.modify(scope, &params.paths, |contents| {
        ctx.renderer.render_bytes(contents, scope)
    })?;
    debug!(
        "Rendered {} files, {} changed",
        stats.visited.len(),
        stats.modified.len()
    );
    Ok(())
}
