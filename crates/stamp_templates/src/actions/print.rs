//! `print`: write a rendered message to the render's output.

use stamp_spec::PrintParams;

use super::StepContext;
use crate::error::{RenderError, RenderResult};
use crate::scope::Scope;

pub fn run(ctx: &mut StepContext<'_>, scope: &Scope, params: &PrintParams) -> RenderResult<()> {
    let message = ctx.expand(scope, &params.message)?;
    writeln!(ctx.output, "{}", message).map_err(|e| RenderError::io("print", "<output>", e))
}
