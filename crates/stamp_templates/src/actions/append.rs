//! `append`: add text to the end of files.

use stamp_spec::AppendParams;
use tracing::debug;

use super::StepContext;
use crate::error::RenderResult;
use crate::scope::Scope;

pub fn run(ctx: &StepContext<'_>, scope: &Scope, params: &AppendParams) -> RenderResult<()> {
    let suffix = ctx.expand(scope, &params.with)?;
    let stats = ctx.modify(scope, &params.paths, |contents| {
        Ok(append(contents, suffix.as_bytes(), params.skip_ensure_newline))
    })?;
    debug!("Appended to {} files", stats.modified.len());
    Ok(())
}

/// `contents` followed by `suffix`, ending in a newline unless told otherwise.
pub fn append(contents: &[u8], suffix: &[u8], skip_ensure_newline: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(contents.len() + suffix.len() + 1);
    out.extend_from_slice(contents);
    out.extend_from_slice(suffix);
    if !skip_ensure_newline && !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    out
}
