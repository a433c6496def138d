//! `include`: copy files from the template or destination into the scratch
//! directory.

use std::io;
use std::path::Path;

use ::glob::Pattern;
use stamp_spec::{IncludeFrom, IncludeParams, IncludePath, PathExpr};
use tracing::{debug, info};

use super::StepContext;
use crate::copier::{copy_recursive, CopyEntry, CopyHint, CopyParams};
use crate::error::{RenderError, RenderResult};
use crate::glob::{expand_globs, has_glob_meta, MATCH_OPTIONS};
use crate::sandbox::{clean_rel, join_rel, reject_backslash, safe_rel_path, to_native};
use crate::scope::Scope;

pub fn run(ctx: &mut StepContext<'_>, scope: &Scope, params: &IncludeParams) -> RenderResult<()> {
    for block in &params.paths {
        include_block(ctx, scope, block)?;
    }
    Ok(())
}

fn include_block(ctx: &mut StepContext<'_>, scope: &Scope, block: &IncludePath) -> RenderResult<()> {
    let paths = ctx.expand_paths(scope, &block.paths)?;
    let as_paths = ctx.expand_paths(scope, &block.as_paths)?;
    if !as_paths.is_empty() && as_paths.len() != paths.len() {
        return Err(RenderError::InvalidParams(format!(
            "include: \"as\" has {} entries but \"paths\" has {}; they must be the same length",
            as_paths.len(),
            paths.len()
        )));
    }

    let skip = ctx.expand_paths(scope, &block.skip)?;
    let mut matcher = SkipMatcher::new(ctx.ignore_patterns.iter().map(String::as_str))?;
    for pattern in &skip {
        matcher.add(pattern.as_str()).map_err(|e| e.at(pattern.pos))?;
    }

    let from_destination = block.from == IncludeFrom::Destination;
    let src_root = if from_destination {
        ctx.dest_dir
    } else {
        ctx.template_dir
    };
    let spec_file = (!from_destination).then(|| clean_rel(ctx.spec_file));

    for (index, path) in paths.iter().enumerate() {
        let is_glob = has_glob_meta(path.as_str());
        for rel in expand_globs(src_root, std::slice::from_ref(path))? {
            let rel = clean_rel(&rel);
            let dst_rel = match as_paths.get(index) {
                Some(as_path) => rename_target(as_path, &rel, is_glob)?,
                None => rel.clone(),
            };
            include_one(
                ctx,
                src_root,
                path,
                &rel,
                &dst_rel,
                &matcher,
                spec_file.as_deref(),
                from_destination,
            )?;
        }
    }
    Ok(())
}

/// Where an `as` entry sends one source path.
fn rename_target(as_path: &PathExpr, rel: &str, is_glob: bool) -> RenderResult<String> {
    let target = reject_backslash(as_path.as_str())
        .and_then(|_| safe_rel_path(as_path.as_str()))
        .map_err(|e| e.at(as_path.pos))?;
    let target = clean_rel(&target);
    if !is_glob {
        return Ok(target);
    }
    let base = rel.rsplit('/').next().unwrap_or(rel);
    Ok(join_rel(&target, base))
}

#[allow(clippy::too_many_arguments)]
fn include_one(
    ctx: &mut StepContext<'_>,
    src_root: &Path,
    pattern: &PathExpr,
    rel: &str,
    dst_rel: &str,
    matcher: &SkipMatcher,
    spec_file: Option<&str>,
    from_destination: bool,
) -> RenderResult<()> {
    let src = to_native(src_root, rel);
    match ctx.fs.stat(&src) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RenderError::NoGlobMatch {
                pattern: pattern.value.clone(),
            }
            .at(pattern.pos));
        }
        Err(e) => return Err(RenderError::io("stat", &src, e)),
    }

    let dst = to_native(ctx.scratch_dir, dst_rel);
    debug!("Including {:?} as {:?}", rel, dst_rel);

    let mut params = CopyParams::new(&src, &dst).with_visitor(|entry: &CopyEntry<'_>| {
        let full = join_rel(rel, entry.rel);
        let skip = spec_file == Some(full.as_str()) || matcher.matches(&full);
        Ok(CopyHint {
            skip,
            allow_preexisting: true,
            backup_if_exists: false,
        })
    });
    if let Some(token) = ctx.cancel {
        params = params.with_cancel(token.clone());
    }
    let outcome = copy_recursive(ctx.fs, params).map_err(|e| match e {
        // Report symlinks relative to the include source root.
        RenderError::SymlinkForbidden { path } if Path::new(&path) == src => {
            RenderError::SymlinkForbidden { path: rel.to_string() }
        }
        RenderError::SymlinkForbidden { path } => RenderError::SymlinkForbidden {
            path: join_rel(rel, &path),
        },
        other => other,
    })?;

    if from_destination {
        for copied in &outcome.copied {
            ctx.included_from_destination
                .insert(join_rel(dst_rel, copied));
        }
    }
    info!("Included {} files from {:?}", outcome.copied.len(), rel);
    Ok(())
}

/// Ignore and skip patterns.
///
/// A pattern without `/` matches a base name at any depth. A pattern with a
/// `/` matches the path relative to the include root. An entry is skipped if
/// it, or any directory above it, matches.
#[derive(Debug, Default)]
struct SkipMatcher {
    names: Vec<Pattern>,
    paths: Vec<Pattern>,
}

impl SkipMatcher {
    fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> RenderResult<Self> {
        let mut matcher = Self::default();
        for pattern in patterns {
            matcher.add(pattern)?;
        }
        Ok(matcher)
    }

    fn add(&mut self, raw: &str) -> RenderResult<()> {
        reject_backslash(raw)?;
        let rooted = raw.trim_end_matches('/').contains('/');
        let rel = clean_rel(&safe_rel_path(raw)?);
        let pattern = Pattern::new(&rel).map_err(|e| {
            RenderError::InvalidParams(format!("invalid skip pattern {:?}: {}", raw, e))
        })?;
        if rooted {
            self.paths.push(pattern);
        } else {
            self.names.push(pattern);
        }
        Ok(())
    }

    fn matches(&self, rel: &str) -> bool {
        if rel.is_empty() {
            return false;
        }
        let mut prefix = String::new();
        for segment in rel.split('/') {
            prefix = join_rel(&prefix, segment);
            if self.names.iter().any(|p| p.matches_with(segment, MATCH_OPTIONS))
                || self.paths.iter().any(|p| p.matches_with(&prefix, MATCH_OPTIONS))
            {
                return true;
            }
        }
        false
    }
}
