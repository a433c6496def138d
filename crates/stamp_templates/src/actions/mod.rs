//! Step actions.
//!
//! Every action first expands its path and text parameters against the
//! current [`Scope`]. Text-mutating actions then rewrite files in the scratch
//! directory through [`walk_and_modify`]; `include` copies files into it.

pub mod append;
pub mod go_template;
pub mod include;
pub mod print;
pub mod regex_name_lookup;
pub mod replace;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use stamp_spec::PathExpr;

use crate::cancel::CancellationToken;
use crate::error::RenderResult;
use crate::fs::FileSystem;
use crate::renderer::TemplateRenderer;
use crate::scope::Scope;
use crate::walker::{walk_and_modify, WalkStats};

/// Everything a step can touch while it runs.
pub struct StepContext<'a> {
    pub fs: &'a dyn FileSystem,
    pub renderer: &'a TemplateRenderer,
    /// Root of the template being rendered
    pub template_dir: &'a Path,
    /// Final output directory; only read from during steps
    pub dest_dir: &'a Path,
    /// Working tree that steps mutate
    pub scratch_dir: &'a Path,
    /// Skip patterns applied to every include
    pub ignore_patterns: &'a [String],
    /// Spec file name, never included from the template root
    pub spec_file: &'a str,
    pub cancel: Option<&'a CancellationToken>,
    /// Sink for `print`
    pub output: &'a mut dyn Write,
    /// Scratch-relative paths of files included from the destination
    pub included_from_destination: BTreeSet<String>,
}

impl<'a> StepContext<'a> {
    /// Render a text parameter against `scope`.
    pub fn expand(&self, scope: &Scope, text: &str) -> RenderResult<String> {
        self.renderer.render(text, scope)
    }

    /// Render each path expression, keeping its position.
    pub fn expand_paths(&self, scope: &Scope, paths: &[PathExpr]) -> RenderResult<Vec<PathExpr>> {
        paths
            .iter()
            .map(|path| {
                self.renderer
                    .render(path.as_str(), scope)
                    .map(|value| path.with_value(value))
                    .map_err(|e| e.at(path.pos))
            })
            .collect()
    }

    /// Expand `paths` and run `transform` over the matching scratch files.
    pub fn modify<F>(&self, scope: &Scope, paths: &[PathExpr], transform: F) -> RenderResult<WalkStats>
    where
        F: FnMut(&[u8]) -> RenderResult<Vec<u8>>,
    {
        let paths = self.expand_paths(scope, paths)?;
        walk_and_modify(self.fs, self.scratch_dir, &paths, self.cancel, transform)
    }
}
