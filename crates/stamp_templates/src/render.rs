//! Rendering a template into a destination directory.
//!
//! A render reads the template's spec, resolves its inputs, runs the steps
//! in a fresh scratch directory and finally copies the scratch tree into the
//! destination. Files that would be overwritten are backed up first.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use stamp_spec::{Spec, SpecReader, DEFAULT_SPEC_FILE};
use tracing::{debug, info, warn};

use crate::actions::StepContext;
use crate::cancel::CancellationToken;
use crate::copier::{copy_recursive, sha256_hasher, CopyEntry, CopyHint, CopyParams};
use crate::error::{RenderError, RenderResult};
use crate::executor::execute_steps;
use crate::fs::FileSystem;
use crate::renderer::TemplateRenderer;
use crate::scope::Scope;

/// Patterns never included from a template or destination unless overridden.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".DS_Store", ".git", ".bin", ".ssh", "testdata/golden"];

/// Options for a render.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub template_dir: PathBuf,
    pub dest_dir: PathBuf,
    /// Explicit input values; these win over spec defaults
    pub inputs: BTreeMap<String, String>,
    /// Replace existing destination files (they are backed up first)
    pub force_overwrite: bool,
    /// Run every step and check every copy, but leave the destination alone
    pub dry_run: bool,
    /// Leave the scratch directory behind for inspection
    pub keep_temp_dirs: bool,
    /// Accept inputs the spec does not declare
    pub allow_unknown_inputs: bool,
    /// Directory under which per-render backup directories are created
    pub backup_root: PathBuf,
    /// Directory under which the scratch directory is created
    pub temp_root: PathBuf,
    pub ignore_patterns: Vec<String>,
    pub spec_file: String,
}

impl RenderConfig {
    pub fn new(template_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            dest_dir: dest_dir.into(),
            inputs: BTreeMap::new(),
            force_overwrite: false,
            dry_run: false,
            keep_temp_dirs: false,
            allow_unknown_inputs: false,
            backup_root: default_backup_root(),
            temp_root: std::env::temp_dir(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            spec_file: DEFAULT_SPEC_FILE.to_string(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn with_inputs<I, K, V>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inputs
            .extend(inputs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn keep_temp_dirs(mut self, keep: bool) -> Self {
        self.keep_temp_dirs = keep;
        self
    }

    pub fn allow_unknown_inputs(mut self, allow: bool) -> Self {
        self.allow_unknown_inputs = allow;
        self
    }

    pub fn with_backup_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.backup_root = root.into();
        self
    }

    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_spec_file(mut self, name: impl Into<String>) -> Self {
        self.spec_file = name.into();
        self
    }
}

/// `~/.stamp/backups`, or a directory under the system temp dir when there
/// is no home directory.
pub fn default_backup_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".stamp").join("backups"))
        .unwrap_or_else(|| std::env::temp_dir().join("stamp-backups"))
}

/// Name prefix of a render's backup directory, e.g. `backup-20240501T093000-`.
fn backup_prefix() -> String {
    format!("backup-{}-", Utc::now().format("%Y%m%dT%H%M%S"))
}

/// Result of a render.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderOutcome {
    pub dest_dir: PathBuf,
    pub dry_run: bool,
    /// Destination-relative paths written (or that would be, in a dry run)
    pub files: Vec<String>,
    /// SHA-256 of every output file, keyed by destination-relative path
    pub hashes: BTreeMap<String, String>,
    /// Where overwritten files were backed up, if any were
    pub backup_dir: Option<PathBuf>,
    /// Output paths whose content was first included from the destination
    pub included_from_destination: Vec<String>,
    /// Scratch directory, when it was kept
    pub scratch_dir: Option<PathBuf>,
}

/// Render `config.template_dir` into `config.dest_dir`.
///
/// `output` receives the text of `print` steps. Files written before an
/// error stay in place; overwritten destination files can be recovered from
/// the backup directory.
pub fn render(
    fs: &dyn FileSystem,
    config: &RenderConfig,
    output: &mut dyn Write,
    cancel: Option<&CancellationToken>,
) -> RenderResult<RenderOutcome> {
    info!(
        "Rendering {:?} into {:?}{}",
        config.template_dir,
        config.dest_dir,
        if config.dry_run { " (dry run)" } else { "" }
    );

    let spec = SpecReader::read_template(&config.template_dir, &config.spec_file)?;
    let scope = Scope::new(resolve_inputs(&spec, config)?);
    debug!("Resolved inputs: {:?}", scope.names());

    let scratch = fs
        .mkdir_temp(&config.temp_root, "stamp-scratch-")
        .map_err(|e| RenderError::io("mkdir_temp", &config.temp_root, e))?;
    debug!("Scratch directory: {:?}", scratch);

    let result = render_in_scratch(fs, config, &spec, &scope, &scratch, output, cancel);

    let kept = if config.keep_temp_dirs {
        info!("Keeping scratch directory {:?}", scratch);
        Some(scratch)
    } else {
        if let Err(e) = fs.remove_all(&scratch) {
            warn!("Failed to remove scratch directory {:?}: {}", scratch, e);
        }
        None
    };

    let mut outcome = result?;
    outcome.scratch_dir = kept;
    info!(
        "Rendered {} files into {:?}",
        outcome.files.len(),
        config.dest_dir
    );
    Ok(outcome)
}

fn render_in_scratch(
    fs: &dyn FileSystem,
    config: &RenderConfig,
    spec: &Spec,
    scope: &Scope,
    scratch: &Path,
    output: &mut dyn Write,
    cancel: Option<&CancellationToken>,
) -> RenderResult<RenderOutcome> {
    let renderer = TemplateRenderer::new();
    let mut ctx = StepContext {
        fs,
        renderer: &renderer,
        template_dir: &config.template_dir,
        dest_dir: &config.dest_dir,
        scratch_dir: scratch,
        ignore_patterns: &config.ignore_patterns,
        spec_file: &config.spec_file,
        cancel,
        output,
        included_from_destination: BTreeSet::new(),
    };
    execute_steps(&mut ctx, scope, &spec.steps)?;
    let included = ctx.included_from_destination;

    if let Some(token) = cancel {
        token.check()?;
    }

    let force = config.force_overwrite;
    let backup_root = &config.backup_root;
    let backup_prefix = backup_prefix();
    let mut params = CopyParams::new(scratch, &config.dest_dir)
        .dry_run(config.dry_run)
        .with_hasher(sha256_hasher)
        .with_visitor(|entry: &CopyEntry<'_>| {
            Ok(CopyHint {
                skip: false,
                allow_preexisting: force || included.contains(entry.rel),
                backup_if_exists: true,
            })
        })
        .with_backup_dir(|fs: &dyn FileSystem| {
            fs.mkdir_temp(backup_root, &backup_prefix)
                .map_err(|e| RenderError::io("mkdir_temp", backup_root, e))
        });
    if let Some(token) = cancel {
        params = params.with_cancel(token.clone());
    }
    let copied = copy_recursive(fs, params)?;

    Ok(RenderOutcome {
        dest_dir: config.dest_dir.clone(),
        dry_run: config.dry_run,
        files: copied.copied,
        hashes: copied.hashes,
        backup_dir: copied.backup_dir,
        included_from_destination: included.into_iter().collect(),
        scratch_dir: None,
    })
}

/// Merge explicit inputs over spec defaults.
fn resolve_inputs(spec: &Spec, config: &RenderConfig) -> RenderResult<HashMap<String, String>> {
    let declared: HashSet<&str> = spec.inputs.iter().map(|i| i.name.as_str()).collect();
    let unknown: Vec<&str> = config
        .inputs
        .keys()
        .map(String::as_str)
        .filter(|name| !declared.contains(name))
        .collect();

    let mut vars = HashMap::new();
    if !unknown.is_empty() {
        if !config.allow_unknown_inputs {
            let mut known: Vec<&str> = declared.into_iter().collect();
            known.sort_unstable();
            return Err(RenderError::InvalidParams(format!(
                "unknown input(s) [{}]; the template declares [{}]",
                unknown.join(", "),
                known.join(", ")
            )));
        }
        for name in unknown {
            vars.insert(name.to_string(), config.inputs[name].clone());
        }
    }

    for input in &spec.inputs {
        let value = config
            .inputs
            .get(&input.name)
            .or(input.default.as_ref())
            .ok_or_else(|| RenderError::MissingInput(input.name.clone()))?;
        vars.insert(input.name.clone(), value.clone());
    }
    Ok(vars)
}
