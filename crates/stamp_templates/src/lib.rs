//! # stamp_templates
//!
//! The copy-and-transform engine behind stamp.
//!
//! A render runs a template's steps against a scratch directory and then
//! copies the result into the destination:
//!
//! - Paths from a spec are template-expanded, sandboxed and glob-expanded
//! - Text actions rewrite each matched file at most once, and only when its
//!   content changes
//! - `include` copies from the template or the existing destination
//! - The final copy refuses to clobber files unless told to, backs up what it
//!   replaces, rejects symlinks and records a SHA-256 per output file
//!
//! ## Example
//!
//! ```rust,no_run
//! use stamp_templates::{render, OsFs, RenderConfig};
//!
//! let config = RenderConfig::new("templates/service", "./orders")
//!     .with_input("name", "orders")
//!     .dry_run(true);
//!
//! let outcome = render(&OsFs, &config, &mut std::io::stdout(), None).unwrap();
//! for (path, hash) in &outcome.hashes {
//!     println!("{hash}  {path}");
//! }
//! ```

pub mod actions;
pub mod cancel;
pub mod copier;
pub mod error;
pub mod executor;
pub mod fs;
pub mod glob;
pub mod render;
pub mod renderer;
pub mod sandbox;
pub mod scope;
pub mod walker;

pub use cancel::CancellationToken;
pub use copier::{copy_recursive, sha256_hasher, CopyEntry, CopyHint, CopyOutcome, CopyParams};
pub use error::{RenderError, RenderResult};
pub use executor::execute_steps;
pub use fs::{ErrorFs, FileInfo, FileKind, FileSystem, FsOp, OsFs};
pub use crate::glob::expand_globs;
pub use render::{default_backup_root, render, RenderConfig, RenderOutcome, DEFAULT_IGNORE_PATTERNS};
pub use renderer::TemplateRenderer;
pub use sandbox::safe_rel_path;
pub use scope::Scope;
pub use walker::{walk_and_modify, WalkStats};
