//! Error types for template rendering.

use std::path::PathBuf;

use stamp_spec::Pos;
use thiserror::Error;

/// Result type alias for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while rendering a template.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("path {path:?} must not contain \"..\"")]
    PathTraversal { path: String },

    #[error("backslashes in glob patterns are not allowed: {pattern:?}")]
    BackslashInGlob { pattern: String },

    #[error("glob {pattern:?} did not match any files")]
    NoGlobMatch { pattern: String },

    #[error(
        "the template referenced a nonexistent variable name {name:?}; available variable names are [{}]",
        .available.join(", ")
    )]
    UnknownInputVariable { name: String, available: Vec<String> },

    #[error("template syntax error: {0}")]
    TemplateSyntax(String),

    #[error("found a symlink at {path:?}, templates may not contain symlinks")]
    SymlinkForbidden { path: String },

    #[error("{path:?}: {reason}")]
    OverwriteConflict { path: PathBuf, reason: String },

    #[error("invalid regex {regex:?}: {message}")]
    InvalidRegex { regex: String, message: String },

    #[error("regex {regex:?} has an unnamed capturing group; only named groups like (?P<name>...) are allowed")]
    UnnamedCaptureGroup { regex: String },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("missing value for input {0:?}: it has no default and was not provided")]
    MissingInput(String),

    #[error("render was cancelled")]
    Cancelled,

    #[error("{op}({path:?}): {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("at {pos}: {source}")]
    At {
        pos: Pos,
        #[source]
        source: Box<RenderError>,
    },

    #[error("step {index} ({action}) failed: {source}")]
    Step {
        index: usize,
        action: &'static str,
        #[source]
        source: Box<RenderError>,
    },

    #[error("Spec error: {0}")]
    Spec(#[from] stamp_spec::SpecError),
}

impl RenderError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn overwrite(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OverwriteConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Attaches a spec position, when one is known.
    pub fn at(self, pos: Pos) -> Self {
        if pos.is_known() {
            Self::At {
                pos,
                source: Box::new(self),
            }
        } else {
            self
        }
    }

    /// Strips position and step wrappers.
    pub fn root_cause(&self) -> &RenderError {
        match self {
            Self::At { source, .. } | Self::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the underlying cause is an I/O "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variable_message() {
        let err = RenderError::UnknownInputVariable {
            name: "nme".to_string(),
            available: vec!["name".to_string(), "port".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "the template referenced a nonexistent variable name \"nme\"; available variable names are [name, port]"
        );
    }

    #[test]
    fn test_root_cause_unwraps() {
        let err = RenderError::Step {
            index: 2,
            action: "append",
            source: Box::new(
                RenderError::NoGlobMatch {
                    pattern: "*.md".to_string(),
                }
                .at(Pos::new(3, 9)),
            ),
        };
        assert!(matches!(err.root_cause(), RenderError::NoGlobMatch { .. }));
        assert!(err.to_string().starts_with("step 2 (append) failed: at line 3 column 9"));
    }

    #[test]
    fn test_unknown_pos_is_not_wrapped() {
        let err = RenderError::Cancelled.at(Pos::default());
        assert!(matches!(err, RenderError::Cancelled));
    }
}
