//! Spec file reading utilities.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{SpecError, SpecResult};
use crate::models::Spec;

/// File name of the spec inside a template directory.
pub const DEFAULT_SPEC_FILE: &str = "spec.yaml";

/// Reader for spec files.
pub struct SpecReader;

impl SpecReader {
    /// Read the spec file of a template directory.
    pub fn read_template(template_dir: &Path, spec_file: &str) -> SpecResult<Spec> {
        Self::read_file(template_dir.join(spec_file))
    }

    /// Read a spec from a file path.
    pub fn read_file(path: impl AsRef<Path>) -> SpecResult<Spec> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SpecError::NotFound(path.to_path_buf()));
        }
        debug!("Reading spec from {:?}", path);

        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a spec from YAML text.
    pub fn from_str(content: &str) -> SpecResult<Spec> {
        let spec: Spec = serde_yaml::from_str(content)?;
        debug!("Parsed spec with {} steps", spec.steps.len());
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_missing_spec() {
        let temp = tempdir().unwrap();
        let err = SpecReader::read_template(temp.path(), DEFAULT_SPEC_FILE).unwrap_err();
        assert!(matches!(err, SpecError::NotFound(_)));
    }

    #[test]
    fn test_invalid_params_are_reported() {
        let err = SpecReader::from_str(
            r#"
steps:
  - action: append
    params:
      paths: ['a.txt']
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("append"), "{}", err);
    }
}
