//! Data models for template specs.
//!
//! A spec file lists the inputs a template accepts and the ordered steps that
//! turn the template directory into rendered output:
//!
//! ```yaml
//! desc: A hello-world template
//! inputs:
//!   - name: greeting
//!     default: hello
//! steps:
//!   - desc: Copy the sources
//!     action: include
//!     params:
//!       paths: ['src']
//!   - action: string_replace
//!     params:
//!       paths: ['src/main.go']
//!       replacements:
//!         - to_replace: PLACEHOLDER
//!           with: '{{.greeting}}'
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;

/// Source location of a value inside the spec file.
///
/// A zero line means the location is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// A path that may contain template expressions and glob metacharacters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PathExpr {
    pub value: String,
    pub pos: Pos,
}

impl PathExpr {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            pos: Pos::default(),
        }
    }

    pub fn at(value: impl Into<String>, pos: Pos) -> Self {
        Self {
            value: value.into(),
            pos,
        }
    }

    /// Returns a new expression with the same position and a different value.
    pub fn with_value(&self, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            pos: self.pos,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl From<String> for PathExpr {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for PathExpr {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<PathExpr> for String {
    fn from(expr: PathExpr) -> Self {
        expr.value
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A template spec file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Spec {
    #[serde(default, rename = "apiVersion")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// An input variable declared by a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Input {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub default: Option<String>,
}

/// One step of a spec: a description plus the action to run.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct Step {
    pub desc: String,
    pub action: Action,
}

impl Step {
    pub fn new(action: Action) -> Self {
        Self {
            desc: String::new(),
            action,
        }
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    desc: String,
    action: String,
    #[serde(default)]
    params: serde_yaml::Value,
}

impl TryFrom<RawStep> for Step {
    type Error = SpecError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        fn params<T: serde::de::DeserializeOwned>(
            action: &str,
            value: serde_yaml::Value,
        ) -> Result<T, SpecError> {
            serde_yaml::from_value(value).map_err(|e| SpecError::InvalidParams {
                action: action.to_string(),
                message: e.to_string(),
            })
        }

        let name = raw.action.as_str();
        let action = match name {
            "include" => Action::Include(params(name, raw.params)?),
            "append" => Action::Append(params(name, raw.params)?),
            "string_replace" => Action::StringReplace(params(name, raw.params)?),
            "regex_replace" => Action::RegexReplace(params(name, raw.params)?),
            "regex_name_lookup" => Action::RegexNameLookup(params(name, raw.params)?),
            "go_template" => Action::GoTemplate(params(name, raw.params)?),
            "print" => Action::Print(params(name, raw.params)?),
            "for_each" => Action::ForEach(params(name, raw.params)?),
            other => return Err(SpecError::UnknownAction(other.to_string())),
        };

        Ok(Step {
            desc: raw.desc,
            action,
        })
    }
}

/// The typed parameter bundle of a step.
#[derive(Debug, Clone)]
pub enum Action {
    Include(IncludeParams),
    Append(AppendParams),
    StringReplace(StringReplaceParams),
    RegexReplace(RegexReplaceParams),
    RegexNameLookup(RegexNameLookupParams),
    GoTemplate(GoTemplateParams),
    Print(PrintParams),
    ForEach(ForEachParams),
}

impl Action {
    /// The action name as written in the spec file.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Include(_) => "include",
            Action::Append(_) => "append",
            Action::StringReplace(_) => "string_replace",
            Action::RegexReplace(_) => "regex_replace",
            Action::RegexNameLookup(_) => "regex_name_lookup",
            Action::GoTemplate(_) => "go_template",
            Action::Print(_) => "print",
            Action::ForEach(_) => "for_each",
        }
    }
}

/// Where an include reads its files from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncludeFrom {
    /// The template directory
    #[default]
    Template,
    /// The existing destination directory
    Destination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeParams {
    pub paths: Vec<IncludePath>,
}

/// One include block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludePath {
    pub paths: Vec<PathExpr>,
    /// Renamed destinations, parallel to `paths` when present
    #[serde(default, rename = "as")]
    pub as_paths: Vec<PathExpr>,
    /// Patterns excluded from the copy
    #[serde(default)]
    pub skip: Vec<PathExpr>,
    #[serde(default)]
    pub from: IncludeFrom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendParams {
    pub paths: Vec<PathExpr>,
    pub with: String,
    #[serde(default)]
    pub skip_ensure_newline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringReplaceParams {
    pub paths: Vec<PathExpr>,
    pub replacements: Vec<StringReplacement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringReplacement {
    pub to_replace: String,
    pub with: String,
    /// Maximum replacements per file; all occurrences when absent
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexReplaceParams {
    pub paths: Vec<PathExpr>,
    pub replacements: Vec<RegexReplacement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexReplacement {
    pub regex: String,
    pub with: String,
    #[serde(default)]
    pub subgroup_to_replace: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexNameLookupParams {
    pub paths: Vec<PathExpr>,
    pub replacements: Vec<RegexNameLookupEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexNameLookupEntry {
    pub regex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoTemplateParams {
    pub paths: Vec<PathExpr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintParams {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForEachParams {
    pub iterator: ForEachIterator,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForEachIterator {
    pub key: String,
    pub values: Vec<String>,
}
