//! `regex_name_lookup`: replace named capture groups with scope values.
//!
//! Every named group in a match is replaced by the value of the variable
//! with the same name. A group name may appear more than once in a regex;
//! the `regex` crate rejects that, so repeated names are given a unique alias
//! before compiling and mapped back afterwards.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use regex::bytes::Regex;
use stamp_spec::RegexNameLookupParams;
use tracing::debug;

use super::replace::compile;
use super::StepContext;
use crate::error::{RenderError, RenderResult};
use crate::scope::Scope;

pub fn run(ctx: &StepContext<'_>, scope: &Scope, params: &RegexNameLookupParams) -> RenderResult<()> {
    let lookups = params
        .replacements
        .iter()
        .map(|entry| NameLookup::compile(&ctx.expand(scope, &entry.regex)?))
        .collect::<RenderResult<Vec<_>>>()?;

    let stats = ctx.modify(scope, &params.paths, |contents| {
        let mut out = contents.to_vec();
        for lookup in &lookups {
            out = lookup.substitute(&out, scope)?;
        }
        Ok(out)
    })?;
    debug!("regex_name_lookup changed {} files", stats.modified.len());
    Ok(())
}

/// A compiled regex whose groups are all named.
#[derive(Debug)]
pub struct NameLookup {
    regex: Regex,
    /// Capture index and variable name of every group
    groups: Vec<(usize, String)>,
}

impl NameLookup {
    pub fn compile(pattern: &str) -> RenderResult<Self> {
        let (rewritten, aliases) = alias_duplicate_names(pattern);
        let regex = compile(&rewritten).map_err(|e| match e {
            RenderError::InvalidRegex { message, .. } => RenderError::InvalidRegex {
                regex: pattern.to_string(),
                message,
            },
            other => other,
        })?;

        let mut groups = Vec::new();
        for (index, name) in regex.capture_names().enumerate().skip(1) {
            let Some(name) = name else {
                return Err(RenderError::UnnamedCaptureGroup {
                    regex: pattern.to_string(),
                });
            };
            let variable = aliases.get(name).cloned().unwrap_or_else(|| name.to_string());
            groups.push((index, variable));
        }

        Ok(Self { regex, groups })
    }

    /// Replace every participating group of every match.
    pub fn substitute(&self, contents: &[u8], scope: &Scope) -> RenderResult<Vec<u8>> {
        let mut spans: Vec<(Range<usize>, &str)> = Vec::new();
        for caps in self.regex.captures_iter(contents) {
            for (index, name) in &self.groups {
                let Some(m) = caps.get(*index) else {
                    continue;
                };
                let value = scope.lookup(name).ok_or_else(|| RenderError::UnknownInputVariable {
                    name: name.clone(),
                    available: scope.names(),
                })?;
                spans.push((m.range(), value));
            }
        }

        // Outer groups win over groups nested inside them.
        spans.sort_by(|a, b| a.0.start.cmp(&b.0.start).then(b.0.end.cmp(&a.0.end)));
        let mut kept: Vec<(Range<usize>, &str)> = Vec::with_capacity(spans.len());
        for (range, value) in spans {
            if kept.last().map_or(true, |(last, _)| range.start >= last.end) {
                kept.push((range, value));
            }
        }

        let mut out = contents.to_vec();
        for (range, value) in kept.into_iter().rev() {
            out.splice(range, value.bytes());
        }
        Ok(out)
    }
}

/// Give each repeated `(?P<name>` / `(?<name>` group a unique alias.
///
/// Returns the rewritten pattern and a map from alias to original name.
fn alias_duplicate_names(pattern: &str) -> (String, HashMap<String, String>) {
    let mut out = String::with_capacity(pattern.len());
    let mut aliases = HashMap::new();
    let mut seen = HashSet::new();
    let mut class_depth = 0usize;
    let mut chars = pattern.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            '[' => {
                out.push(c);
                if class_depth > 0 && pattern[i + 1..].starts_with(':') {
                    // POSIX class such as [:alpha:]
                    if let Some(end) = pattern[i + 1..].find(":]") {
                        let stop = i + 1 + end + 2;
                        out.push_str(&pattern[i + 1..stop]);
                        while chars.peek().map_or(false, |(j, _)| *j < stop) {
                            chars.next();
                        }
                    }
                    continue;
                }
                class_depth += 1;
                // A leading `]` (or `^]`) is a literal member.
                if chars.peek().map(|(_, c)| *c) == Some('^') {
                    out.push('^');
                    chars.next();
                }
                if chars.peek().map(|(_, c)| *c) == Some(']') {
                    out.push(']');
                    chars.next();
                }
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(c);
            }
            '(' if class_depth == 0 => {
                let rest = &pattern[i..];
                let prefix = ["(?P<", "(?<"].into_iter().find(|p| rest.starts_with(p));
                let name_end = prefix.and_then(|p| rest[p.len()..].find('>').map(|e| (p, e)));
                let Some((prefix, end)) = name_end else {
                    out.push(c);
                    continue;
                };

                let name = &rest[prefix.len()..prefix.len() + end];
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    out.push(c);
                    continue;
                }
                let mut alias = name.to_string();
                if !seen.insert(name.to_string()) {
                    let mut n = 1;
                    while seen.contains(&alias) {
                        alias = format!("{}__dup{}", name, n);
                        n += 1;
                    }
                    seen.insert(alias.clone());
                    aliases.insert(alias.clone(), name.to_string());
                }

                out.push_str(prefix);
                out.push_str(&alias);
                out.push('>');
                let stop = i + prefix.len() + end + 1;
                while chars.peek().map_or(false, |(j, _)| *j < stop) {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }

    (out, aliases)
}
