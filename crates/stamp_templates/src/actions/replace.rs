//! `string_replace` and `regex_replace`.

use regex::bytes::{NoExpand, Regex};
use stamp_spec::{RegexReplaceParams, StringReplaceParams};
use tracing::debug;

use super::StepContext;
use crate::error::{RenderError, RenderResult};
use crate::scope::Scope;

/// A literal replacement with its strings already rendered.
struct Literal {
    from: Regex,
    to: String,
    limit: Option<usize>,
}

pub fn run_string(
    ctx: &StepContext<'_>,
    scope: &Scope,
    params: &StringReplaceParams,
) -> RenderResult<()> {
    let rules = params
        .replacements
        .iter()
        .map(|r| {
            let from = ctx.expand(scope, &r.to_replace)?;
            if from.is_empty() {
                return Err(RenderError::InvalidParams(
                    "string_replace: to_replace must not be empty".to_string(),
                ));
            }
            Ok(Literal {
                from: compile(&regex::escape(&from))?,
                to: ctx.expand(scope, &r.with)?,
                limit: r.limit,
            })
        })
        .collect::<RenderResult<Vec<_>>>()?;

    let stats = ctx.modify(scope, &params.paths, |contents| {
        let mut out = contents.to_vec();
        for rule in &rules {
            out = replace_literal(&out, rule);
        }
        Ok(out)
    })?;
    debug!("string_replace changed {} files", stats.modified.len());
    Ok(())
}

fn replace_literal(contents: &[u8], rule: &Literal) -> Vec<u8> {
    match rule.limit {
        Some(0) => contents.to_vec(),
        // replacen treats 0 as "no limit"
        limit => rule
            .from
            .replacen(contents, limit.unwrap_or(0), NoExpand(rule.to.as_bytes()))
            .into_owned(),
    }
}

/// A regex replacement with its pattern compiled and template rendered.
struct Pattern {
    regex: Regex,
    with: String,
    subgroup: Option<String>,
    limit: Option<usize>,
}

pub fn run_regex(
    ctx: &StepContext<'_>,
    scope: &Scope,
    params: &RegexReplaceParams,
) -> RenderResult<()> {
    let rules = params
        .replacements
        .iter()
        .map(|r| {
            let regex = compile(&ctx.expand(scope, &r.regex)?)?;
            let subgroup = match &r.subgroup_to_replace {
                Some(name) => {
                    let name = ctx.expand(scope, name)?;
                    if !regex.capture_names().flatten().any(|n| n == name) {
                        return Err(RenderError::InvalidParams(format!(
                            "regex_replace: subgroup_to_replace {:?} is not a named group in {:?}",
                            name,
                            regex.as_str()
                        )));
                    }
                    Some(name)
                }
                None => None,
            };
            Ok(Pattern {
                regex,
                with: ctx.expand(scope, &r.with)?,
                subgroup,
                limit: r.limit,
            })
        })
        .collect::<RenderResult<Vec<_>>>()?;

    let stats = ctx.modify(scope, &params.paths, |contents| {
        let mut out = contents.to_vec();
        for rule in &rules {
            out = replace_regex(&out, rule);
        }
        Ok(out)
    })?;
    debug!("regex_replace changed {} files", stats.modified.len());
    Ok(())
}

/// Replace matches from the back of the buffer so earlier offsets stay valid.
fn replace_regex(contents: &[u8], rule: &Pattern) -> Vec<u8> {
    let limit = rule.limit.unwrap_or(usize::MAX);
    let matches: Vec<_> = rule.regex.captures_iter(contents).take(limit).collect();

    let mut out = contents.to_vec();
    for caps in matches.iter().rev() {
        let span = match &rule.subgroup {
            Some(name) => caps.name(name),
            None => caps.get(0),
        };
        let Some(span) = span else {
            continue;
        };

        let mut replacement = Vec::new();
        caps.expand(rule.with.as_bytes(), &mut replacement);
        out.splice(span.range(), replacement);
    }
    out
}

pub(crate) fn compile(pattern: &str) -> RenderResult<Regex> {
    Regex::new(pattern).map_err(|e| RenderError::InvalidRegex {
        regex: pattern.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{scope, Fixture};
    use stamp_spec::{PathExpr, RegexReplacement, StringReplacement};

    fn literal(from: &str, to: &str, limit: Option<usize>) -> Literal {
        Literal {
            from: compile(&regex::escape(from)).unwrap(),
            to: to.to_string(),
            limit,
        }
    }

    fn pattern(regex: &str, with: &str, subgroup: Option<&str>, limit: Option<usize>) -> Pattern {
        Pattern {
            regex: compile(regex).unwrap(),
            with: with.to_string(),
            subgroup: subgroup.map(str::to_string),
            limit,
        }
    }

    #[test]
    fn test_literal_replace_with_limit() {
        let rule = literal("foo", "bar", None);
        assert_eq!(replace_literal(b"foo foo foo", &rule), b"bar bar bar");

        let rule = literal("foo", "bar", Some(2));
        assert_eq!(replace_literal(b"foo foo foo", &rule), b"bar bar foo");

        let rule = literal("foo", "bar", Some(0));
        assert_eq!(replace_literal(b"foo", &rule), b"foo");
    }

    #[test]
    fn test_literal_replace_is_not_a_regex() {
        let rule = literal("a.b", "$1", None);
        assert_eq!(replace_literal(b"a.b axb", &rule), b"$1 axb");
    }

    #[test]
    fn test_regex_replace_expands_groups() {
        let rule = pattern(r"(?P<key>\w+)=(?P<value>\w+)", "${value}=${key}", None, None);
        assert_eq!(replace_regex(b"a=1 b=2", &rule), b"1=a 2=b");
    }

    #[test]
    fn test_regex_replace_subgroup_only() {
        let rule = pattern(r"version: (?P<v>\d+)", "9", Some("v"), None);
        assert_eq!(replace_regex(b"version: 1\nversion: 22\n", &rule), b"version: 9\nversion: 9\n");
    }

    #[test]
    fn test_regex_replace_limit() {
        let rule = pattern(r"x", "y", None, Some(1));
        assert_eq!(replace_regex(b"xxx", &rule), b"yxx");
    }

    #[test]
    fn test_string_replace_action_renders_params() {
        let mut fx = Fixture::new();
        fx.write("scratch", "go.mod", "module example.com/placeholder\n");
        let params = StringReplaceParams {
            paths: vec![PathExpr::new("go.mod")],
            replacements: vec![StringReplacement {
                to_replace: "placeholder".to_string(),
                with: "{{.name}}".to_string(),
                limit: None,
            }],
        };

        fx.with_ctx(|ctx| run_string(ctx, &scope(&[("name", "orders")]), &params))
            .unwrap();
        assert_eq!(fx.read("scratch", "go.mod"), "module example.com/orders\n");
    }

    #[test]
    fn test_regex_replace_action_unknown_subgroup() {
        let mut fx = Fixture::new();
        fx.write("scratch", "a.txt", "abc");
        let params = RegexReplaceParams {
            paths: vec![PathExpr::new("a.txt")],
            replacements: vec![RegexReplacement {
                regex: "(?P<x>b)".to_string(),
                with: "B".to_string(),
                subgroup_to_replace: Some("y".to_string()),
                limit: None,
            }],
        };

        let err = fx
            .with_ctx(|ctx| run_regex(ctx, &scope(&[]), &params))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidParams(_)));
    }

    #[test]
    fn test_invalid_regex() {
        let err = compile("(unclosed").unwrap_err();
        assert!(matches!(err, RenderError::InvalidRegex { .. }));
    }
}
