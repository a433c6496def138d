//! Template rendering.
//!
//! Supports the variable-substitution subset of Go's `text/template`:
//!
//! - `{{.name}}` and `{{ .name }}` insert a variable from the [`Scope`]
//! - `{{- .name -}}` trims surrounding whitespace
//! - `{{ "literal" }}` inserts a quoted string
//! - `{{ toUpper .name }}` and `{{ .name | toSnakeCase }}` apply functions
//! - `{{/* comments */}}` render nothing
//!
//! Referencing a variable that is not in scope is an error, never an empty
//! string.

use regex::Regex;

use crate::error::{RenderError, RenderResult};
use crate::scope::Scope;

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "block", "break", "continue",
];

/// Renders template text against a scope.
pub struct TemplateRenderer {
    action_pattern: Regex,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self {
            // {{ body }} with optional "- " / " -" trim markers
            action_pattern: Regex::new(r"(?s)\{\{(-[ \t\r\n])?(.*?)([ \t\r\n]-)?\}\}")
                .expect("action pattern is valid"),
        }
    }

    /// Render `source` against `scope`.
    pub fn render(&self, source: &str, scope: &Scope) -> RenderResult<String> {
        let mut out = String::with_capacity(source.len());
        let mut last = 0;
        let mut trim_next = false;

        for caps in self.action_pattern.captures_iter(source) {
            let whole = caps.get(0).expect("group 0 always participates");
            let mut literal = &source[last..whole.start()];
            if trim_next {
                literal = literal.trim_start();
            }
            // A left marker trims only the text before it, never earlier output.
            if caps.get(1).is_some() {
                literal = literal.trim_end();
            }
            check_unclosed(literal)?;
            out.push_str(literal);

            let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            out.push_str(&self.eval_action(body, scope)?);

            trim_next = caps.get(3).is_some();
            last = whole.end();
        }

        let mut tail = &source[last..];
        if trim_next {
            tail = tail.trim_start();
        }
        check_unclosed(tail)?;
        out.push_str(tail);
        Ok(out)
    }

    /// Render a byte buffer, which must be UTF-8.
    pub fn render_bytes(&self, source: &[u8], scope: &Scope) -> RenderResult<Vec<u8>> {
        let text = std::str::from_utf8(source).map_err(|e| {
            RenderError::TemplateSyntax(format!("template is not valid UTF-8: {}", e))
        })?;
        Ok(self.render(text, scope)?.into_bytes())
    }

    fn eval_action(&self, body: &str, scope: &Scope) -> RenderResult<String> {
        let body = body.trim();
        if body.starts_with("/*") {
            if body.ends_with("*/") {
                return Ok(String::new());
            }
            return Err(RenderError::TemplateSyntax(format!(
                "unclosed comment in {{{{{}}}}}",
                body
            )));
        }
        if body.is_empty() {
            return Err(RenderError::TemplateSyntax("missing value for command".to_string()));
        }

        let mut value: Option<String> = None;
        for command in split_pipeline(body)? {
            let tokens = tokenize(&command)?;
            let Some((head, args)) = tokens.split_first() else {
                return Err(RenderError::TemplateSyntax(format!(
                    "empty command in pipeline {:?}",
                    body
                )));
            };

            value = Some(match head {
                Token::Ident(name) => {
                    let mut resolved = args
                        .iter()
                        .map(|a| operand(a, scope))
                        .collect::<RenderResult<Vec<_>>>()?;
                    if let Some(previous) = value.take() {
                        resolved.push(previous);
                    }
                    call(name, resolved)?
                }
                operand_token => {
                    if !args.is_empty() || value.is_some() {
                        return Err(RenderError::TemplateSyntax(format!(
                            "can't give argument to non-function in {:?}",
                            body
                        )));
                    }
                    operand(operand_token, scope)?
                }
            });
        }

        value.ok_or_else(|| RenderError::TemplateSyntax(format!("empty pipeline {:?}", body)))
    }
}

fn check_unclosed(literal: &str) -> RenderResult<()> {
    if literal.contains("{{") {
        return Err(RenderError::TemplateSyntax("unclosed action".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Str(String),
    Ident(String),
}

fn operand(token: &Token, scope: &Scope) -> RenderResult<String> {
    match token {
        Token::Field(name) => scope.lookup(name).map(str::to_string).ok_or_else(|| {
            RenderError::UnknownInputVariable {
                name: name.clone(),
                available: scope.names(),
            }
        }),
        Token::Str(s) => Ok(s.clone()),
        Token::Ident(name) => call(name, Vec::new()),
    }
}

fn call(name: &str, args: Vec<String>) -> RenderResult<String> {
    if UNSUPPORTED_KEYWORDS.contains(&name) {
        return Err(RenderError::TemplateSyntax(format!(
            "the {:?} action is not supported",
            name
        )));
    }

    let func: fn(&str) -> String = match name {
        "toLower" => |s| s.to_lowercase(),
        "toUpper" => |s| s.to_uppercase(),
        "trimSpace" => |s| s.trim().to_string(),
        "toSnakeCase" => to_snake_case,
        "toPascalCase" => to_pascal_case,
        "toKebabCase" => to_kebab_case,
        other => {
            return Err(RenderError::TemplateSyntax(format!(
                "function {:?} not defined",
                other
            )))
        }
    };

    match args.as_slice() {
        [arg] => Ok(func(arg)),
        _ => Err(RenderError::TemplateSyntax(format!(
            "wrong number of args for {}: want 1 got {}",
            name,
            args.len()
        ))),
    }
}

/// Split a pipeline on `|`, ignoring bars inside quoted strings.
fn split_pipeline(body: &str) -> RenderResult<Vec<String>> {
    let mut commands = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut escaped = false;

    for c in body.chars() {
        match c {
            _ if escaped => {
                escaped = false;
                current.push(c);
            }
            '\\' if in_quote => {
                escaped = true;
                current.push(c);
            }
            '"' => {
                in_quote = !in_quote;
                current.push(c);
            }
            '|' if !in_quote => commands.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_quote {
        return Err(RenderError::TemplateSyntax(format!(
            "unterminated quoted string in {:?}",
            body
        )));
    }
    commands.push(current);
    Ok(commands)
}

fn tokenize(command: &str) -> RenderResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = command.trim().chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some(other) => s.push(other),
                        None => break,
                    },
                    other => s.push(other),
                }
            }
            if !closed {
                return Err(RenderError::TemplateSyntax(format!(
                    "unterminated quoted string in {:?}",
                    command
                )));
            }
            tokens.push(Token::Str(s));
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            chars.next();
        }

        if let Some(field) = word.strip_prefix('.') {
            if !is_identifier(field) {
                return Err(RenderError::TemplateSyntax(format!(
                    "bad field reference {:?}",
                    word
                )));
            }
            tokens.push(Token::Field(field.to_string()));
        } else if is_identifier(&word) {
            tokens.push(Token::Ident(word));
        } else {
            return Err(RenderError::TemplateSyntax(format!(
                "unexpected {:?} in command",
                word
            )));
        }
    }
    Ok(tokens)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Convert to snake_case.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !result.ends_with('_') {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else if c == '-' || c == ' ' {
            result.push('_');
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    s.split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect()
}

/// Convert to kebab-case.
pub fn to_kebab_case(s: &str) -> String {
    to_snake_case(s).replace('_', "-")
}
