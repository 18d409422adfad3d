//! Lexer for the `"<type>, rule=value, ..."` declaration shorthand.
//!
//! Items are separated by commas at nesting depth zero, so a pattern like
//! `pattern=^[a-z]{1,3}$` stays one item. A backslash escapes the next
//! character. Each rule item splits on its first `=`; a bare rule name means
//! `true`.
use serde_json::Value;

use crate::error::{ContractError, Result};
use crate::rules::{self, ParamKind, RuleParam};

/// Staged-config key that carries a date format instead of a rule.
pub const FORMAT_KEY: &str = "format";

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub base: String,
    pub rules: Vec<(String, RuleParam)>,
}

/// Splits on commas outside `()`, `[]`, `{}`; trims each item.
pub fn split_top_level(src: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut chars = src.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth = (depth - 1).max(0);
                current.push(c);
            }
            ',' if depth == 0 => items.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    items.push(current.trim().to_string());
    items
}

/// Parses a declaration string. Strings without commas are a bare type tag.
pub fn parse(src: &str) -> Result<Declaration> {
    let mut items = split_top_level(src).into_iter();
    let base = items.next().unwrap_or_default();
    let mut out = Vec::new();
    for item in items {
        let (name, raw) = match item.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (item.trim().to_string(), String::new()),
        };
        let raw = if raw.is_empty() { "true".to_string() } else { raw };
        let param = if name == FORMAT_KEY {
            Value::String(raw)
        } else {
            let def = rules::rule_config(&name).ok_or_else(|| ContractError::UnknownRule { name: name.clone() })?;
            coerce(&raw, def.expected)
        };
        out.push((name, RuleParam::Literal(param)));
    }
    Ok(Declaration { base, rules: out })
}

/// Numbers and booleans are coerced; everything else stays a string. An
/// unparsable number stays a string so the definition self-check flags it.
fn coerce(raw: &str, expected: ParamKind) -> Value {
    match expected {
        ParamKind::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(|f| {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(Value::from(f as i64))
                } else {
                    serde_json::Number::from_f64(f).map(Value::Number)
                }
            })
            .unwrap_or_else(|| Value::String(raw.to_string())),
        ParamKind::Boolean => Value::Bool(raw == "true"),
        ParamKind::String | ParamKind::Array => Value::String(raw.to_string()),
    }
}
