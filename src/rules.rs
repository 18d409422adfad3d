//! Rule engine: a closed catalog of named, parameterized validators.
//!
//! A catalog entry ([`RuleDefinition`]) fixes the kind of parameter a rule
//! expects and its message template. A [`Rule`] pairs an entry with the
//! parameter a schema node staged for it; the parameter is only resolved (and
//! for derived parameters, computed) when a value is checked.
pub mod format;
pub mod param;

use std::borrow::Cow;
use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::error::{ContractError, Result};
use crate::value::{display_len, is_truthy, strict_eq, to_display, to_number};

pub use param::{DeriveFn, RuleParam};

// ————————————————————————————————————————————————————————————————————————————
// CATALOG
// ————————————————————————————————————————————————————————————————————————————

/// Runtime kind a rule parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Boolean,
    Number,
    String,
    Array,
}

impl ParamKind {
    pub fn of(v: &Value) -> Option<Self> {
        match v {
            Value::Bool(_) => Some(ParamKind::Boolean),
            Value::Number(_) => Some(ParamKind::Number),
            Value::String(_) => Some(ParamKind::String),
            Value::Array(_) => Some(ParamKind::Array),
            Value::Null | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Boolean => "boolean",
            ParamKind::Number => "number",
            ParamKind::String => "string",
            ParamKind::Array => "array",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Required,
    RequiredAllowEmptyString,
    Min,
    Max,
    MinLength,
    MaxLength,
    Pattern,
    Email,
    Url,
    List,
}

#[derive(Debug)]
pub struct RuleDefinition {
    pub kind: RuleKind,
    pub name: &'static str,
    pub expected: ParamKind,
    pub message: &'static str,
}

static CATALOG: [RuleDefinition; 10] = [
    RuleDefinition {
        kind: RuleKind::Required,
        name: "required",
        expected: ParamKind::Boolean,
        message: "[NAME] is required.",
    },
    RuleDefinition {
        kind: RuleKind::RequiredAllowEmptyString,
        name: "requiredAllowEmptyString",
        expected: ParamKind::Boolean,
        message: "[NAME] is required.",
    },
    RuleDefinition {
        kind: RuleKind::Min,
        name: "min",
        expected: ParamKind::Number,
        message: "[NAME] must be equal or greater than [PARAM].",
    },
    RuleDefinition {
        kind: RuleKind::Max,
        name: "max",
        expected: ParamKind::Number,
        message: "[NAME] must be equal or less than [PARAM].",
    },
    RuleDefinition {
        kind: RuleKind::MinLength,
        name: "minlength",
        expected: ParamKind::Number,
        message: "The length of [NAME] must be equal or greater than [PARAM].",
    },
    RuleDefinition {
        kind: RuleKind::MaxLength,
        name: "maxlength",
        expected: ParamKind::Number,
        message: "The length of [NAME] must be equal or less than [PARAM].",
    },
    RuleDefinition {
        kind: RuleKind::Pattern,
        name: "pattern",
        expected: ParamKind::String,
        message: "[NAME] must be match with pattern /[PARAM]/.",
    },
    RuleDefinition {
        kind: RuleKind::Email,
        name: "email",
        expected: ParamKind::Boolean,
        message: "[NAME] must be valid email format.",
    },
    RuleDefinition {
        kind: RuleKind::Url,
        name: "url",
        expected: ParamKind::Boolean,
        message: "[NAME] must be valid url format.",
    },
    RuleDefinition {
        kind: RuleKind::List,
        name: "list",
        expected: ParamKind::Array,
        message: "[NAME] must be one of [[PARAM]].",
    },
];

impl RuleKind {
    pub const ALL: [RuleKind; 10] = [
        RuleKind::Required,
        RuleKind::RequiredAllowEmptyString,
        RuleKind::Min,
        RuleKind::Max,
        RuleKind::MinLength,
        RuleKind::MaxLength,
        RuleKind::Pattern,
        RuleKind::Email,
        RuleKind::Url,
        RuleKind::List,
    ];

    // CATALOG is laid out in declaration order.
    pub fn definition(&self) -> &'static RuleDefinition {
        &CATALOG[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        self.definition().name
    }
}

impl RuleDefinition {
    /// The predicate for an already-resolved parameter.
    fn check(&self, param: &Value, value: &Value, compiled: Option<&Regex>) -> bool {
        let absent = value.is_null();
        match self.kind {
            RuleKind::Required => !(is_truthy(param) && (absent || value.as_str() == Some(""))),
            RuleKind::RequiredAllowEmptyString => !(is_truthy(param) && absent),
            _ if absent => true,
            RuleKind::Min => compare(value, param, |v, p| v >= p),
            RuleKind::Max => compare(value, param, |v, p| v <= p),
            RuleKind::MinLength => compare_len(value, param, |len, p| len >= p),
            RuleKind::MaxLength => compare_len(value, param, |len, p| len <= p),
            RuleKind::Pattern => {
                let text = to_display(value);
                match compiled {
                    Some(rx) => rx.is_match(&text),
                    None => compile_pattern(param).is_some_and(|rx| rx.is_match(&text)),
                }
            }
            RuleKind::Email => !is_truthy(param) || format::is_email(&to_display(value)),
            RuleKind::Url => !is_truthy(param) || format::is_url(&to_display(value)),
            RuleKind::List => param
                .as_array()
                .is_some_and(|options| options.iter().any(|o| strict_eq(o, value))),
        }
    }
}

fn compare(value: &Value, param: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (to_number(value), to_number(param)) {
        (Some(v), Some(p)) => op(v, p),
        _ => false,
    }
}

fn compare_len(value: &Value, param: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match to_number(param) {
        Some(p) => op(display_len(value) as f64, p),
        None => false,
    }
}

fn compile_pattern(param: &Value) -> Option<Regex> {
    let src = to_display(param);
    match Regex::new(&src) {
        Ok(rx) => Some(rx),
        Err(error) => {
            tracing::warn!(pattern = %src, %error, "pattern rule parameter is not a valid regex");
            None
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FACTORY
// ————————————————————————————————————————————————————————————————————————————

pub fn has_rule(name: &str) -> bool {
    rule_config(name).is_some()
}

pub fn rule_config(name: &str) -> Option<&'static RuleDefinition> {
    CATALOG.iter().find(|d| d.name == name)
}

/// Definition-time check of a staged rule: known name, and a literal of the
/// expected kind. Derived parameters are always accepted.
pub fn test(name: &str, param: &RuleParam) -> Result<()> {
    let def = rule_config(name).ok_or_else(|| ContractError::UnknownRule { name: name.to_string() })?;
    if param.is_derived() || param.literal_kind() == Some(def.expected) {
        return Ok(());
    }
    Err(ContractError::RuleShape { name: name.to_string(), expected: def.expected })
}

/// Wraps a parameter with its catalog entry. Performs no kind check.
pub fn new_instance(name: &str, param: RuleParam) -> Result<Rule> {
    rule_config(name)
        .map(|def| Rule::new(def, param))
        .ok_or_else(|| ContractError::UnknownRule { name: name.to_string() })
}

// ————————————————————————————————————————————————————————————————————————————
// INSTANCE
// ————————————————————————————————————————————————————————————————————————————

/// A rule attached to one schema node.
#[derive(Debug, Clone)]
pub struct Rule {
    definition: &'static RuleDefinition,
    param: RuleParam,
    compiled: Option<Regex>,
}

impl Rule {
    pub fn new(definition: &'static RuleDefinition, param: RuleParam) -> Self {
        let compiled = match (definition.kind, param.as_literal()) {
            (RuleKind::Pattern, Some(lit)) => compile_pattern(lit),
            _ => None,
        };
        Self { definition, param, compiled }
    }

    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    pub fn kind(&self) -> RuleKind {
        self.definition.kind
    }

    pub fn definition(&self) -> &'static RuleDefinition {
        self.definition
    }

    pub fn param(&self) -> &RuleParam {
        &self.param
    }

    pub fn is_required(&self) -> bool {
        matches!(self.kind(), RuleKind::Required | RuleKind::RequiredAllowEmptyString)
    }

    pub fn resolve(&self, data: &Value, request: Option<&Value>) -> Cow<'_, Value> {
        self.param.resolve(data, request)
    }

    pub fn validate(&self, value: &Value, data: &Value, request: Option<&Value>) -> bool {
        let param = self.resolve(data, request);
        self.definition.check(&param, value, self.compiled.as_ref())
    }

    /// Message for the literal parameter; derived parameters render as `<derived>`.
    pub fn message(&self, key: &str, value: &Value) -> String {
        match self.param.as_literal() {
            Some(lit) => self.render(key, value, lit),
            None => self.render(key, value, &Value::String("<derived>".into())),
        }
    }

    fn render(&self, key: &str, value: &Value, param: &Value) -> String {
        self.definition
            .message
            .replacen("[NAME]", key, 1)
            .replacen("[PARAM]", &to_display(param), 1)
            .replacen("[VALUE]", &to_display(value), 1)
    }

    /// Resolves the parameter once and reports a failure with the resolved value.
    pub(crate) fn enforce(&self, path: &str, value: &Value, data: &Value, request: Option<&Value>) -> Result<()> {
        let param = self.resolve(data, request);
        if self.definition.check(&param, value, self.compiled.as_ref()) {
            return Ok(());
        }
        Err(ContractError::RuleValidation {
            path: path.to_string(),
            rule: self.name().to_string(),
            value: to_display(value),
            message: self.render(path, value, &param),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rule(name: &str, param: Value) -> Rule {
        new_instance(name, RuleParam::literal(param)).unwrap()
    }

    fn ok(r: &Rule, v: Value) -> bool {
        r.validate(&v, &Value::Null, None)
    }

    #[test]
    fn catalog_is_indexed_by_kind() {
        for k in RuleKind::ALL {
            assert_eq!(k.definition().kind, k);
            assert_eq!(rule_config(k.name()).map(|d| d.kind), Some(k));
        }
    }

    #[test]
    fn factory_rejects_unknown_names_and_wrong_kinds() {
        assert_eq!(
            test("requiredx", &RuleParam::literal(true)),
            Err(ContractError::UnknownRule { name: "requiredx".into() })
        );
        assert_eq!(
            test("min", &RuleParam::literal("5")),
            Err(ContractError::RuleShape { name: "min".into(), expected: ParamKind::Number })
        );
        assert!(test("list", &RuleParam::literal(json!(["a"]))).is_ok());
        assert!(test("max", &RuleParam::derived(|d, _| d["min"].clone())).is_ok());
        assert!(has_rule("requiredAllowEmptyString"));
        assert!(!has_rule("format"));
        assert!(new_instance("nope", RuleParam::literal(true)).is_err());
    }

    #[test]
    fn rule_shape_message() {
        let e = test("list", &RuleParam::literal("a")).unwrap_err();
        assert_eq!(e.to_string(), "rules.list must be function or array");
    }

    #[test]
    fn required_variants() {
        let r = rule("required", json!(true));
        assert!(!ok(&r, Value::Null));
        assert!(!ok(&r, json!("")));
        assert!(ok(&r, json!(0)));
        assert!(ok(&rule("required", json!(false)), Value::Null));

        let r = rule("requiredAllowEmptyString", json!(true));
        assert!(ok(&r, json!("")));
        assert!(!ok(&r, Value::Null));
    }

    #[test]
    fn ranges_ignore_absent_values() {
        let min = rule("min", json!(5));
        assert!(ok(&min, Value::Null));
        assert!(ok(&min, json!(5)));
        assert!(!ok(&min, json!(3)));
        let max = rule("max", json!(5));
        assert!(ok(&max, Value::Null));
        assert!(!ok(&max, json!(5.5)));
    }

    #[test]
    fn min_failure_message() {
        let min = rule("min", json!(5));
        let err = min.enforce("age", &json!(3), &Value::Null, None).unwrap_err();
        assert_eq!(err.to_string(), "3: age must be equal or greater than 5.");
        assert_eq!(min.message("age", &json!(3)), "age must be equal or greater than 5.");
    }

    #[test]
    fn lengths() {
        assert!(ok(&rule("minlength", json!(2)), json!("ab")));
        assert!(!ok(&rule("minlength", json!(2)), json!("a")));
        assert!(ok(&rule("maxlength", json!(3)), json!(123)));
        assert!(!ok(&rule("maxlength", json!(3)), json!("abcd")));
        assert!(ok(&rule("maxlength", json!(3)), Value::Null));
    }

    #[test]
    fn patterns() {
        let r = rule("pattern", json!("^[a-z]+$"));
        assert!(ok(&r, json!("abc")));
        assert!(!ok(&r, json!("abc1")));
        assert!(ok(&r, Value::Null));
        assert!(!ok(&rule("pattern", json!("(")), json!("x")));
    }

    #[test]
    fn email_and_url_honour_false_params() {
        assert!(!ok(&rule("email", json!(true)), json!("nope")));
        assert!(ok(&rule("email", json!(false)), json!("nope")));
        assert!(ok(&rule("email", json!(true)), json!("a@b.io")));
        assert!(!ok(&rule("url", json!(true)), json!("not a url")));
        assert!(ok(&rule("url", json!(false)), json!("not a url")));
    }

    #[test]
    fn list_membership() {
        let r = rule("list", json!(["a", "b", 1]));
        assert!(ok(&r, json!("a")));
        assert!(ok(&r, json!(1.0)));
        assert!(!ok(&r, json!("c")));
        assert!(ok(&r, Value::Null));
        assert_eq!(r.message("mode", &json!("c")), "mode must be one of [a,b,1].");
    }

    #[test]
    fn derived_parameter_resolves_against_data() {
        let max = new_instance("min", RuleParam::derived(|data, _| data["low"].clone())).unwrap();
        let data = json!({"low": 4, "high": 3});
        assert!(!max.validate(&json!(3), &data, None));
        let err = max.enforce("high", &json!(3), &data, None).unwrap_err();
        assert_eq!(err.to_string(), "3: high must be equal or greater than 4.");
        assert_eq!(max.message("high", &json!(3)), "high must be equal or greater than <derived>.");
    }

    #[test]
    fn requiredness() {
        assert!(rule("required", json!(true)).is_required());
        assert!(rule("requiredAllowEmptyString", json!(true)).is_required());
        assert!(!rule("min", json!(1)).is_required());
    }
}
