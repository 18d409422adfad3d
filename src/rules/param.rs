use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::ParamKind;

/// Computes a rule parameter from `(root data, request data)` at validation time.
pub type DeriveFn = dyn Fn(&Value, Option<&Value>) -> Value + Send + Sync;

/// A rule parameter: a literal, or a value derived from the payload being checked.
///
/// Derived parameters express cross-field rules such as "`max` must be at
/// least the current value of `min`".
#[derive(Clone)]
pub enum RuleParam {
    Literal(Value),
    Derived(Arc<DeriveFn>),
}

impl RuleParam {
    pub fn literal(v: impl Into<Value>) -> Self {
        RuleParam::Literal(v.into())
    }

    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        RuleParam::Derived(Arc::new(f))
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            RuleParam::Literal(v) => Some(v),
            RuleParam::Derived(_) => None,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, RuleParam::Derived(_))
    }

    /// Kind of a literal; `None` for derived parameters and for null/object literals.
    pub fn literal_kind(&self) -> Option<ParamKind> {
        self.as_literal().and_then(ParamKind::of)
    }

    pub fn resolve(&self, data: &Value, request: Option<&Value>) -> Cow<'_, Value> {
        match self {
            RuleParam::Literal(v) => Cow::Borrowed(v),
            RuleParam::Derived(f) => Cow::Owned(f(data, request)),
        }
    }
}

impl fmt::Debug for RuleParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleParam::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            RuleParam::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl PartialEq for RuleParam {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuleParam::Literal(a), RuleParam::Literal(b)) => a == b,
            (RuleParam::Derived(a), RuleParam::Derived(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Value> for RuleParam {
    fn from(v: Value) -> Self {
        RuleParam::Literal(v)
    }
}

impl From<bool> for RuleParam {
    fn from(v: bool) -> Self {
        RuleParam::Literal(Value::Bool(v))
    }
}

impl From<i64> for RuleParam {
    fn from(v: i64) -> Self {
        RuleParam::Literal(Value::from(v))
    }
}

impl From<f64> for RuleParam {
    fn from(v: f64) -> Self {
        RuleParam::Literal(Value::from(v))
    }
}

impl From<&str> for RuleParam {
    fn from(v: &str) -> Self {
        RuleParam::Literal(Value::from(v))
    }
}

impl<'de> Deserialize<'de> for RuleParam {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        Value::deserialize(de).map(RuleParam::Literal)
    }
}
