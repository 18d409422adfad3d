//! Schema tree: one [`Param`] per declared field.
//!
//! A tree is materialized from a literal schema description:
//! - a string is a primitive type tag, optionally in the
//!   `"<type>, rule=value, ..."` shorthand (see [`crate::shorthand`]);
//! - an array marks the node as a homogeneous list whose element shape is the
//!   array's first element;
//! - an object is a composite node with one child per key;
//! - an array nested in an array becomes an `array`-typed node with a single
//!   synthetic child named `array`.
//!
//! After construction, rules staged on a node are turned into [`Rule`]
//! instances by [`Param::build`]. Validation is strict: composite levels reject
//! keys the schema does not declare.
pub mod date;

use indexmap::IndexMap;
use serde_json::Value;

use crate::coverage::Coverage;
use crate::datatype::{DataType, UnknownDataType};
use crate::error::{ContractError, Result};
use crate::rules::{self, Rule, RuleParam};
use crate::shorthand::{self, FORMAT_KEY};
use crate::value::{is_truthy, to_display};

pub use date::DateFormat;

/// Rules staged on a node before [`Param::build`], keyed by rule name.
pub type RuleConfig = IndexMap<String, RuleParam>;

/// Name of the single child of a nested-array node.
pub const ARRAY_CHILD: &str = "array";

/// Pre-order position of a node in the tree it was built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Hands out node ids while a tree is being built.
#[derive(Debug, Default)]
pub(crate) struct NodeIds {
    next: u32,
}

impl NodeIds {
    fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone)]
pub enum Shape {
    /// A type tag; checked against [`DataType`] by [`Param::test`].
    Primitive(String),
    Object(IndexMap<String, Param>),
    /// A nested array; the boxed node is the synthetic `array` child.
    Array(Box<Param>),
}

#[derive(Debug, Clone)]
pub struct Param {
    id: NodeId,
    name: String,
    full_name: String,
    shape: Shape,
    is_array: bool,
    pending: RuleConfig,
    rules: Vec<Rule>,
    date_format: Option<DateFormat>,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl Param {
    /// Builds a standalone tree whose descendants are prefixed with `name.`.
    pub fn new(name: &str, literal: &Value) -> Result<Self> {
        let mut ids = NodeIds::default();
        Self::from_literal(name, literal, "", true, &mut ids)
    }

    /// `nest` decides whether children are prefixed with this node's full name.
    pub(crate) fn from_literal(name: &str, literal: &Value, prefix: &str, nest: bool, ids: &mut NodeIds) -> Result<Self> {
        let id = ids.next();
        let full_name = format!("{prefix}{name}");
        let child_prefix = if nest { format!("{full_name}.") } else { String::new() };
        let mut pending = RuleConfig::new();

        let (shape, is_array) = match literal {
            Value::Array(items) => {
                let shape = match items.first() {
                    Some(element @ Value::Array(_)) => {
                        let child = Self::from_literal(ARRAY_CHILD, element, &child_prefix, true, ids)?;
                        Shape::Array(Box::new(child))
                    }
                    Some(Value::Object(map)) => Shape::Object(Self::children(map, &child_prefix, ids)?),
                    Some(Value::String(s)) => Self::primitive(s, &mut pending)?,
                    Some(other) => Shape::Primitive(to_display(other)),
                    None => Shape::Primitive(DataType::Any.as_str().to_string()),
                };
                (shape, true)
            }
            Value::Object(map) => (Shape::Object(Self::children(map, &child_prefix, ids)?), false),
            Value::String(s) => (Self::primitive(s, &mut pending)?, false),
            // not a declaration; kept as a tag so the self-check reports it
            other => (Shape::Primitive(to_display(other)), false),
        };

        Ok(Self {
            id,
            name: name.to_string(),
            full_name,
            shape,
            is_array,
            pending,
            rules: Vec::new(),
            date_format: None,
        })
    }

    fn primitive(src: &str, pending: &mut RuleConfig) -> Result<Shape> {
        let decl = shorthand::parse(src)?;
        pending.extend(decl.rules);
        Ok(Shape::Primitive(decl.base))
    }

    fn children(map: &serde_json::Map<String, Value>, prefix: &str, ids: &mut NodeIds) -> Result<IndexMap<String, Param>> {
        map.iter()
            .map(|(key, value)| Ok((key.clone(), Self::from_literal(key, value, prefix, true, ids)?)))
            .collect()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ACCESSORS
// ————————————————————————————————————————————————————————————————————————————

impl Param {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name prefixed by the ancestor chain, joined with `.`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Primitive tag, `object`, or `array`.
    pub fn type_name(&self) -> &str {
        match &self.shape {
            Shape::Primitive(tag) => tag,
            Shape::Object(_) => "object",
            Shape::Array(_) => "array",
        }
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self.shape, Shape::Primitive(_))
    }

    pub fn has_children(&self) -> bool {
        match &self.shape {
            Shape::Primitive(_) => false,
            Shape::Object(children) => !children.is_empty(),
            Shape::Array(_) => true,
        }
    }

    pub fn child_names(&self) -> Vec<&str> {
        self.child_params().into_iter().map(Param::name).collect()
    }

    pub fn child_params(&self) -> Vec<&Param> {
        match &self.shape {
            Shape::Primitive(_) => Vec::new(),
            Shape::Object(children) => children.values().collect(),
            Shape::Array(child) => vec![child.as_ref()],
        }
    }

    pub fn get_child(&self, name: &str) -> Option<&Param> {
        match &self.shape {
            Shape::Primitive(_) => None,
            Shape::Object(children) => children.get(name),
            Shape::Array(child) => (name == ARRAY_CHILD).then_some(child.as_ref()),
        }
    }

    /// Every descendant, pre-order.
    pub fn all_child_params(&self) -> Vec<&Param> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Param>) {
        for child in self.child_params() {
            out.push(child);
            child.collect_descendants(out);
        }
    }

    pub(crate) fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Param)) {
        f(self);
        match &mut self.shape {
            Shape::Primitive(_) => {}
            Shape::Object(children) => children.values_mut().for_each(|c| c.visit_mut(f)),
            Shape::Array(child) => child.visit_mut(f),
        }
    }

    /// Rules staged but not yet built (including the reserved `format` key).
    pub fn pending_rules(&self) -> &RuleConfig {
        &self.pending
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.name() == name)
    }

    pub fn date_format(&self) -> Option<&DateFormat> {
        self.date_format.as_ref()
    }

    /// Merges staged rules; a rule name already staged is replaced.
    pub fn add_rules(&mut self, config: impl IntoIterator<Item = (String, RuleParam)>) {
        self.pending.extend(config);
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SELF-CHECK
// ————————————————————————————————————————————————————————————————————————————

impl Param {
    /// Definition-time check: primitive tags are registered, staged rules are
    /// known and well-shaped. Recurses into every child.
    pub fn test(&self) -> Result<()> {
        if let Shape::Primitive(tag) = &self.shape {
            if let Err(UnknownDataType(tag)) = tag.parse::<DataType>() {
                return Err(ContractError::InvalidDataType { path: self.full_name.clone(), tag });
            }
        }
        for (name, param) in &self.pending {
            if name != FORMAT_KEY {
                rules::test(name, param)?;
            }
        }
        for child in self.child_params() {
            child.test()?;
        }
        Ok(())
    }

    /// Resolves date formats and instantiates staged rules, recursively.
    /// Staged names outside the catalog are dropped here; `test` reports them.
    pub fn build(&mut self) {
        self.rules.clear();
        self.date_format = match &self.shape {
            Shape::Primitive(tag) => DataType::parse(tag).and_then(|t| t.default_format()).map(|default| {
                let configured = self.pending.get(FORMAT_KEY).and_then(RuleParam::as_literal).and_then(Value::as_str);
                DateFormat::new(configured.unwrap_or(default))
            }),
            _ => None,
        };
        for (name, param) in &self.pending {
            if name == FORMAT_KEY {
                continue;
            }
            if let Some(def) = rules::rule_config(name) {
                self.rules.push(Rule::new(def, param.clone()));
            }
        }
        match &mut self.shape {
            Shape::Primitive(_) => {}
            Shape::Object(children) => children.values_mut().for_each(Param::build),
            Shape::Array(child) => child.build(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

impl Param {
    /// Validates `value` against this node. `data` is the root payload and
    /// `request` the request parameters, both handed to derived rule params.
    pub fn validate(&self, value: &Value, data: &Value, request: Option<&Value>, coverage: &mut Coverage) -> Result<()> {
        if is_truthy(value) {
            coverage.mark(self.id);
        }
        let targets = if self.is_array && !value.is_null() {
            match value {
                Value::Array(items) => items.as_slice(),
                other => {
                    return Err(ContractError::TypeMismatch {
                        path: self.full_name.clone(),
                        expected: "array".to_string(),
                        value: to_display(other),
                    });
                }
            }
        } else {
            std::slice::from_ref(value)
        };
        for item in targets {
            self.validate_item(item, data, request, coverage)?;
        }
        Ok(())
    }

    fn validate_item(&self, item: &Value, data: &Value, request: Option<&Value>, coverage: &mut Coverage) -> Result<()> {
        let shape_ok = match (&self.shape, item) {
            (_, Value::Null) => true,
            (Shape::Primitive(_), v) => self.validate_type(v),
            (Shape::Object(children), Value::Object(_)) => !children.is_empty(),
            (Shape::Array(_), Value::Array(_)) => true,
            _ => false,
        };
        if !shape_ok {
            return Err(self.mismatch(item));
        }

        for rule in &self.rules {
            rule.enforce(&self.full_name, item, data, request)?;
        }

        match (&self.shape, item) {
            (Shape::Object(children), Value::Object(map)) => {
                let mut unconsumed: Vec<&str> = map.keys().map(String::as_str).collect();
                for (key, child) in children {
                    let value = match unconsumed.iter().position(|k| k == key) {
                        Some(n) => {
                            unconsumed.remove(n);
                            map.get(key).unwrap_or(&Value::Null)
                        }
                        None => &Value::Null,
                    };
                    child.validate(value, data, request, coverage)?;
                }
                if !unconsumed.is_empty() {
                    return Err(ContractError::UnknownKeys {
                        path: self.full_name.clone(),
                        keys: unconsumed.into_iter().map(str::to_string).collect(),
                    });
                }
            }
            (Shape::Array(child), Value::Array(_)) => child.validate(item, data, request, coverage)?,
            _ => {}
        }
        Ok(())
    }

    fn mismatch(&self, item: &Value) -> ContractError {
        let expected = if self.is_array {
            format!("array of {}", self.type_name())
        } else {
            self.type_name().to_string()
        };
        ContractError::TypeMismatch { path: self.full_name.clone(), expected, value: to_display(item) }
    }

    /// Primitive check for a non-null value.
    fn validate_type(&self, v: &Value) -> bool {
        let Shape::Primitive(tag) = &self.shape else {
            return false;
        };
        let Some(ty) = DataType::parse(tag) else {
            return false;
        };
        match ty {
            DataType::Any => true,
            DataType::String => v.is_string(),
            DataType::Number | DataType::Double => v.is_number(),
            DataType::Boolean => v.is_boolean(),
            DataType::Int | DataType::Long => match v {
                Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0),
                _ => false,
            },
            DataType::Date | DataType::DateTime => match (v, &self.date_format) {
                (Value::String(s), Some(format)) => format.accepts(s),
                (Value::String(s), None) => ty.default_format().is_some_and(|f| DateFormat::new(f).accepts(s)),
                _ => false,
            },
            DataType::Bit => matches!(v.as_str(), Some("0" | "1")),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COVERAGE
// ————————————————————————————————————————————————————————————————————————————

impl Param {
    pub fn is_covered(&self, coverage: &Coverage) -> bool {
        coverage.is_covered(self.id)
    }

    /// Covered share of descendants; `1.0` when nothing is uncovered.
    pub fn coverage(&self, coverage: &Coverage) -> f64 {
        let all = self.all_child_params();
        let uncovered = all.iter().filter(|p| !p.is_covered(coverage)).count();
        if uncovered == 0 {
            return 1.0;
        }
        (all.len() - uncovered) as f64 / all.len() as f64
    }

    pub fn uncovered_param_names(&self, coverage: &Coverage) -> Vec<String> {
        self.all_child_params()
            .into_iter()
            .filter(|p| !p.is_covered(coverage))
            .map(|p| p.full_name.clone())
            .collect()
    }

    /// Forgets coverage of this node and every descendant.
    pub fn clear_coverage(&self, coverage: &mut Coverage) {
        coverage.unmark(self.id);
        for child in self.all_child_params() {
            coverage.unmark(child.id);
        }
    }
}
