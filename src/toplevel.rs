//! Entry point for a request or response body schema.
//!
//! A [`TopLevelParam`] materializes the tree, merges an out-of-band rule map
//! into the nodes each key resolves to (through a [`ParamPool`]), then builds
//! the tree once. Its direct children are addressed by their own names, so
//! full paths read `user.email` rather than `response.user.email`.
use indexmap::IndexMap;
use serde_json::Value;

use crate::coverage::Coverage;
use crate::error::Result;
use crate::param::{NodeId, NodeIds, Param, RuleConfig};
use crate::pool::ParamPool;

/// Rule declarations keyed by pool key (local name, dotted path or `*`).
pub type RuleMap = IndexMap<String, RuleConfig>;

#[derive(Debug, Clone)]
pub struct TopLevelParam {
    root: Param,
    coverage: Coverage,
}

impl TopLevelParam {
    pub fn new(name: &str, literal: &Value, rules: Option<&RuleMap>) -> Result<Self> {
        let mut ids = NodeIds::default();
        let root = Param::from_literal(name, literal, "", false, &mut ids)?;
        let mut top = Self { root, coverage: Coverage::new() };
        match rules {
            Some(rules) => top.apply_rules(rules),
            None => top.build(),
        }
        tracing::debug!(
            schema = name,
            nodes = top.root.all_child_params().len(),
            rules = top.rule_count(),
            "built schema"
        );
        Ok(top)
    }

    /// Merges each key's config into every node the key resolves to, then
    /// rebuilds the tree. Keys that resolve to nothing are skipped (see
    /// [`Self::unresolved_keys`]).
    pub fn apply_rules(&mut self, rules: &RuleMap) {
        self.merge_rules(rules);
        self.build();
    }

    pub fn build(&mut self) {
        self.root.build();
    }

    fn merge_rules(&mut self, rules: &RuleMap) {
        let mut targets: Vec<(NodeId, &RuleConfig)> = Vec::new();
        {
            let pool = ParamPool::new(&self.root);
            for (key, config) in rules {
                let Some(params) = pool.get_params(key) else {
                    tracing::trace!(%key, "rule key resolves to no parameter");
                    continue;
                };
                tracing::trace!(%key, targets = params.len(), "resolved rule key");
                targets.extend(params.into_iter().map(|p| (p.id(), config)));
            }
        }
        self.root.visit_mut(&mut |node| {
            let node_id = node.id();
            for (_, config) in targets.iter().filter(|(id, _)| *id == node_id) {
                node.add_rules(config.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        });
    }

    fn rule_count(&self) -> usize {
        std::iter::once(&self.root)
            .chain(self.root.all_child_params())
            .map(|p| p.rules().len())
            .sum()
    }

    pub fn param(&self) -> &Param {
        &self.root
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    pub fn pool(&self) -> ParamPool<'_> {
        ParamPool::new(&self.root)
    }

    /// Rule-map keys that resolve to no node in this schema.
    pub fn unresolved_keys(&self, rules: &RuleMap) -> Vec<String> {
        let pool = self.pool();
        rules.keys().filter(|k| !pool.contains(k)).cloned().collect()
    }

    pub fn has_children(&self) -> bool {
        self.root.has_children()
    }

    pub fn test(&self) -> Result<()> {
        self.root.test()
    }

    pub fn validate(&mut self, value: &Value, data: &Value, request: Option<&Value>) -> Result<()> {
        let result = self.root.validate(value, data, request, &mut self.coverage);
        if let Err(error) = &result {
            tracing::debug!(schema = self.root.name(), %error, "validation failed");
        }
        result
    }

    pub fn coverage(&self) -> f64 {
        self.root.coverage(&self.coverage)
    }

    pub fn uncovered_param_names(&self) -> Vec<String> {
        self.root.uncovered_param_names(&self.coverage)
    }

    pub fn clear_coverage(&mut self) {
        self.root.clear_coverage(&mut self.coverage);
    }

    pub fn coverage_state(&self) -> &Coverage {
        &self.coverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContractError;
    use crate::rules::RuleParam;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rule_map(v: Value) -> RuleMap {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn children_are_addressed_without_the_root_name() {
        let top = TopLevelParam::new("response", &json!({"a": {"b": "int"}}), None).unwrap();
        assert_eq!(top.param().full_name(), "response");
        let a = top.param().get_child("a").unwrap();
        assert_eq!(a.full_name(), "a");
        assert_eq!(a.get_child("b").unwrap().full_name(), "a.b");
    }

    #[test]
    fn rule_map_targets_every_matching_node() {
        let rules = rule_map(json!({"email": {"required": true, "email": true}}));
        let mut top = TopLevelParam::new(
            "request",
            &json!({"user": {"email": "string"}, "contact": {"email": "string"}}),
            Some(&rules),
        )
        .unwrap();
        let pool = top.pool();
        for p in pool.get_params("email").unwrap() {
            assert!(p.has_rule("required"));
            assert!(p.has_rule("email"));
        }
        drop(pool);

        let err = top
            .validate(&json!({"user": {"email": "a@b.io"}, "contact": {"email": "nope"}}), &Value::Null, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "nope: contact.email must be valid email format.");
    }

    #[test]
    fn merges_accumulate_across_keys() {
        let rules = rule_map(json!({
            "name": {"required": true},
            "user.name": {"maxlength": 3},
            "*": {"minlength": 1},
        }));
        let top = TopLevelParam::new("request", &json!({"user": {"name": "string"}}), Some(&rules)).unwrap();
        let name = top.pool().get_params("user.name").unwrap()[0];
        let staged: Vec<&str> = name.pending_rules().keys().map(String::as_str).collect();
        assert_eq!(staged, vec!["required", "maxlength", "minlength"]);
        assert_eq!(name.rules().len(), 3);
    }

    #[test]
    fn later_keys_replace_the_same_rule() {
        let rules = rule_map(json!({"n": {"max": 5}, "*": {"max": 9}}));
        let mut top = TopLevelParam::new("request", &json!({"n": "int"}), Some(&rules)).unwrap();
        assert!(top.validate(&json!({"n": 7}), &Value::Null, None).is_ok());
    }

    #[test]
    fn rules_applied_after_construction() {
        let mut top = TopLevelParam::new("request", &json!({"a": "string"}), None).unwrap();
        assert!(top.validate(&json!({}), &Value::Null, None).is_ok());
        top.apply_rules(&rule_map(json!({"a": {"required": true}})));
        assert_eq!(top.validate(&json!({}), &Value::Null, None).unwrap_err().to_string(), "null: a is required.");
    }

    #[test]
    fn unresolved_keys_are_reported_not_applied() {
        let rules = rule_map(json!({"ghost": {"required": true}, "a": {"required": true}}));
        let top = TopLevelParam::new("request", &json!({"a": "string"}), Some(&rules)).unwrap();
        assert_eq!(top.unresolved_keys(&rules), vec!["ghost".to_string()]);
    }

    #[test]
    fn self_check_after_build_sees_unknown_rules() {
        let rules = rule_map(json!({"a": {"requiredx": true}}));
        let top = TopLevelParam::new("request", &json!({"a": {"b": "string"}}), Some(&rules)).unwrap();
        assert_eq!(top.test(), Err(ContractError::UnknownRule { name: "requiredx".into() }));
    }

    #[test]
    fn derived_rule_params_compare_siblings() {
        let mut rules = RuleMap::new();
        rules.insert(
            "max".into(),
            [("min".to_string(), RuleParam::derived(|data, _| data["min"].clone()))].into_iter().collect(),
        );
        let mut top = TopLevelParam::new("response", &json!({"min": "int", "max": "int"}), Some(&rules)).unwrap();
        assert!(top.test().is_ok());
        let ok = json!({"min": 1, "max": 3});
        assert!(top.validate(&ok, &ok, None).is_ok());
        let bad = json!({"min": 5, "max": 3});
        let err = top.validate(&bad, &bad, None).unwrap_err();
        assert_eq!(err.to_string(), "3: max must be equal or greater than 5.");
    }

    #[test]
    fn request_data_reaches_derived_params() {
        let mut rules = RuleMap::new();
        rules.insert(
            "items".into(),
            [(
                "maxlength".to_string(),
                RuleParam::derived(|_, req| req.and_then(|r| r.get("limit")).cloned().unwrap_or(Value::Null)),
            )]
            .into_iter()
            .collect(),
        );
        let mut top = TopLevelParam::new("response", &json!({"items": "string"}), Some(&rules)).unwrap();
        let body = json!({"items": "abcd"});
        assert!(top.validate(&body, &body, Some(&json!({"limit": 4}))).is_ok());
        assert!(top.validate(&body, &body, Some(&json!({"limit": 3}))).is_err());
    }

    #[test]
    fn coverage_over_a_run() {
        let mut top = TopLevelParam::new("response", &json!({"a": "string", "b": {"c": "int"}}), None).unwrap();
        let body = json!({"a": "x"});
        top.validate(&body, &body, None).unwrap();
        assert!((top.coverage() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(top.uncovered_param_names(), vec!["b", "b.c"]);

        let body = json!({"b": {"c": 2}});
        top.validate(&body, &body, None).unwrap();
        assert_eq!(top.coverage(), 1.0);
        assert!(top.uncovered_param_names().is_empty());

        top.clear_coverage();
        assert_eq!(top.coverage(), 0.0);
        assert!(top.coverage_state().is_empty());
    }

    #[test]
    fn partial_and_extra_payloads() {
        let mut top = TopLevelParam::new("response", &json!({"a": "string", "b": {"c": "int"}}), None).unwrap();
        let full = json!({"a": "x", "b": {"c": 5}});
        assert!(top.validate(&full, &full, None).is_ok());
        let partial = json!({"b": {"c": 5}});
        assert!(top.validate(&partial, &partial, None).is_ok());
        let extra = json!({"a": "x", "b": {"c": 5}, "d": true});
        assert_eq!(
            top.validate(&extra, &extra, None),
            Err(ContractError::UnknownKeys { path: "response".into(), keys: vec!["d".into()] })
        );
    }
}
