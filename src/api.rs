//! API definitions: endpoint, method, content types and the request/response
//! schemas, with the definition self-check and payload validation built on top
//! of [`TopLevelParam`]. No transport lives here; callers hand in what they
//! sent and what came back.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ContractError, Result};
use crate::toplevel::{RuleMap, TopLevelParam};
use crate::value::to_display;

static URL_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]").expect("static url param regex"));

// ————————————————————————————————————————————————————————————————————————————
// VOCABULARY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = ContractError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "" => Err(ContractError::MissingMethod),
            other => Err(ContractError::InvalidMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Csv,
    Text,
    Json,
    UrlEncoded,
    Multipart,
}

impl ContentType {
    pub const ALL: [ContentType; 5] =
        [ContentType::Csv, ContentType::Text, ContentType::Json, ContentType::UrlEncoded, ContentType::Multipart];

    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Csv => "text/csv",
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
            ContentType::UrlEncoded => "application/x-www-form-urlencoded",
            ContentType::Multipart => "multipart/form-data",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.mime() == mime)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Media type of a `Content-Type` header: parameters dropped, trimmed, lower-cased.
pub fn media_type(header: &str) -> String {
    header.split(';').next().unwrap_or_default().trim().to_lowercase()
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

pub fn is_bad_request(status: u16) -> bool {
    status == 400
}

pub fn is_unauthorized(status: u16) -> bool {
    status == 401
}

pub fn is_forbidden(status: u16) -> bool {
    status == 403
}

pub fn is_not_found(status: u16) -> bool {
    status == 404
}

pub fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status)
}

// ————————————————————————————————————————————————————————————————————————————
// CONFIG
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub request: RequestConfig,
    pub response: Option<ResponseConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    pub content_type: Option<String>,
    pub headers: Option<IndexMap<String, String>>,
    pub params: Option<Value>,
    pub rules: Option<RuleMap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    pub content_type: Option<String>,
    pub data: Option<Value>,
    pub rules: Option<RuleMap>,
}

// ————————————————————————————————————————————————————————————————————————————
// DEFINITION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub content_type: String,
    pub headers: IndexMap<String, String>,
    pub params: Option<TopLevelParam>,
    pub rules: Option<RuleMap>,
}

#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub content_type: String,
    pub data: Option<TopLevelParam>,
    pub rules: Option<RuleMap>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    pub name: String,
    pub request: Option<SchemaCoverage>,
    pub response: Option<SchemaCoverage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaCoverage {
    pub ratio: f64,
    pub uncovered: Vec<String>,
}

impl SchemaCoverage {
    fn of(p: &TopLevelParam) -> Self {
        Self { ratio: p.coverage(), uncovered: p.uncovered_param_names() }
    }
}

#[derive(Debug, Clone)]
pub struct ApiDefinition {
    name: String,
    description: Option<String>,
    endpoint: String,
    method: String,
    request: RequestSpec,
    response: Option<ResponseSpec>,
    url_params: Vec<String>,
}

impl ApiDefinition {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let ApiConfig { name, description, endpoint, method, request, response } = config;
        let request = RequestSpec {
            content_type: request.content_type.unwrap_or_else(|| ContentType::UrlEncoded.mime().to_string()),
            headers: request.headers.unwrap_or_default(),
            params: request
                .params
                .as_ref()
                .map(|p| TopLevelParam::new("request", p, request.rules.as_ref()))
                .transpose()?,
            rules: request.rules,
        };
        let response = response
            .map(|r| -> Result<ResponseSpec> {
                Ok(ResponseSpec {
                    content_type: r.content_type.unwrap_or_else(|| ContentType::Json.mime().to_string()),
                    data: r.data.as_ref().map(|d| TopLevelParam::new("response", d, r.rules.as_ref())).transpose()?,
                    rules: r.rules,
                })
            })
            .transpose()?;
        let url_params = URL_PARAM.captures_iter(&endpoint).map(|c| c[1].to_string()).collect();
        Ok(Self {
            name: name.unwrap_or_else(|| endpoint.clone()),
            description,
            endpoint,
            method,
            request,
            response,
            url_params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn request(&self) -> &RequestSpec {
        &self.request
    }

    pub fn response(&self) -> Option<&ResponseSpec> {
        self.response.as_ref()
    }

    /// Bracketed endpoint segments, e.g. `id` in `/users/[id]`.
    pub fn url_params(&self) -> &[String] {
        &self.url_params
    }

    /// Definition self-check, run once per definition.
    pub fn test(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(ContractError::MissingEndpoint);
        }
        if !self.endpoint.starts_with('/') {
            return Err(ContractError::RelativeEndpoint(self.endpoint.clone()));
        }
        self.method.parse::<Method>()?;

        check_content_type(&self.request.content_type)?;
        if let Some(params) = &self.request.params {
            params.test()?;
            if let Some(rules) = &self.request.rules {
                check_references(params, rules)?;
            }
        }

        let response = self.response.as_ref().ok_or(ContractError::MissingResponse)?;
        check_content_type(&response.content_type)?;
        let data = response.data.as_ref().ok_or(ContractError::MissingResponseData)?;
        data.test()?;
        if let Some(rules) = &response.rules {
            check_references(data, rules)?;
        }
        Ok(())
    }

    /// Validates outgoing params: URL parameters are removed and dotted keys
    /// expanded into nested objects first.
    pub fn validate_request(&mut self, params: &Value) -> Result<()> {
        let url_params = self.url_params.clone();
        let Some(schema) = self.request.params.as_mut().filter(|p| p.has_children()) else {
            return Ok(());
        };
        let mut stripped = params.clone();
        if let Value::Object(map) = &mut stripped {
            for key in &url_params {
                map.shift_remove(key);
            }
        }
        let normalized = expand_dotted_keys(stripped);
        schema.validate(&normalized, &normalized, None)
    }

    /// Validates a received response. A 204 is accepted as is; otherwise the
    /// media type must match and JSON bodies are validated against the schema.
    pub fn validate_response(
        &mut self,
        status: u16,
        content_type: Option<&str>,
        body: &Value,
        request: Option<&Value>,
    ) -> Result<()> {
        if status == 204 {
            return Ok(());
        }
        let response = self.response.as_mut().ok_or(ContractError::MissingResponse)?;
        let actual = content_type.map(media_type).unwrap_or_default();
        if actual != response.content_type {
            return Err(ContractError::ContentTypeMismatch { expected: response.content_type.clone(), actual });
        }
        if actual == ContentType::Json.mime() {
            let data = response.data.as_mut().ok_or(ContractError::MissingResponseData)?;
            data.validate(body, body, request)?;
        }
        Ok(())
    }

    /// Substitutes URL parameters into the endpoint; returns the path and the
    /// params left over for the query or body.
    pub fn resolve_path(&self, params: &Value) -> (String, Value) {
        let mut path = self.endpoint.clone();
        let mut rest = params.clone();
        for key in &self.url_params {
            let value = rest.as_object_mut().and_then(|m| m.shift_remove(key)).unwrap_or(Value::Null);
            path = path.replacen(&format!("[{key}]"), &to_display(&value), 1);
        }
        (path, rest)
    }

    pub fn coverage_report(&self) -> CoverageReport {
        CoverageReport {
            name: self.name.clone(),
            request: self.request.params.as_ref().map(SchemaCoverage::of),
            response: self.response.as_ref().and_then(|r| r.data.as_ref()).map(SchemaCoverage::of),
        }
    }

    pub fn clear_coverage(&mut self) {
        if let Some(p) = self.request.params.as_mut() {
            p.clear_coverage();
        }
        if let Some(d) = self.response.as_mut().and_then(|r| r.data.as_mut()) {
            d.clear_coverage();
        }
    }
}

fn check_content_type(mime: &str) -> Result<()> {
    ContentType::from_mime(mime)
        .map(|_| ())
        .ok_or_else(|| ContractError::InvalidContentType(mime.to_string()))
}

fn check_references(params: &TopLevelParam, rules: &RuleMap) -> Result<()> {
    let keys = params.unresolved_keys(rules);
    if keys.is_empty() { Ok(()) } else { Err(ContractError::UndefinedParameters { keys }) }
}

/// `{"sort.column": "x"}` becomes `{"sort": {"column": "x"}}`, recursively.
/// Plain keys are kept first; dotted keys merge into an existing object.
pub fn expand_dotted_keys(params: Value) -> Value {
    let Value::Object(map) = params else {
        return params;
    };
    let (dotted, plain): (Vec<_>, Vec<_>) = map.into_iter().partition(|(k, _)| k.contains('.'));
    let mut out: Map<String, Value> = plain.into_iter().collect();
    for (key, value) in dotted {
        let Some((parent, child)) = key.split_once('.') else {
            continue;
        };
        match out.get_mut(parent) {
            Some(Value::Object(existing)) => {
                existing.insert(child.to_string(), value);
            }
            _ => {
                let mut nested = Map::new();
                nested.insert(child.to_string(), value);
                out.insert(parent.to_string(), Value::Object(nested));
            }
        }
    }
    for value in out.values_mut() {
        if value.is_object() {
            *value = expand_dotted_keys(value.take());
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn signin() -> ApiConfig {
        serde_json::from_value(json!({
            "endpoint": "/auth/signin",
            "method": "POST",
            "request": {
                "contentType": "application/x-www-form-urlencoded",
                "params": {"email": "string", "password": "string", "remember_me": "bit"},
                "rules": {"email": {"required": true}, "password": {"required": true}}
            },
            "response": {
                "contentType": "application/json",
                "data": {"code": "int", "message": "string"},
                "rules": {"code": {"required": true}, "message": {"required": true}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn signin_definition_passes_self_check() {
        let api = ApiDefinition::new(signin()).unwrap();
        assert_eq!(api.name(), "/auth/signin");
        assert!(api.test().is_ok());
    }

    #[test]
    fn self_check_failures() {
        let mut c = signin();
        c.endpoint = "auth".into();
        assert_eq!(ApiDefinition::new(c).unwrap().test(), Err(ContractError::RelativeEndpoint("auth".into())));

        let mut c = signin();
        c.endpoint = String::new();
        assert_eq!(ApiDefinition::new(c).unwrap().test(), Err(ContractError::MissingEndpoint));

        let mut c = signin();
        c.method = "PATCH".into();
        assert_eq!(ApiDefinition::new(c).unwrap().test(), Err(ContractError::InvalidMethod("PATCH".into())));

        let mut c = signin();
        c.method = String::new();
        assert_eq!(ApiDefinition::new(c).unwrap().test(), Err(ContractError::MissingMethod));

        let mut c = signin();
        c.request.content_type = Some("application/xml".into());
        assert_eq!(ApiDefinition::new(c).unwrap().test().unwrap_err().kind(), ErrorKind::Definition);

        let mut c = signin();
        c.response = None;
        assert_eq!(ApiDefinition::new(c).unwrap().test(), Err(ContractError::MissingResponse));

        let mut c = signin();
        if let Some(r) = c.response.as_mut() {
            r.data = None;
        }
        assert_eq!(ApiDefinition::new(c).unwrap().test(), Err(ContractError::MissingResponseData));
    }

    #[test]
    fn undefined_rule_references() {
        let mut c = signin();
        c.request.rules = serde_json::from_value(json!({"email": {"required": true}, "nickname": {"required": true}})).unwrap();
        assert_eq!(
            ApiDefinition::new(c).unwrap().test(),
            Err(ContractError::UndefinedParameters { keys: vec!["nickname".into()] })
        );
    }

    #[test]
    fn request_validation() {
        let mut api = ApiDefinition::new(signin()).unwrap();
        assert!(api.validate_request(&json!({"email": "a@b.io", "password": "x"})).is_ok());
        let err = api.validate_request(&json!({"email": "a@b.io"})).unwrap_err();
        assert_eq!(err.to_string(), "null: password is required.");
        assert!(matches!(
            api.validate_request(&json!({"email": "a", "password": "b", "other": 1})),
            Err(ContractError::UnknownKeys { .. })
        ));
    }

    #[test]
    fn response_validation() {
        let mut api = ApiDefinition::new(signin()).unwrap();
        let body = json!({"code": 200, "message": "ok"});
        assert!(api.validate_response(200, Some("application/json; charset=utf-8"), &body, None).is_ok());
        assert!(api.validate_response(204, None, &Value::Null, None).is_ok());
        assert_eq!(
            api.validate_response(200, Some("text/html"), &body, None),
            Err(ContractError::ContentTypeMismatch { expected: "application/json".into(), actual: "text/html".into() })
        );
        let err = api.validate_response(200, Some("Application/JSON"), &json!({"code": "200", "message": "ok"}), None);
        assert!(matches!(err, Err(ContractError::TypeMismatch { .. })));
    }

    #[test]
    fn url_params_and_paths() {
        let mut api = ApiDefinition::new(
            serde_json::from_value(json!({
                "endpoint": "/users/[id]/posts/[postId]",
                "method": "GET",
                "request": {"params": {"q": "string", "sort": {"column": "string"}}},
                "response": {"data": {"ok": "boolean"}}
            }))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(api.url_params(), ["id".to_string(), "postId".to_string()]);
        let params = json!({"id": 7, "postId": "p1", "q": "x", "sort.column": "date"});
        let (path, rest) = api.resolve_path(&params);
        assert_eq!(path, "/users/7/posts/p1");
        assert_eq!(rest, json!({"q": "x", "sort.column": "date"}));
        assert!(api.validate_request(&params).is_ok());
        let report = api.coverage_report();
        assert_eq!(report.request.map(|r| r.ratio), Some(1.0));
    }

    #[test]
    fn dotted_key_expansion() {
        assert_eq!(
            expand_dotted_keys(json!({"a": 1, "s.c": "x", "s.d.e": 2, "t": {"u.v": 3}})),
            json!({"a": 1, "t": {"u": {"v": 3}}, "s": {"c": "x", "d": {"e": 2}}})
        );
    }

    #[test]
    fn coverage_report_and_reset() {
        let mut api = ApiDefinition::new(signin()).unwrap();
        let body = json!({"code": 200, "message": "ok"});
        api.validate_response(200, Some("application/json"), &body, None).unwrap();
        let report = api.coverage_report();
        assert_eq!(report.response, Some(SchemaCoverage { ratio: 1.0, uncovered: vec![] }));
        assert_eq!(report.request.map(|r| r.uncovered.len()), Some(3));
        api.clear_coverage();
        assert_eq!(api.coverage_report().response.map(|r| r.ratio), Some(0.0));
    }

    #[test]
    fn status_helpers() {
        assert!(is_success(201));
        assert!(!is_success(302));
        assert!(is_client_error(404) && is_not_found(404));
        assert!(is_bad_request(400) && is_unauthorized(401) && is_forbidden(403));
        assert_eq!(media_type(" Text/CSV ; header=present"), "text/csv");
    }
}
