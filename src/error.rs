use thiserror::Error;

use crate::rules::ParamKind;

/// Failures raised by definition self-checks and by payload validation.
///
/// Every operation fails fast: the first problem found is returned and the
/// caller surfaces it as a test failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    /// A rule name not present in the catalog.
    #[error("unknown rule: {name}")]
    UnknownRule { name: String },

    /// A literal rule parameter of the wrong kind.
    #[error("rules.{name} must be function or {expected}")]
    RuleShape { name: String, expected: ParamKind },

    /// A leaf declares a tag outside the primitive registry.
    #[error("invalid datatype: {path}: {tag}")]
    InvalidDataType { path: String, tag: String },

    /// A runtime value does not match the declared type or array-ness.
    #[error("{value}: {path} must be {expected}")]
    TypeMismatch { path: String, expected: String, value: String },

    /// An object payload carries properties the schema does not declare.
    #[error("unknown keys: {}", quote_keys(.keys))]
    UnknownKeys { path: String, keys: Vec<String> },

    /// A value fails an attached rule.
    #[error("{value}: {message}")]
    RuleValidation { path: String, rule: String, value: String, message: String },

    #[error("endpoint is not defined")]
    MissingEndpoint,

    #[error("endpoint must start with '/': {0}")]
    RelativeEndpoint(String),

    #[error("method is not defined")]
    MissingMethod,

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("response is not defined")]
    MissingResponse,

    #[error("response data is not defined")]
    MissingResponseData,

    /// Rule-map keys that resolve to no schema node.
    #[error("undefined parameters: {}", quote_keys(.keys))]
    UndefinedParameters { keys: Vec<String> },

    #[error("content type does not match: expected {expected}, got {actual}")]
    ContentTypeMismatch { expected: String, actual: String },
}

/// Stable discriminant for matching errors without their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownRule,
    RuleShape,
    InvalidDataType,
    TypeMismatch,
    UnknownKeys,
    RuleValidation,
    Definition,
    UndefinedParameters,
    ContentTypeMismatch,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownRule => "UnknownRule",
            ErrorKind::RuleShape => "RuleShape",
            ErrorKind::InvalidDataType => "InvalidDataType",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::UnknownKeys => "UnknownKeys",
            ErrorKind::RuleValidation => "RuleValidation",
            ErrorKind::Definition => "Definition",
            ErrorKind::UndefinedParameters => "UndefinedParameters",
            ErrorKind::ContentTypeMismatch => "ContentTypeMismatch",
        }
    }
}

impl ContractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::UnknownRule { .. } => ErrorKind::UnknownRule,
            ContractError::RuleShape { .. } => ErrorKind::RuleShape,
            ContractError::InvalidDataType { .. } => ErrorKind::InvalidDataType,
            ContractError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            ContractError::UnknownKeys { .. } => ErrorKind::UnknownKeys,
            ContractError::RuleValidation { .. } => ErrorKind::RuleValidation,
            ContractError::UndefinedParameters { .. } => ErrorKind::UndefinedParameters,
            ContractError::ContentTypeMismatch { .. } => ErrorKind::ContentTypeMismatch,
            ContractError::MissingEndpoint
            | ContractError::RelativeEndpoint(_)
            | ContractError::MissingMethod
            | ContractError::InvalidMethod(_)
            | ContractError::InvalidContentType(_)
            | ContractError::MissingResponse
            | ContractError::MissingResponseData => ErrorKind::Definition,
        }
    }

    /// Full path of the offending schema node, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            ContractError::InvalidDataType { path, .. }
            | ContractError::TypeMismatch { path, .. }
            | ContractError::UnknownKeys { path, .. }
            | ContractError::RuleValidation { path, .. } => Some(path),
            _ => None,
        }
    }
}

fn quote_keys(keys: &[String]) -> String {
    serde_json::to_string(keys).unwrap_or_else(|_| format!("{keys:?}"))
}

pub type Result<T, E = ContractError> = std::result::Result<T, E>;
