//! Declarative JSON contracts for HTTP APIs.
//!
//! A schema literal (`{"id": "int, required", "tags": ["string"]}`) becomes a
//! tree of [`Param`]s; rules attach either inline through the shorthand or
//! out-of-band through a [`RuleMap`] resolved by a [`ParamPool`]. Payloads are
//! validated strictly and every run records which schema nodes it exercised.
pub mod api;
pub mod cli;
pub mod coverage;
pub mod datatype;
pub mod error;
pub mod param;
pub mod path_de;
pub mod pool;
pub mod rules;
pub mod shorthand;
pub mod toplevel;
pub mod value;

pub use api::{ApiConfig, ApiDefinition, ContentType, CoverageReport, Method, SchemaCoverage};
pub use coverage::Coverage;
pub use datatype::DataType;
pub use error::{ContractError, ErrorKind, Result};
pub use param::{NodeId, Param, RuleConfig, Shape};
pub use pool::ParamPool;
pub use rules::{ParamKind, Rule, RuleKind, RuleParam};
pub use toplevel::{RuleMap, TopLevelParam};
