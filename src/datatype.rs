//! Primitive type tags a schema leaf may declare.
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Any,
    String,
    Int,
    Long,
    Double,
    Number,
    Boolean,
    Date,
    DateTime,
    Bit,
}

impl DataType {
    pub const ALL: [DataType; 10] = [
        DataType::Any,
        DataType::String,
        DataType::Int,
        DataType::Long,
        DataType::Double,
        DataType::Number,
        DataType::Boolean,
        DataType::Date,
        DataType::DateTime,
        DataType::Bit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Any => "any",
            DataType::String => "string",
            DataType::Int => "int",
            DataType::Long => "long",
            DataType::Double => "double",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::Bit => "bit",
        }
    }

    /// Exact, case-sensitive tag lookup.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == tag)
    }

    pub fn is_valid(tag: &str) -> bool {
        Self::parse(tag).is_some()
    }

    /// Format used by `date`/`datetime` leaves when no `format` rule is staged.
    pub fn default_format(&self) -> Option<&'static str> {
        match self {
            DataType::Date => Some("YYYY-MM-DD"),
            DataType::DateTime => Some("YYYY-MM-DD HH:mm:SS"),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown datatype `{0}`")]
pub struct UnknownDataType(pub String);

impl FromStr for DataType {
    type Err = UnknownDataType;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownDataType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_round_trips() {
        for t in DataType::ALL {
            assert_eq!(DataType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn composite_and_unknown_tags_are_not_primitives() {
        assert!(!DataType::is_valid("object"));
        assert!(!DataType::is_valid("array"));
        assert!(!DataType::is_valid("String"));
        let err = "integer".parse::<DataType>().unwrap_err();
        assert_eq!(err, UnknownDataType("integer".into()));
        assert_eq!(err.to_string(), "unknown datatype `integer`");
    }

    #[test]
    fn only_temporal_types_have_default_formats() {
        assert_eq!(DataType::Date.default_format(), Some("YYYY-MM-DD"));
        assert_eq!(DataType::DateTime.default_format(), Some("YYYY-MM-DD HH:mm:SS"));
        assert_eq!(DataType::Int.default_format(), None);
    }
}
