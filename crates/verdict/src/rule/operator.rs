use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an operator could not be applied to a concrete fact value.
///
/// Surfaces on the result node as OPERATION_NOT_SUPPORTED, never as an
/// `Err` out of the evaluator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct Unsupported(pub String);

/// The operators a STRING leaf accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StringOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

impl StringOperator {
    /// The wire spelling of the operator.
    pub fn name(self) -> &'static str {
        match self {
            StringOperator::Equals => "EQUALS",
            StringOperator::NotEquals => "NOT_EQUALS",
            StringOperator::Contains => "CONTAINS",
            StringOperator::StartsWith => "STARTS_WITH",
            StringOperator::EndsWith => "ENDS_WITH",
            StringOperator::Regex => "REGEX",
        }
    }

    /// Parses the wire spelling of the operator.
    pub fn from_name(name: &str) -> Option<StringOperator> {
        Some(match name {
            "EQUALS" => StringOperator::Equals,
            "NOT_EQUALS" => StringOperator::NotEquals,
            "CONTAINS" => StringOperator::Contains,
            "STARTS_WITH" => StringOperator::StartsWith,
            "ENDS_WITH" => StringOperator::EndsWith,
            "REGEX" => StringOperator::Regex,
            _ => return None,
        })
    }

    /// Applies the operator to an actual string. Comparisons are
    /// case-sensitive; REGEX uses full-match semantics.
    pub fn apply(self, actual: &str, expected: &str) -> Result<bool, Unsupported> {
        Ok(match self {
            StringOperator::Equals => actual == expected,
            StringOperator::NotEquals => actual != expected,
            StringOperator::Contains => actual.contains(expected),
            StringOperator::StartsWith => actual.starts_with(expected),
            StringOperator::EndsWith => actual.ends_with(expected),
            StringOperator::Regex => {
                let pattern = regex::Regex::new(&format!(r"\A(?:{expected})\z"))
                    .map_err(|err| Unsupported(format!("invalid regex: {err}")))?;
                pattern.is_match(actual)
            }
        })
    }
}

/// The ordering operators NUMBER and DATE leaves accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderingOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

impl OrderingOperator {
    /// The wire spelling of the operator.
    pub fn name(self) -> &'static str {
        match self {
            OrderingOperator::Equals => "EQUALS",
            OrderingOperator::NotEquals => "NOT_EQUALS",
            OrderingOperator::GreaterThan => "GREATER_THAN",
            OrderingOperator::GreaterThanEqual => "GREATER_THAN_EQUAL",
            OrderingOperator::LessThan => "LESS_THAN",
            OrderingOperator::LessThanEqual => "LESS_THAN_EQUAL",
        }
    }

    /// Parses the wire spelling of the operator.
    pub fn from_name(name: &str) -> Option<OrderingOperator> {
        Some(match name {
            "EQUALS" => OrderingOperator::Equals,
            "NOT_EQUALS" => OrderingOperator::NotEquals,
            "GREATER_THAN" => OrderingOperator::GreaterThan,
            "GREATER_THAN_EQUAL" => OrderingOperator::GreaterThanEqual,
            "LESS_THAN" => OrderingOperator::LessThan,
            "LESS_THAN_EQUAL" => OrderingOperator::LessThanEqual,
            _ => return None,
        })
    }

    /// Applies the operator to an ordered pair.
    pub fn compare<T: PartialOrd>(self, actual: &T, expected: &T) -> bool {
        match self {
            OrderingOperator::Equals => actual == expected,
            OrderingOperator::NotEquals => actual != expected,
            OrderingOperator::GreaterThan => actual > expected,
            OrderingOperator::GreaterThanEqual => actual >= expected,
            OrderingOperator::LessThan => actual < expected,
            OrderingOperator::LessThanEqual => actual <= expected,
        }
    }
}

/// The operators a SET leaf accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetOperator {
    Contains,
    Intersects,
    IsSubsetOf,
    IsSupersetOf,
    Equals,
}

impl SetOperator {
    /// The wire spelling of the operator.
    pub fn name(self) -> &'static str {
        match self {
            SetOperator::Contains => "CONTAINS",
            SetOperator::Intersects => "INTERSECTS",
            SetOperator::IsSubsetOf => "IS_SUBSET_OF",
            SetOperator::IsSupersetOf => "IS_SUPERSET_OF",
            SetOperator::Equals => "EQUALS",
        }
    }

    /// Parses the wire spelling of the operator.
    pub fn from_name(name: &str) -> Option<SetOperator> {
        Some(match name {
            "CONTAINS" => SetOperator::Contains,
            "INTERSECTS" => SetOperator::Intersects,
            "IS_SUBSET_OF" => SetOperator::IsSubsetOf,
            "IS_SUPERSET_OF" => SetOperator::IsSupersetOf,
            "EQUALS" => SetOperator::Equals,
            _ => return None,
        })
    }

    /// Applies the operator to two finite collections with set semantics
    /// (duplicates and ordering carry no meaning).
    pub fn apply(self, actual: &[json::Value], expected: &[json::Value]) -> bool {
        let covers =
            |outer: &[json::Value], inner: &[json::Value]| inner.iter().all(|v| outer.contains(v));
        match self {
            SetOperator::Contains | SetOperator::IsSupersetOf => covers(actual, expected),
            SetOperator::Intersects => expected.iter().any(|v| actual.contains(v)),
            SetOperator::IsSubsetOf => covers(expected, actual),
            SetOperator::Equals => covers(actual, expected) && covers(expected, actual),
        }
    }
}

/// Coerces a fact value into the STRING domain.
pub(crate) fn coerce_string(value: &json::Value) -> Result<&str, Unsupported> {
    value
        .as_str()
        .ok_or_else(|| Unsupported(format!("expected a string value, found {value}")))
}

/// Coerces a fact value into the NUMBER domain.
///
/// JSON numbers and decimal strings are accepted; everything compares as
/// `BigDecimal` so float drift never decides an outcome.
pub(crate) fn coerce_number(value: &json::Value) -> Result<BigDecimal, Unsupported> {
    match value {
        json::Value::Number(number) => parse_decimal(&number.to_string()),
        json::Value::String(text) => parse_decimal(text),
        other => Err(Unsupported(format!(
            "expected a numeric value, found {other}"
        ))),
    }
}

/// Coerces a fact value into the DATE domain.
pub(crate) fn coerce_date(value: &json::Value) -> Result<DateTime<Utc>, Unsupported> {
    match value {
        json::Value::String(text) => parse_instant(text),
        other => Err(Unsupported(format!(
            "expected an ISO-8601 string, found {other}"
        ))),
    }
}

/// Coerces a fact value into the SET domain.
pub(crate) fn coerce_set(value: &json::Value) -> Result<&[json::Value], Unsupported> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| Unsupported(format!("expected an array value, found {value}")))
}

/// Parses a decimal number out of its textual form.
pub(crate) fn parse_decimal(text: &str) -> Result<BigDecimal, Unsupported> {
    text.trim()
        .parse::<BigDecimal>()
        .map_err(|err| Unsupported(format!("'{text}' is not a decimal number: {err}")))
}

/// Parses an ISO-8601 instant, or a plain date taken as midnight UTC.
///
/// Instants compare as instants; the raw strings are never compared.
pub(crate) fn parse_instant(text: &str) -> Result<DateTime<Utc>, Unsupported> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(Unsupported(format!(
        "'{text}' is not an ISO-8601 instant or date"
    )))
}
