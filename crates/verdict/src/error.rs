use thiserror::Error;

use verdict_cache::error::Error as CacheError;

/// A type-erased error, as returned by data fetchers and action callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The Error type for rule and result decoding.
///
/// Decode errors are the only caller-visible errors of the engine; anything
/// that goes wrong during an evaluation is recorded as an outcome on the
/// affected result node instead.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// JSON (de)serialization error (invalid JSON parsed, etc...).
    #[error("JSON error: {0}")]
    JSONError(#[from] json::Error),
    /// The `type` discriminator is not registered with the codec.
    #[error("unknown rule type '{rule_type}'")]
    UnknownRuleType {
        /// The unrecognized discriminator.
        rule_type: String,
    },
    /// A required field is absent.
    #[error("rule type '{rule_type}' requires field '{field}'")]
    MissingField {
        /// The discriminator of the node being decoded.
        rule_type: String,
        /// The absent field.
        field: &'static str,
    },
    /// A field holds a value outside the domain the rule variant accepts.
    #[error("field '{field}' of rule type '{rule_type}': {detail}")]
    TypeMismatch {
        /// The discriminator of the node being decoded.
        rule_type: String,
        /// The offending field.
        field: &'static str,
        /// What the variant would have accepted.
        detail: String,
    },
    /// The operator name is not valid for the rule variant.
    #[error("operator '{operator}' is not supported by rule type '{rule_type}'")]
    UnknownOperator {
        /// The discriminator of the node being decoded.
        rule_type: String,
        /// The unrecognized operator name.
        operator: String,
    },
    /// The outcome name on a result node is not recognized.
    #[error("unrecognized outcome '{0}'")]
    UnknownOutcome(String),
}

/// The error a fact fetch resolved with.
///
/// Fetch errors travel through shared cache futures and into result nodes,
/// so the type is `Clone` and carries the rendered source error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    /// Constructs an instance from a single message.
    pub fn msg(message: impl Into<String>) -> FetchError {
        FetchError {
            message: message.into(),
        }
    }

    /// The rendered error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CacheError> for FetchError {
    fn from(err: CacheError) -> FetchError {
        FetchError {
            message: err.to_string(),
        }
    }
}
