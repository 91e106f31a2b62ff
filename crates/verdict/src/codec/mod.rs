use std::collections::HashMap;
use std::sync::Arc;

mod rule;
mod result;

use crate::error::DecodeError;
use crate::result::RuleResult;
use crate::rule::{Attrs, Rule};

/// A rule decoder registered for one `type` discriminator.
pub type DecodeFn =
    Arc<dyn Fn(&Codec, &json::Map<String, json::Value>) -> Result<Rule, DecodeError> + Send + Sync>;

/// The polymorphic rule / result codec.
///
/// Rule decoding dispatches on the `type` discriminator through an explicit
/// registry (no process-wide state); result decoding is structural. A codec
/// is an immutable value built once and passed around freely.
#[derive(Clone)]
pub struct Codec {
    decoders: HashMap<String, DecodeFn>,
}

impl Codec {
    /// A codec with the built-in rule types registered.
    pub fn new() -> Codec {
        Codec::builder().build()
    }

    /// A builder preloaded with the built-in rule types, ready for custom
    /// registrations.
    pub fn builder() -> CodecBuilder {
        rule::register_builtins(CodecBuilder {
            decoders: HashMap::new(),
        })
    }

    /// Decodes a rule tree from a JSON value.
    pub fn decode_rule(&self, value: &json::Value) -> Result<Rule, DecodeError> {
        let obj = value.as_object().ok_or_else(|| DecodeError::TypeMismatch {
            rule_type: "rule".to_owned(),
            field: "type",
            detail: format!("expected a JSON object, found {value}"),
        })?;
        let rule_type = require_str(obj, "type", "rule")?;
        let decoder = self
            .decoders
            .get(rule_type)
            .ok_or_else(|| DecodeError::UnknownRuleType {
                rule_type: rule_type.to_owned(),
            })?;
        decoder(self, obj)
    }

    /// Decodes a rule tree from JSON text.
    pub fn decode_rule_str(&self, text: &str) -> Result<Rule, DecodeError> {
        let value = json::from_str(text)?;
        self.decode_rule(&value)
    }

    /// Encodes a rule tree to a JSON value. Absent fields are omitted;
    /// actions are runtime-only and never serialized.
    pub fn encode_rule(&self, rule: &Rule) -> json::Value {
        rule::encode(self, rule)
    }

    /// Decodes a result tree from a JSON value, discriminating structurally:
    /// `rules` means multiary, `rule` unary, `key` values, otherwise base.
    pub fn decode_result(&self, value: &json::Value) -> Result<RuleResult, DecodeError> {
        result::decode(self, value)
    }

    /// Decodes a result tree from JSON text.
    pub fn decode_result_str(&self, text: &str) -> Result<RuleResult, DecodeError> {
        let value = json::from_str(text)?;
        self.decode_result(&value)
    }

    /// Encodes a result tree to a JSON value. Null-valued fields are omitted.
    pub fn encode_result(&self, result: &RuleResult) -> json::Value {
        result::encode(self, result)
    }
}

impl Default for Codec {
    fn default() -> Codec {
        Codec::new()
    }
}

/// The builder for [`Codec`] values.
pub struct CodecBuilder {
    decoders: HashMap<String, DecodeFn>,
}

impl CodecBuilder {
    /// Registers a decoder for a `type` discriminator, replacing any
    /// previous registration for the same discriminator.
    pub fn register<F>(mut self, rule_type: impl Into<String>, decoder: F) -> CodecBuilder
    where
        F: Fn(&Codec, &json::Map<String, json::Value>) -> Result<Rule, DecodeError>
            + Send
            + Sync
            + 'static,
    {
        self.decoders.insert(rule_type.into(), Arc::new(decoder));
        self
    }

    /// Finalizes the codec.
    pub fn build(self) -> Codec {
        Codec {
            decoders: self.decoders,
        }
    }
}

pub(crate) fn require_str<'a>(
    obj: &'a json::Map<String, json::Value>,
    field: &'static str,
    rule_type: &str,
) -> Result<&'a str, DecodeError> {
    match obj.get(field) {
        Some(json::Value::String(text)) => Ok(text),
        Some(other) => Err(DecodeError::TypeMismatch {
            rule_type: rule_type.to_owned(),
            field,
            detail: format!("expected a string, found {other}"),
        }),
        None => Err(DecodeError::MissingField {
            rule_type: rule_type.to_owned(),
            field,
        }),
    }
}

pub(crate) fn decode_attrs(obj: &json::Map<String, json::Value>) -> Attrs {
    Attrs {
        description: obj
            .get("description")
            .and_then(json::Value::as_str)
            .map(str::to_owned),
        ignore: obj
            .get("ignore")
            .and_then(json::Value::as_bool)
            .unwrap_or(false),
        action: None,
    }
}
