use bigdecimal::BigDecimal;
use chrono::{DateTime, SecondsFormat, Utc};

mod action;
/// Leaf operators and fact-value coercions.
pub mod operator;

pub use crate::rule::action::{Action, ActionCallback};

use crate::result::Outcome;
use crate::rule::operator::{OrderingOperator, SetOperator, StringOperator};

/// An immutable node of a predicate tree.
///
/// Combinators own their children; the tree is pure data and exposes no
/// behavior beyond its discriminator and child traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// N-ary conjunction.
    And(MultiaryRule),
    /// N-ary disjunction.
    Or(MultiaryRule),
    /// Negation.
    Not(UnaryRule),
    /// String comparison against a named fact.
    String(StringRule),
    /// Numeric comparison against a named fact.
    Number(NumberRule),
    /// Instant comparison against a named fact.
    Date(DateRule),
    /// Set comparison against a named fact.
    Set(SetRule),
    /// Tests that a named fact resolves to a present value.
    Exists(PresenceRule),
    /// Tests that a named fact resolves to null.
    Null(PresenceRule),
    /// Carries a fixed outcome; used for placeholders and testing.
    Constant(ConstantRule),
}

/// The attributes every rule node carries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attrs {
    /// Human-readable description, carried into the result mirror.
    pub description: Option<String>,
    /// Marks the node IGNORED: combinators treat it as their identity.
    pub ignore: bool,
    /// Post-evaluation callback.
    pub action: Option<Action>,
}

/// An AND / OR node holding an ordered sequence of children.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiaryRule {
    /// Common node attributes.
    pub attrs: Attrs,
    /// The child rules, in declared order.
    pub rules: Vec<Rule>,
}

/// A NOT node holding a single child.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryRule {
    /// Common node attributes.
    pub attrs: Attrs,
    /// The negated child rule.
    pub rule: Box<Rule>,
}

/// A STRING leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct StringRule {
    /// Common node attributes.
    pub attrs: Attrs,
    /// The fact key to compare against.
    pub key: String,
    /// The comparison to apply.
    pub operator: StringOperator,
    /// The expected string (or pattern, for REGEX).
    pub expected: String,
}

/// A NUMBER leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberRule {
    /// Common node attributes.
    pub attrs: Attrs,
    /// The fact key to compare against.
    pub key: String,
    /// The comparison to apply.
    pub operator: OrderingOperator,
    /// The expected number, in the decimal domain.
    pub expected: BigDecimal,
}

/// A DATE leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRule {
    /// Common node attributes.
    pub attrs: Attrs,
    /// The fact key to compare against.
    pub key: String,
    /// The comparison to apply.
    pub operator: OrderingOperator,
    /// The expected instant.
    pub expected: DateTime<Utc>,
}

/// A SET leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRule {
    /// Common node attributes.
    pub attrs: Attrs,
    /// The fact key to compare against.
    pub key: String,
    /// The comparison to apply.
    pub operator: SetOperator,
    /// The expected values, with set semantics.
    pub expected: Vec<json::Value>,
}

/// An EXISTS / NULL leaf, testing only the fact's presence.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceRule {
    /// Common node attributes.
    pub attrs: Attrs,
    /// The fact key to test.
    pub key: String,
}

/// A CONSTANT leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRule {
    /// Common node attributes.
    pub attrs: Attrs,
    /// The outcome the leaf evaluates to.
    pub result: Outcome,
}

impl Rule {
    /// The node's `type` discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            Rule::And(_) => "AND",
            Rule::Or(_) => "OR",
            Rule::Not(_) => "NOT",
            Rule::String(_) => "STRING",
            Rule::Number(_) => "NUMBER",
            Rule::Date(_) => "DATE",
            Rule::Set(_) => "SET",
            Rule::Exists(_) => "EXISTS",
            Rule::Null(_) => "NULL",
            Rule::Constant(_) => "CONSTANT",
        }
    }

    /// The node's common attributes.
    pub fn attrs(&self) -> &Attrs {
        match self {
            Rule::And(node) | Rule::Or(node) => &node.attrs,
            Rule::Not(node) => &node.attrs,
            Rule::String(node) => &node.attrs,
            Rule::Number(node) => &node.attrs,
            Rule::Date(node) => &node.attrs,
            Rule::Set(node) => &node.attrs,
            Rule::Exists(node) | Rule::Null(node) => &node.attrs,
            Rule::Constant(node) => &node.attrs,
        }
    }

    fn attrs_mut(&mut self) -> &mut Attrs {
        match self {
            Rule::And(node) | Rule::Or(node) => &mut node.attrs,
            Rule::Not(node) => &mut node.attrs,
            Rule::String(node) => &mut node.attrs,
            Rule::Number(node) => &mut node.attrs,
            Rule::Date(node) => &mut node.attrs,
            Rule::Set(node) => &mut node.attrs,
            Rule::Exists(node) | Rule::Null(node) => &mut node.attrs,
            Rule::Constant(node) => &mut node.attrs,
        }
    }

    /// The node's children (empty for leaves).
    pub fn children(&self) -> &[Rule] {
        match self {
            Rule::And(node) | Rule::Or(node) => &node.rules,
            Rule::Not(node) => std::slice::from_ref(node.rule.as_ref()),
            _ => &[],
        }
    }

    /// The fact key a leaf compares against (`None` for combinators and
    /// CONSTANT).
    pub fn key(&self) -> Option<&str> {
        match self {
            Rule::String(node) => Some(&node.key),
            Rule::Number(node) => Some(&node.key),
            Rule::Date(node) => Some(&node.key),
            Rule::Set(node) => Some(&node.key),
            Rule::Exists(node) | Rule::Null(node) => Some(&node.key),
            _ => None,
        }
    }

    /// Builds an AND node.
    pub fn and(rules: Vec<Rule>) -> Rule {
        Rule::And(MultiaryRule {
            attrs: Attrs::default(),
            rules,
        })
    }

    /// Builds an OR node.
    pub fn or(rules: Vec<Rule>) -> Rule {
        Rule::Or(MultiaryRule {
            attrs: Attrs::default(),
            rules,
        })
    }

    /// Builds a NOT node.
    pub fn not(rule: Rule) -> Rule {
        Rule::Not(UnaryRule {
            attrs: Attrs::default(),
            rule: Box::new(rule),
        })
    }

    /// Builds a STRING leaf.
    pub fn string(
        key: impl Into<String>,
        operator: StringOperator,
        expected: impl Into<String>,
    ) -> Rule {
        Rule::String(StringRule {
            attrs: Attrs::default(),
            key: key.into(),
            operator,
            expected: expected.into(),
        })
    }

    /// Builds a NUMBER leaf.
    pub fn number(key: impl Into<String>, operator: OrderingOperator, expected: BigDecimal) -> Rule {
        Rule::Number(NumberRule {
            attrs: Attrs::default(),
            key: key.into(),
            operator,
            expected,
        })
    }

    /// Builds a DATE leaf.
    pub fn date(
        key: impl Into<String>,
        operator: OrderingOperator,
        expected: DateTime<Utc>,
    ) -> Rule {
        Rule::Date(DateRule {
            attrs: Attrs::default(),
            key: key.into(),
            operator,
            expected,
        })
    }

    /// Builds a SET leaf.
    pub fn set(key: impl Into<String>, operator: SetOperator, expected: Vec<json::Value>) -> Rule {
        Rule::Set(SetRule {
            attrs: Attrs::default(),
            key: key.into(),
            operator,
            expected,
        })
    }

    /// Builds an EXISTS leaf.
    pub fn exists(key: impl Into<String>) -> Rule {
        Rule::Exists(PresenceRule {
            attrs: Attrs::default(),
            key: key.into(),
        })
    }

    /// Builds a NULL leaf.
    pub fn null(key: impl Into<String>) -> Rule {
        Rule::Null(PresenceRule {
            attrs: Attrs::default(),
            key: key.into(),
        })
    }

    /// Builds a CONSTANT leaf.
    pub fn constant(result: Outcome) -> Rule {
        Rule::Constant(ConstantRule {
            attrs: Attrs::default(),
            result,
        })
    }

    /// Sets the node's description, builder-style.
    pub fn with_description(mut self, description: impl Into<String>) -> Rule {
        self.attrs_mut().description = Some(description.into());
        self
    }

    /// Marks the node IGNORED, builder-style.
    pub fn ignore(mut self) -> Rule {
        self.attrs_mut().ignore = true;
        self
    }

    /// Attaches a post-evaluation action, builder-style.
    pub fn with_action(mut self, action: Action) -> Rule {
        self.attrs_mut().action = Some(action);
        self
    }
}

impl NumberRule {
    /// The expected value as it appears on the wire.
    pub(crate) fn expected_json(&self) -> json::Value {
        let text = self.expected.to_string();
        json::from_str::<json::Number>(&text)
            .map(json::Value::Number)
            .unwrap_or(json::Value::String(text))
    }
}

impl StringRule {
    /// The expected value as it appears on the wire.
    pub(crate) fn expected_json(&self) -> json::Value {
        json::Value::String(self.expected.clone())
    }
}

impl DateRule {
    /// The expected value as it appears on the wire.
    pub(crate) fn expected_json(&self) -> json::Value {
        json::Value::String(self.expected.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl SetRule {
    /// The expected value as it appears on the wire.
    pub(crate) fn expected_json(&self) -> json::Value {
        json::Value::Array(self.expected.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural_and_skips_callbacks() {
        let noisy = Rule::exists("k").with_action(Action::new("notify", |_, _, _| Ok(())));
        let quiet = Rule::exists("k").with_action(Action::new("notify", |_, _, _| {
            Err("different callback".into())
        }));
        assert_eq!(noisy, quiet);

        let renamed = Rule::exists("k").with_action(Action::new("page", |_, _, _| Ok(())));
        assert_ne!(noisy, renamed);
    }

    #[test]
    fn children_traversal_covers_combinators() {
        let tree = Rule::and(vec![Rule::exists("a"), Rule::null("b")]);
        assert_eq!(tree.children().len(), 2);
        assert!(tree.key().is_none());

        let negated = Rule::not(Rule::exists("a"));
        assert_eq!(negated.children().len(), 1);
        assert_eq!(negated.children()[0].key(), Some("a"));
        assert!(Rule::constant(Outcome::Valid).children().is_empty());
    }
}
