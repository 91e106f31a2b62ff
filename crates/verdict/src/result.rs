use serde::{Deserialize, Serialize};

use crate::rule::Rule;

/// The outcome of evaluating a rule node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The predicate is satisfied.
    Valid,
    /// The predicate is not satisfied.
    Invalid,
    /// Indeterminate: the initial state, and the outcome a short-circuited
    /// child is left with.
    Maybe,
    /// The rule carries the `ignore` flag; neutral element for combinators.
    Ignored,
    /// The operator cannot be applied to the fact's concrete value.
    OperationNotSupported,
    /// The fact fetch failed.
    Failed,
}

impl Outcome {
    /// The wire spelling of the outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Valid => "VALID",
            Outcome::Invalid => "INVALID",
            Outcome::Maybe => "MAYBE",
            Outcome::Ignored => "IGNORED",
            Outcome::OperationNotSupported => "OPERATION_NOT_SUPPORTED",
            Outcome::Failed => "FAILED",
        }
    }

    /// Parses the wire spelling of an outcome.
    pub fn from_name(name: &str) -> Option<Outcome> {
        Some(match name {
            "VALID" => Outcome::Valid,
            "INVALID" => Outcome::Invalid,
            "MAYBE" => Outcome::Maybe,
            "IGNORED" => Outcome::Ignored,
            "OPERATION_NOT_SUPPORTED" => Outcome::OperationNotSupported,
            "FAILED" => Outcome::Failed,
            _ => return None,
        })
    }

    /// Maps a predicate check onto VALID / INVALID.
    pub fn from_bool(holds: bool) -> Outcome {
        if holds {
            Outcome::Valid
        } else {
            Outcome::Invalid
        }
    }

    /// Three-valued conjunction.
    ///
    /// IGNORED is the identity; INVALID absorbs; FAILED and
    /// OPERATION_NOT_SUPPORTED propagate unless an INVALID overrides them.
    /// Commutative and associative, so children may fold in completion order.
    pub fn and(self, other: Outcome) -> Outcome {
        use Outcome::*;
        match (self, other) {
            (Ignored, x) | (x, Ignored) => x,
            (Invalid, _) | (_, Invalid) => Invalid,
            (Failed, _) | (_, Failed) => Failed,
            (OperationNotSupported, _) | (_, OperationNotSupported) => OperationNotSupported,
            (Maybe, _) | (_, Maybe) => Maybe,
            (Valid, Valid) => Valid,
        }
    }

    /// Three-valued disjunction.
    ///
    /// IGNORED is the identity; VALID absorbs; FAILED and
    /// OPERATION_NOT_SUPPORTED propagate unless a VALID overrides them.
    pub fn or(self, other: Outcome) -> Outcome {
        use Outcome::*;
        match (self, other) {
            (Ignored, x) | (x, Ignored) => x,
            (Valid, _) | (_, Valid) => Valid,
            (Failed, _) | (_, Failed) => Failed,
            (OperationNotSupported, _) | (_, OperationNotSupported) => OperationNotSupported,
            (Maybe, _) | (_, Maybe) => Maybe,
            (Invalid, Invalid) => Invalid,
        }
    }

    /// Negation: swaps VALID and INVALID, leaves everything else untouched.
    pub fn negate(self) -> Outcome {
        match self {
            Outcome::Valid => Outcome::Invalid,
            Outcome::Invalid => Outcome::Valid,
            other => other,
        }
    }
}

/// The fields every result node carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// The node's outcome.
    pub outcome: Outcome,
    /// The discriminator of the rule the node mirrors.
    pub rule_type: String,
    /// The rule's description, if any.
    pub description: Option<String>,
    /// Populated on failures and unsupported operations.
    pub message: Option<String>,
    /// Whether the rule carried the `ignore` flag.
    pub ignored: bool,
}

impl Verdict {
    pub(crate) fn of(rule: &Rule, outcome: Outcome) -> Verdict {
        Verdict {
            outcome,
            rule_type: rule.type_name().to_owned(),
            description: rule.attrs().description.clone(),
            message: None,
            ignored: rule.attrs().ignore,
        }
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Verdict {
        self.message = Some(message.into());
        self
    }
}

/// A node of the result tree mirroring an evaluated rule tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleResult {
    /// Mirror of an AND / OR node.
    Multiary(MultiaryRuleResult),
    /// Mirror of a NOT node.
    Unary(UnaryRuleResult),
    /// Mirror of a STRING / NUMBER / DATE / SET leaf.
    Values(ValuesRuleResult),
    /// Mirror of a CONSTANT / EXISTS / NULL leaf.
    Base(BaseRuleResult),
}

/// The result mirror of a multi-ary boolean combinator.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiaryRuleResult {
    /// The node's common result fields.
    pub verdict: Verdict,
    /// The child results, in declared child order.
    pub rules: Vec<RuleResult>,
}

/// The result mirror of a unary boolean combinator.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryRuleResult {
    /// The node's common result fields.
    pub verdict: Verdict,
    /// The child result; absent when the node was never evaluated.
    pub rule: Option<Box<RuleResult>>,
}

/// The result mirror of a leaf predicate over a fact value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesRuleResult {
    /// The node's common result fields.
    pub verdict: Verdict,
    /// The fact key the leaf compared against.
    pub key: String,
    /// The wire spelling of the leaf's operator.
    pub operator: String,
    /// The expected value the leaf carried.
    pub expected_value: json::Value,
    /// The fact value the leaf observed; absent until the fetch resolves.
    pub actual_value: Option<json::Value>,
}

/// The result mirror of a leaf without compared values.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRuleResult {
    /// The node's common result fields.
    pub verdict: Verdict,
}

impl RuleResult {
    /// The node's outcome.
    pub fn outcome(&self) -> Outcome {
        self.verdict().outcome
    }

    /// The node's common result fields.
    pub fn verdict(&self) -> &Verdict {
        match self {
            RuleResult::Multiary(node) => &node.verdict,
            RuleResult::Unary(node) => &node.verdict,
            RuleResult::Values(node) => &node.verdict,
            RuleResult::Base(node) => &node.verdict,
        }
    }

    /// The mirror of a rule node that was short-circuited away before its
    /// own evaluation produced anything.
    pub fn pending(rule: &Rule) -> RuleResult {
        RuleResult::unevaluated(rule, Outcome::Maybe)
    }

    /// The mirror of a rule node carrying the `ignore` flag.
    pub fn ignored(rule: &Rule) -> RuleResult {
        RuleResult::unevaluated(rule, Outcome::Ignored)
    }

    fn unevaluated(rule: &Rule, outcome: Outcome) -> RuleResult {
        let verdict = Verdict::of(rule, outcome);
        match rule {
            Rule::And(_) | Rule::Or(_) => RuleResult::Multiary(MultiaryRuleResult {
                verdict,
                rules: Vec::new(),
            }),
            Rule::Not(_) => RuleResult::Unary(UnaryRuleResult {
                verdict,
                rule: None,
            }),
            Rule::String(node) => RuleResult::values(verdict, &node.key, node.operator.name(), node.expected_json()),
            Rule::Number(node) => RuleResult::values(verdict, &node.key, node.operator.name(), node.expected_json()),
            Rule::Date(node) => RuleResult::values(verdict, &node.key, node.operator.name(), node.expected_json()),
            Rule::Set(node) => RuleResult::values(verdict, &node.key, node.operator.name(), node.expected_json()),
            Rule::Exists(_) | Rule::Null(_) | Rule::Constant(_) => {
                RuleResult::Base(BaseRuleResult { verdict })
            }
        }
    }

    pub(crate) fn values(
        verdict: Verdict,
        key: &str,
        operator: &str,
        expected_value: json::Value,
    ) -> RuleResult {
        RuleResult::Values(ValuesRuleResult {
            verdict,
            key: key.to_owned(),
            operator: operator.to_owned(),
            expected_value,
            actual_value: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Outcome::*;
    use super::*;

    const ALL: [Outcome; 6] = [Valid, Invalid, Maybe, Ignored, OperationNotSupported, Failed];

    #[test]
    fn and_truth_table() {
        assert_eq!(Valid.and(Valid), Valid);
        assert_eq!(Valid.and(Invalid), Invalid);
        assert_eq!(Valid.and(Maybe), Maybe);
        assert_eq!(Valid.and(Failed), Failed);
        assert_eq!(Invalid.and(Maybe), Invalid);
        assert_eq!(Invalid.and(Failed), Invalid);
        assert_eq!(Maybe.and(Maybe), Maybe);
        assert_eq!(Maybe.and(Failed), Failed);
        assert_eq!(Failed.and(Failed), Failed);
    }

    #[test]
    fn or_truth_table() {
        assert_eq!(Valid.or(Valid), Valid);
        assert_eq!(Valid.or(Invalid), Valid);
        assert_eq!(Valid.or(Maybe), Valid);
        assert_eq!(Valid.or(Failed), Valid);
        assert_eq!(Invalid.or(Invalid), Invalid);
        assert_eq!(Invalid.or(Maybe), Maybe);
        assert_eq!(Invalid.or(Failed), Failed);
        assert_eq!(Maybe.or(Maybe), Maybe);
        assert_eq!(Maybe.or(Failed), Failed);
        assert_eq!(Failed.or(Failed), Failed);
    }

    #[test]
    fn ignored_is_the_identity_of_both_foldings() {
        for outcome in ALL {
            assert_eq!(Ignored.and(outcome), outcome);
            assert_eq!(outcome.and(Ignored), outcome);
            assert_eq!(Ignored.or(outcome), outcome);
            assert_eq!(outcome.or(Ignored), outcome);
        }
    }

    #[test]
    fn foldings_are_commutative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(a.and(b), b.and(a));
                assert_eq!(a.or(b), b.or(a));
            }
        }
    }

    #[test]
    fn foldings_are_associative() {
        for a in ALL {
            for b in ALL {
                for c in ALL {
                    assert_eq!(a.and(b).and(c), a.and(b.and(c)));
                    assert_eq!(a.or(b).or(c), a.or(b.or(c)));
                }
            }
        }
    }

    #[test]
    fn negation_swaps_only_the_decided_outcomes() {
        assert_eq!(Valid.negate(), Invalid);
        assert_eq!(Invalid.negate(), Valid);
        for outcome in [Maybe, Ignored, OperationNotSupported, Failed] {
            assert_eq!(outcome.negate(), outcome);
        }
    }

    #[test]
    fn decisive_children_override_errors() {
        assert_eq!(Invalid.and(Failed), Invalid);
        assert_eq!(Invalid.and(OperationNotSupported), Invalid);
        assert_eq!(Valid.or(Failed), Valid);
        assert_eq!(Valid.or(OperationNotSupported), Valid);
    }

    #[test]
    fn wire_names_round_trip() {
        for outcome in ALL {
            assert_eq!(Outcome::from_name(outcome.as_str()), Some(outcome));
        }
        assert_eq!(Outcome::from_name("NO_SUCH_OUTCOME"), None);
    }
}
