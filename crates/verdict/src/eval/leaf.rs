use crate::context::Context;
use crate::error::FetchError;
use crate::eval::Evaluator;
use crate::result::{BaseRuleResult, Outcome, RuleResult, ValuesRuleResult, Verdict};
use crate::rule::operator::{self, Unsupported};
use crate::rule::Rule;

impl Evaluator {
    /// Evaluates a fact leaf: resolve the fact, coerce it into the leaf's
    /// domain, apply the operator.
    pub(crate) async fn eval_leaf(
        &self,
        rule: &Rule,
        context: &Context,
    ) -> (RuleResult, Option<FetchError>) {
        let key = match rule.key() {
            Some(key) => key,
            None => {
                // Only fact leaves reach this point; anything else is a
                // decode-time bug handled without panicking.
                let verdict = Verdict::of(rule, Outcome::OperationNotSupported).with_message(
                    format!("rule type '{}' carries no fact key", rule.type_name()),
                );
                return (mirror(rule, verdict, None), None);
            }
        };

        let fact = match self.registry().get(key) {
            Some(fact) => fact,
            None => {
                let verdict = Verdict::of(rule, Outcome::Failed)
                    .with_message(format!("no data fetcher registered for fact '{key}'"));
                return (mirror(rule, verdict, None), None);
            }
        };

        match fact.fetch(context).await {
            Err(err) => {
                tracing::debug!(key, error = %err, "fact fetch failed");
                let verdict = Verdict::of(rule, Outcome::Failed).with_message(err.message());
                (mirror(rule, verdict, None), Some(err))
            }
            Ok(value) => {
                let (outcome, message) = judge(rule, &value);
                let mut verdict = Verdict::of(rule, outcome);
                if let Some(message) = message {
                    verdict = verdict.with_message(message);
                }
                (mirror(rule, verdict, Some(value)), None)
            }
        }
    }
}

/// Applies the leaf's operator to the fetched value.
fn judge(rule: &Rule, value: &json::Value) -> (Outcome, Option<String>) {
    match rule {
        Rule::Exists(_) => (Outcome::from_bool(!value.is_null()), None),
        Rule::Null(_) => (Outcome::from_bool(value.is_null()), None),
        // Comparisons against a null fact never hold.
        _ if value.is_null() => (Outcome::Invalid, None),
        Rule::String(node) => checked(
            operator::coerce_string(value)
                .and_then(|actual| node.operator.apply(actual, &node.expected)),
        ),
        Rule::Number(node) => checked(
            operator::coerce_number(value)
                .map(|actual| node.operator.compare(&actual, &node.expected)),
        ),
        Rule::Date(node) => checked(
            operator::coerce_date(value)
                .map(|actual| node.operator.compare(&actual, &node.expected)),
        ),
        Rule::Set(node) => checked(
            operator::coerce_set(value).map(|actual| node.operator.apply(actual, &node.expected)),
        ),
        other => (
            Outcome::OperationNotSupported,
            Some(format!(
                "rule type '{}' does not compare fact values",
                other.type_name()
            )),
        ),
    }
}

fn checked(outcome: Result<bool, Unsupported>) -> (Outcome, Option<String>) {
    match outcome {
        Ok(holds) => (Outcome::from_bool(holds), None),
        Err(err) => (Outcome::OperationNotSupported, Some(err.to_string())),
    }
}

/// Builds the leaf's result mirror, populating `actualValue` for the
/// value-comparing variants.
fn mirror(rule: &Rule, verdict: Verdict, actual: Option<json::Value>) -> RuleResult {
    match rule {
        Rule::String(node) => values(verdict, &node.key, node.operator.name(), node.expected_json(), actual),
        Rule::Number(node) => values(verdict, &node.key, node.operator.name(), node.expected_json(), actual),
        Rule::Date(node) => values(verdict, &node.key, node.operator.name(), node.expected_json(), actual),
        Rule::Set(node) => values(verdict, &node.key, node.operator.name(), node.expected_json(), actual),
        _ => RuleResult::Base(BaseRuleResult { verdict }),
    }
}

fn values(
    verdict: Verdict,
    key: &str,
    operator: &str,
    expected_value: json::Value,
    actual_value: Option<json::Value>,
) -> RuleResult {
    RuleResult::Values(ValuesRuleResult {
        verdict,
        key: key.to_owned(),
        operator: operator.to_owned(),
        expected_value,
        actual_value,
    })
}
