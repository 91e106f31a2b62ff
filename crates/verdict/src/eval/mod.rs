use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};

mod leaf;

use crate::config::{EvaluatorConfig, SkippedChildren};
use crate::context::Context;
use crate::error::FetchError;
use crate::fact::Registry;
use crate::result::{BaseRuleResult, MultiaryRuleResult, Outcome, RuleResult, UnaryRuleResult, Verdict};
use crate::rule::{MultiaryRule, Rule, UnaryRule};

/// Which decisive outcome ends a combinator early.
#[derive(Debug, Clone, Copy)]
enum Gate {
    /// AND: an INVALID child decides the node.
    All,
    /// OR: a VALID child decides the node.
    Any,
}

impl Gate {
    fn fold(self, acc: Outcome, next: Outcome) -> Outcome {
        match self {
            Gate::All => acc.and(next),
            Gate::Any => acc.or(next),
        }
    }

    fn decisive(self) -> Outcome {
        match self {
            Gate::All => Outcome::Invalid,
            Gate::Any => Outcome::Valid,
        }
    }
}

/// Walks rule trees against a fact registry, producing result mirrors.
///
/// Children of a combinator evaluate concurrently; the first decisive child
/// short-circuits the node and abandons its still-pending siblings. Every
/// suspension point is a fact fetch or a child join, so the evaluator never
/// blocks a thread.
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: Arc<Registry>,
    config: EvaluatorConfig,
}

impl Evaluator {
    /// Creates an evaluator over a registry with the default configuration.
    pub fn new(registry: Arc<Registry>) -> Evaluator {
        Evaluator::with_config(registry, EvaluatorConfig::default())
    }

    /// Creates an evaluator with an explicit configuration.
    pub fn with_config(registry: Arc<Registry>, config: EvaluatorConfig) -> Evaluator {
        Evaluator { registry, config }
    }

    /// The fact registry the evaluator resolves keys against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Evaluates a rule tree against a context.
    ///
    /// Everything that can go wrong during an evaluation lands on a result
    /// node as an outcome, so this never fails.
    pub async fn evaluate(&self, rule: &Rule, context: &Context) -> RuleResult {
        self.eval_node(rule, context).await
    }

    fn eval_node<'a>(&'a self, rule: &'a Rule, context: &'a Context) -> BoxFuture<'a, RuleResult> {
        async move {
            if rule.attrs().ignore {
                let result = RuleResult::ignored(rule);
                self.dispatch(rule, None, &result);
                return result;
            }
            let (result, error) = match rule {
                Rule::And(node) => (self.eval_multiary(rule, node, Gate::All, context).await, None),
                Rule::Or(node) => (self.eval_multiary(rule, node, Gate::Any, context).await, None),
                Rule::Not(node) => (self.eval_unary(rule, node, context).await, None),
                Rule::Constant(node) => (
                    RuleResult::Base(BaseRuleResult {
                        verdict: Verdict::of(rule, node.result),
                    }),
                    None,
                ),
                _ => self.eval_leaf(rule, context).await,
            };
            self.dispatch(rule, error.as_ref(), &result);
            result
        }
        .boxed()
    }

    async fn eval_multiary(
        &self,
        rule: &Rule,
        node: &MultiaryRule,
        gate: Gate,
        context: &Context,
    ) -> RuleResult {
        let mut slots: Vec<Option<RuleResult>> = Vec::new();
        slots.resize_with(node.rules.len(), || None);

        // Children start in declared order but complete in any order; the
        // index tag puts each result back in its declared position.
        let mut pending: FuturesUnordered<_> = node
            .rules
            .iter()
            .enumerate()
            .map(|(index, child)| {
                let child = self.eval_node(child, context);
                async move { (index, child.await) }
            })
            .collect();

        let mut folded: Option<Outcome> = None;
        let mut decided = false;
        while let Some((index, result)) = pending.next().await {
            let outcome = result.outcome();
            slots[index] = Some(result);
            if outcome != Outcome::Ignored {
                let next = match folded {
                    Some(acc) => gate.fold(acc, outcome),
                    None => outcome,
                };
                folded = Some(next);
                if next == gate.decisive() {
                    decided = true;
                    break;
                }
            }
        }

        if decided {
            // Pick up siblings that are already done; their actions ran with
            // real outcomes, so they must not be reported as MAYBE.
            while let Some(Some((index, result))) = pending.next().now_or_never() {
                slots[index] = Some(result);
            }
        }
        // Dropping the stream abandons the still-running children. A shared
        // cache load keeps running for its other observers.
        drop(pending);

        let outcome = match folded {
            Some(outcome) => outcome,
            None if node.rules.is_empty() => Outcome::Maybe,
            None => Outcome::Ignored,
        };

        let mut rules = Vec::with_capacity(node.rules.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(result) => rules.push(result),
                None => {
                    let child = &node.rules[index];
                    let placeholder = RuleResult::pending(child);
                    self.dispatch(child, None, &placeholder);
                    if self.config.skipped_children == SkippedChildren::Maybe {
                        rules.push(placeholder);
                    }
                }
            }
        }

        RuleResult::Multiary(MultiaryRuleResult {
            verdict: Verdict::of(rule, outcome),
            rules,
        })
    }

    async fn eval_unary(&self, rule: &Rule, node: &UnaryRule, context: &Context) -> RuleResult {
        let child = self.eval_node(&node.rule, context).await;
        let outcome = child.outcome().negate();
        RuleResult::Unary(UnaryRuleResult {
            verdict: Verdict::of(rule, outcome),
            rule: Some(Box::new(child)),
        })
    }

    /// Runs the node's action, if any, now that its outcome is final.
    fn dispatch(&self, rule: &Rule, error: Option<&FetchError>, result: &RuleResult) {
        if let Some(action) = &rule.attrs().action {
            action.invoke(result.outcome(), error, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::error::BoxError;
    use crate::fact::{FactFetcher, FetchResponse};
    use crate::result::Outcome::*;
    use crate::rule::operator::{OrderingOperator, SetOperator, StringOperator};
    use crate::rule::Action;

    #[derive(Clone)]
    enum Behavior {
        Value(json::Value),
        Fail(String),
        Never,
    }

    struct TestFetcher {
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl FactFetcher for TestFetcher {
        fn fetch_response(
            &self,
            _context: &Context,
        ) -> BoxFuture<'static, Result<FetchResponse, BoxError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior.clone() {
                Behavior::Value(value) => async move { Ok(FetchResponse::new(value)) }.boxed(),
                Behavior::Fail(message) => {
                    async move { Err(BoxError::from(message)) }.boxed()
                }
                Behavior::Never => futures::future::pending().boxed(),
            }
        }

        fn calculate_request_key(&self, context: &Context) -> String {
            context.fingerprint()
        }
    }

    struct Harness {
        evaluator: Evaluator,
        calls: HashMap<&'static str, Arc<AtomicUsize>>,
    }

    impl Harness {
        fn new(facts: Vec<(&'static str, Behavior)>) -> Harness {
            Harness::with_config(facts, EvaluatorConfig::default())
        }

        fn with_config(
            facts: Vec<(&'static str, Behavior)>,
            config: EvaluatorConfig,
        ) -> Harness {
            let mut calls = HashMap::new();
            let mut builder = Registry::builder();
            for (key, behavior) in facts {
                let counter = Arc::new(AtomicUsize::new(0));
                calls.insert(key, Arc::clone(&counter));
                builder = builder.register(
                    key,
                    TestFetcher {
                        behavior,
                        calls: counter,
                    },
                );
            }
            Harness {
                evaluator: Evaluator::with_config(Arc::new(builder.build()), config),
                calls,
            }
        }

        async fn run(&self, rule: &Rule) -> RuleResult {
            tokio::time::timeout(
                Duration::from_secs(5),
                self.evaluator.evaluate(rule, &Context::new()),
            )
            .await
            .expect("evaluation did not complete")
        }

        fn calls(&self, key: &str) -> usize {
            self.calls[key].load(Ordering::SeqCst)
        }
    }

    fn children(result: &RuleResult) -> &[RuleResult] {
        match result {
            RuleResult::Multiary(node) => &node.rules,
            _ => panic!("expected a multiary result"),
        }
    }

    fn value(behavior: impl Into<json::Value>) -> Behavior {
        Behavior::Value(behavior.into())
    }

    fn decimal(text: &str) -> bigdecimal::BigDecimal {
        text.parse().unwrap()
    }

    #[tokio::test]
    async fn simple_and_is_valid() {
        let harness = Harness::new(vec![("a", value("x")), ("b", value(7))]);
        let rule = Rule::and(vec![
            Rule::string("a", StringOperator::Equals, "x"),
            Rule::number("b", OrderingOperator::GreaterThan, decimal("5")),
        ]);

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Valid);
        let rules = children(&result);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].outcome(), Valid);
        assert_eq!(rules[1].outcome(), Valid);
        match &rules[1] {
            RuleResult::Values(node) => {
                assert_eq!(node.actual_value, Some(json::json!(7)));
                assert_eq!(node.expected_value, json::json!(5));
                assert_eq!(node.operator, "GREATER_THAN");
            }
            other => panic!("expected a values result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn and_short_circuits_on_invalid_without_waiting() {
        let harness = Harness::new(vec![("a", value("z")), ("b", Behavior::Never)]);
        let rule = Rule::and(vec![
            Rule::string("a", StringOperator::Equals, "x"),
            Rule::string("b", StringOperator::Equals, "y"),
        ]);

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Invalid);
        let rules = children(&result);
        assert_eq!(rules[0].outcome(), Invalid);
        assert_eq!(rules[1].outcome(), Maybe);
    }

    #[tokio::test]
    async fn or_short_circuits_on_valid_without_waiting() {
        let harness = Harness::new(vec![("a", value("x")), ("b", Behavior::Never)]);
        let rule = Rule::or(vec![
            Rule::string("a", StringOperator::Equals, "x"),
            Rule::exists("b"),
        ]);

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Valid);
        assert_eq!(children(&result)[1].outcome(), Maybe);
    }

    #[tokio::test]
    async fn or_recovers_from_a_failed_child() {
        let harness = Harness::new(vec![
            ("a", Behavior::Fail("connection reset".into())),
            ("b", value("y")),
        ]);
        let rule = Rule::or(vec![
            Rule::string("a", StringOperator::Equals, "x"),
            Rule::string("b", StringOperator::Equals, "y"),
        ]);

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Valid);
        let rules = children(&result);
        assert_eq!(rules[0].outcome(), Failed);
        assert_eq!(
            rules[0].verdict().message.as_deref(),
            Some("connection reset")
        );
        assert_eq!(rules[1].outcome(), Valid);
    }

    #[tokio::test]
    async fn failed_is_not_absorbing_but_survives_to_the_end() {
        let harness = Harness::new(vec![]);
        let overridden = Rule::and(vec![
            Rule::constant(Failed),
            Rule::constant(Invalid),
        ]);
        assert_eq!(harness.run(&overridden).await.outcome(), Invalid);

        let surviving = Rule::and(vec![Rule::constant(Failed), Rule::constant(Valid)]);
        assert_eq!(harness.run(&surviving).await.outcome(), Failed);
    }

    #[tokio::test]
    async fn facts_are_fetched_once_per_evaluation() {
        let harness = Harness::new(vec![("a", value("x"))]);
        let rule = Rule::and(vec![
            Rule::exists("a"),
            Rule::string("a", StringOperator::Equals, "x"),
        ]);

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Valid);
        assert_eq!(harness.calls("a"), 1);
    }

    #[tokio::test]
    async fn ignored_children_are_the_combinator_identity() {
        let harness = Harness::new(vec![]);
        let rule = Rule::and(vec![
            Rule::constant(Valid).ignore(),
            Rule::constant(Invalid),
        ]);

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Invalid);
        let rules = children(&result);
        assert_eq!(rules[0].outcome(), Ignored);
        assert!(rules[0].verdict().ignored);

        let all_ignored = Rule::or(vec![Rule::constant(Valid).ignore()]);
        assert_eq!(harness.run(&all_ignored).await.outcome(), Ignored);

        let empty = Rule::and(vec![]);
        assert_eq!(harness.run(&empty).await.outcome(), Maybe);
    }

    #[tokio::test]
    async fn not_is_an_involution_on_decided_outcomes() {
        let harness = Harness::new(vec![("a", value("x"))]);
        let plain = Rule::string("a", StringOperator::Equals, "x");
        let doubled = Rule::not(Rule::not(plain.clone()));
        assert_eq!(
            harness.run(&doubled).await.outcome(),
            harness.run(&plain).await.outcome(),
        );

        assert_eq!(harness.run(&Rule::not(Rule::constant(Invalid))).await.outcome(), Valid);
        assert_eq!(harness.run(&Rule::not(Rule::constant(Failed))).await.outcome(), Failed);
        assert_eq!(
            harness.run(&Rule::not(Rule::constant(Valid).ignore())).await.outcome(),
            Ignored,
        );
    }

    #[tokio::test]
    async fn null_facts_follow_per_variant_semantics() {
        let harness = Harness::new(vec![("n", value(json::Value::Null))]);

        assert_eq!(harness.run(&Rule::null("n")).await.outcome(), Valid);
        assert_eq!(harness.run(&Rule::exists("n")).await.outcome(), Invalid);

        let compared = harness
            .run(&Rule::string("n", StringOperator::Equals, "x"))
            .await;
        assert_eq!(compared.outcome(), Invalid);
        match compared {
            RuleResult::Values(node) => assert_eq!(node.actual_value, Some(json::Value::Null)),
            other => panic!("expected a values result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn present_facts_satisfy_exists() {
        let harness = Harness::new(vec![("p", value(42))]);
        assert_eq!(harness.run(&Rule::exists("p")).await.outcome(), Valid);
        assert_eq!(harness.run(&Rule::null("p")).await.outcome(), Invalid);
    }

    #[tokio::test]
    async fn coercion_failures_are_operation_not_supported() {
        let harness = Harness::new(vec![("flag", value(true))]);
        let result = harness
            .run(&Rule::number("flag", OrderingOperator::Equals, decimal("1")))
            .await;
        assert_eq!(result.outcome(), OperationNotSupported);
        assert!(result.verdict().message.is_some());

        // A non-decisive error propagates through the combinator fold.
        let folded = harness
            .run(&Rule::and(vec![
                Rule::constant(Valid),
                Rule::number("flag", OrderingOperator::Equals, decimal("1")),
            ]))
            .await;
        assert_eq!(folded.outcome(), OperationNotSupported);
    }

    #[tokio::test]
    async fn unknown_facts_fail_structurally() {
        let harness = Harness::new(vec![]);
        let result = harness.run(&Rule::exists("ghost")).await;
        assert_eq!(result.outcome(), Failed);
        assert_eq!(
            result.verdict().message.as_deref(),
            Some("no data fetcher registered for fact 'ghost'")
        );
    }

    #[tokio::test]
    async fn set_leaves_compare_with_set_semantics() {
        let harness = Harness::new(vec![("roles", value(json::json!(["admin", "staff"])))]);
        let rule = Rule::set(
            "roles",
            SetOperator::Intersects,
            vec![json::json!("admin"), json::json!("root")],
        );
        assert_eq!(harness.run(&rule).await.outcome(), Valid);
    }

    #[tokio::test]
    async fn omit_policy_drops_skipped_children() {
        let harness = Harness::with_config(
            vec![("b", Behavior::Never)],
            EvaluatorConfig {
                skipped_children: SkippedChildren::Omit,
            },
        );
        let rule = Rule::and(vec![Rule::constant(Invalid), Rule::exists("b")]);

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Invalid);
        assert_eq!(children(&result).len(), 1);
        assert_eq!(children(&result)[0].outcome(), Invalid);
    }

    #[tokio::test]
    async fn actions_run_once_per_node_children_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let record = |log: &Arc<Mutex<Vec<(String, Outcome)>>>, name: &str| {
            let log = Arc::clone(log);
            let name = name.to_owned();
            Action::new(name.clone(), move |outcome, _error, _result| {
                log.lock().unwrap().push((name.clone(), outcome));
                Ok(())
            })
        };

        let harness = Harness::new(vec![("slow", Behavior::Never)]);
        let rule = Rule::and(vec![
            Rule::constant(Invalid).with_action(record(&log, "decisive")),
            Rule::exists("slow").with_action(record(&log, "skipped")),
        ])
        .with_action(record(&log, "parent"));

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Invalid);

        let entries = log.lock().unwrap().clone();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], ("decisive".to_owned(), Invalid));
        assert!(entries[1..entries.len() - 1]
            .iter()
            .any(|(name, outcome)| name == "skipped" && *outcome == Maybe));
        assert_eq!(entries.last().unwrap(), &("parent".to_owned(), Invalid));
    }

    #[tokio::test]
    async fn decoded_rules_evaluate_and_results_encode() {
        let harness = Harness::new(vec![("plan", value("premium")), ("age", value(21))]);
        let codec = crate::codec::Codec::new();
        let rule = codec
            .decode_rule(&json::json!({
                "type": "AND",
                "rules": [
                    { "type": "STRING", "key": "plan", "operator": "EQUALS", "value": "premium" },
                    { "type": "NUMBER", "key": "age", "operator": "GREATER_THAN_EQUAL", "value": 18 }
                ]
            }))
            .unwrap();

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Valid);

        let encoded = codec.encode_result(&result);
        assert_eq!(encoded["result"], json::json!("VALID"));
        assert_eq!(encoded["rules"][1]["actualValue"], json::json!(21));
        let round_tripped = codec.decode_result(&encoded).unwrap();
        assert_eq!(codec.encode_result(&round_tripped), encoded);
    }

    #[tokio::test]
    async fn action_errors_do_not_alter_the_result() {
        let harness = Harness::new(vec![]);
        let rule = Rule::constant(Valid)
            .with_action(Action::new("explodes", |_, _, _| Err("boom".into())));
        assert_eq!(harness.run(&rule).await.outcome(), Valid);
    }

    #[tokio::test]
    async fn failed_leaves_hand_the_error_to_their_action() {
        let seen = Arc::new(Mutex::new(None));
        let seen_in_action = Arc::clone(&seen);
        let harness = Harness::new(vec![("a", Behavior::Fail("boom".into()))]);
        let rule = Rule::exists("a").with_action(Action::new("capture", move |_, error, _| {
            *seen_in_action.lock().unwrap() = error.cloned();
            Ok(())
        }));

        let result = harness.run(&rule).await;
        assert_eq!(result.outcome(), Failed);
        assert_eq!(
            seen.lock().unwrap().as_ref().map(FetchError::message),
            Some("boom")
        );
    }
}
