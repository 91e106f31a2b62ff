use crate::codec::{require_str, Codec};
use crate::error::DecodeError;
use crate::result::{
    BaseRuleResult, MultiaryRuleResult, Outcome, RuleResult, UnaryRuleResult, ValuesRuleResult,
    Verdict,
};

type Obj = json::Map<String, json::Value>;

pub(crate) fn decode(codec: &Codec, value: &json::Value) -> Result<RuleResult, DecodeError> {
    let obj = value.as_object().ok_or_else(|| DecodeError::TypeMismatch {
        rule_type: "result".to_owned(),
        field: "type",
        detail: format!("expected a JSON object, found {value}"),
    })?;
    let verdict = decode_verdict(obj)?;

    // Structural discrimination: child lists mean multiary, a single child
    // means unary, a fact key means values, anything else is a base node.
    if let Some(children) = obj.get("rules") {
        let children = children
            .as_array()
            .ok_or_else(|| DecodeError::TypeMismatch {
                rule_type: verdict.rule_type.clone(),
                field: "rules",
                detail: format!("expected an array, found {children}"),
            })?;
        let rules = children
            .iter()
            .map(|child| decode(codec, child))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(RuleResult::Multiary(MultiaryRuleResult { verdict, rules }));
    }

    if let Some(child) = obj.get("rule") {
        return Ok(RuleResult::Unary(UnaryRuleResult {
            verdict,
            rule: Some(Box::new(decode(codec, child)?)),
        }));
    }

    if obj.contains_key("key") {
        return Ok(RuleResult::Values(ValuesRuleResult {
            key: require_str(obj, "key", &verdict.rule_type)?.to_owned(),
            operator: require_str(obj, "operator", &verdict.rule_type)?.to_owned(),
            expected_value: obj
                .get("expectedValue")
                .cloned()
                .unwrap_or(json::Value::Null),
            actual_value: obj.get("actualValue").cloned(),
            verdict,
        }));
    }

    Ok(RuleResult::Base(BaseRuleResult { verdict }))
}

fn decode_verdict(obj: &Obj) -> Result<Verdict, DecodeError> {
    let rule_type = require_str(obj, "type", "result")?.to_owned();
    let name = require_str(obj, "result", &rule_type)?;
    let outcome =
        Outcome::from_name(name).ok_or_else(|| DecodeError::UnknownOutcome(name.to_owned()))?;
    Ok(Verdict {
        outcome,
        rule_type,
        description: obj
            .get("description")
            .and_then(json::Value::as_str)
            .map(str::to_owned),
        message: obj
            .get("message")
            .and_then(json::Value::as_str)
            .map(str::to_owned),
        ignored: obj
            .get("ignored")
            .and_then(json::Value::as_bool)
            .unwrap_or(false),
    })
}

pub(crate) fn encode(codec: &Codec, result: &RuleResult) -> json::Value {
    let mut obj = json::Map::new();
    let verdict = result.verdict();
    obj.insert("type".to_owned(), verdict.rule_type.as_str().into());
    obj.insert("result".to_owned(), verdict.outcome.as_str().into());
    if let Some(description) = &verdict.description {
        obj.insert("description".to_owned(), description.as_str().into());
    }
    if let Some(message) = &verdict.message {
        obj.insert("message".to_owned(), message.as_str().into());
    }
    if verdict.ignored {
        obj.insert("ignored".to_owned(), true.into());
    }
    match result {
        RuleResult::Multiary(node) => {
            let children = node.rules.iter().map(|child| encode(codec, child));
            obj.insert("rules".to_owned(), json::Value::Array(children.collect()));
        }
        RuleResult::Unary(node) => {
            if let Some(child) = &node.rule {
                obj.insert("rule".to_owned(), encode(codec, child));
            }
        }
        RuleResult::Values(node) => {
            obj.insert("key".to_owned(), node.key.as_str().into());
            obj.insert("operator".to_owned(), node.operator.as_str().into());
            if node.expected_value != json::Value::Null {
                obj.insert("expectedValue".to_owned(), node.expected_value.clone());
            }
            if let Some(actual) = &node.actual_value {
                if !actual.is_null() {
                    obj.insert("actualValue".to_owned(), actual.clone());
                }
            }
        }
        RuleResult::Base(_) => {}
    }
    json::Value::Object(obj)
}
