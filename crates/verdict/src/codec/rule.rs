use crate::codec::{decode_attrs, require_str, Codec, CodecBuilder};
use crate::error::DecodeError;
use crate::result::Outcome;
use crate::rule::operator::{
    parse_instant, OrderingOperator, SetOperator, StringOperator,
};
use crate::rule::{
    ConstantRule, DateRule, MultiaryRule, NumberRule, PresenceRule, Rule, SetRule, StringRule,
    UnaryRule,
};

type Obj = json::Map<String, json::Value>;

pub(crate) fn register_builtins(builder: CodecBuilder) -> CodecBuilder {
    builder
        .register("AND", |codec, obj| decode_multiary(codec, obj, "AND"))
        .register("OR", |codec, obj| decode_multiary(codec, obj, "OR"))
        .register("NOT", decode_not)
        .register("STRING", decode_string)
        .register("NUMBER", decode_number)
        .register("DATE", decode_date)
        .register("SET", decode_set)
        .register("EXISTS", |_codec, obj| decode_presence(obj, "EXISTS"))
        .register("NULL", |_codec, obj| decode_presence(obj, "NULL"))
        .register("CONSTANT", decode_constant)
}

fn decode_multiary(codec: &Codec, obj: &Obj, rule_type: &str) -> Result<Rule, DecodeError> {
    let children = match obj.get("rules") {
        Some(json::Value::Array(children)) => children,
        Some(other) => {
            return Err(DecodeError::TypeMismatch {
                rule_type: rule_type.to_owned(),
                field: "rules",
                detail: format!("expected an array, found {other}"),
            })
        }
        None => {
            return Err(DecodeError::MissingField {
                rule_type: rule_type.to_owned(),
                field: "rules",
            })
        }
    };
    let rules = children
        .iter()
        .map(|child| codec.decode_rule(child))
        .collect::<Result<Vec<_>, _>>()?;
    let node = MultiaryRule {
        attrs: decode_attrs(obj),
        rules,
    };
    Ok(match rule_type {
        "OR" => Rule::Or(node),
        _ => Rule::And(node),
    })
}

fn decode_not(codec: &Codec, obj: &Obj) -> Result<Rule, DecodeError> {
    let child = obj.get("rule").ok_or(DecodeError::MissingField {
        rule_type: "NOT".to_owned(),
        field: "rule",
    })?;
    Ok(Rule::Not(UnaryRule {
        attrs: decode_attrs(obj),
        rule: Box::new(codec.decode_rule(child)?),
    }))
}

fn decode_string(_codec: &Codec, obj: &Obj) -> Result<Rule, DecodeError> {
    let name = require_str(obj, "operator", "STRING")?;
    let operator = StringOperator::from_name(name).ok_or_else(|| DecodeError::UnknownOperator {
        rule_type: "STRING".to_owned(),
        operator: name.to_owned(),
    })?;
    Ok(Rule::String(StringRule {
        attrs: decode_attrs(obj),
        key: require_str(obj, "key", "STRING")?.to_owned(),
        operator,
        expected: require_str(obj, "value", "STRING")?.to_owned(),
    }))
}

fn decode_number(_codec: &Codec, obj: &Obj) -> Result<Rule, DecodeError> {
    let operator = ordering_operator(obj, "NUMBER")?;
    let expected = match obj.get("value") {
        Some(json::Value::Number(number)) => number
            .to_string()
            .parse()
            .map_err(|err| DecodeError::TypeMismatch {
                rule_type: "NUMBER".to_owned(),
                field: "value",
                detail: format!("expected a decimal number: {err}"),
            })?,
        Some(other) => {
            return Err(DecodeError::TypeMismatch {
                rule_type: "NUMBER".to_owned(),
                field: "value",
                detail: format!("expected a number, found {other}"),
            })
        }
        None => {
            return Err(DecodeError::MissingField {
                rule_type: "NUMBER".to_owned(),
                field: "value",
            })
        }
    };
    Ok(Rule::Number(NumberRule {
        attrs: decode_attrs(obj),
        key: require_str(obj, "key", "NUMBER")?.to_owned(),
        operator,
        expected,
    }))
}

fn decode_date(_codec: &Codec, obj: &Obj) -> Result<Rule, DecodeError> {
    let operator = ordering_operator(obj, "DATE")?;
    let raw = require_str(obj, "value", "DATE")?;
    let expected = parse_instant(raw).map_err(|err| DecodeError::TypeMismatch {
        rule_type: "DATE".to_owned(),
        field: "value",
        detail: err.to_string(),
    })?;
    Ok(Rule::Date(DateRule {
        attrs: decode_attrs(obj),
        key: require_str(obj, "key", "DATE")?.to_owned(),
        operator,
        expected,
    }))
}

fn decode_set(_codec: &Codec, obj: &Obj) -> Result<Rule, DecodeError> {
    let name = require_str(obj, "operator", "SET")?;
    let operator = SetOperator::from_name(name).ok_or_else(|| DecodeError::UnknownOperator {
        rule_type: "SET".to_owned(),
        operator: name.to_owned(),
    })?;
    let expected = match obj.get("value") {
        Some(json::Value::Array(values)) => values.clone(),
        Some(other) => {
            return Err(DecodeError::TypeMismatch {
                rule_type: "SET".to_owned(),
                field: "value",
                detail: format!("expected an array, found {other}"),
            })
        }
        None => {
            return Err(DecodeError::MissingField {
                rule_type: "SET".to_owned(),
                field: "value",
            })
        }
    };
    Ok(Rule::Set(SetRule {
        attrs: decode_attrs(obj),
        key: require_str(obj, "key", "SET")?.to_owned(),
        operator,
        expected,
    }))
}

fn decode_presence(obj: &Obj, rule_type: &str) -> Result<Rule, DecodeError> {
    let node = PresenceRule {
        attrs: decode_attrs(obj),
        key: require_str(obj, "key", rule_type)?.to_owned(),
    };
    Ok(match rule_type {
        "NULL" => Rule::Null(node),
        _ => Rule::Exists(node),
    })
}

fn decode_constant(_codec: &Codec, obj: &Obj) -> Result<Rule, DecodeError> {
    let name = require_str(obj, "result", "CONSTANT")?;
    let result =
        Outcome::from_name(name).ok_or_else(|| DecodeError::UnknownOutcome(name.to_owned()))?;
    Ok(Rule::Constant(ConstantRule {
        attrs: decode_attrs(obj),
        result,
    }))
}

fn ordering_operator(obj: &Obj, rule_type: &str) -> Result<OrderingOperator, DecodeError> {
    let name = require_str(obj, "operator", rule_type)?;
    OrderingOperator::from_name(name).ok_or_else(|| DecodeError::UnknownOperator {
        rule_type: rule_type.to_owned(),
        operator: name.to_owned(),
    })
}

pub(crate) fn encode(codec: &Codec, rule: &Rule) -> json::Value {
    let mut obj = json::Map::new();
    obj.insert("type".to_owned(), rule.type_name().into());
    if let Some(description) = &rule.attrs().description {
        obj.insert("description".to_owned(), description.as_str().into());
    }
    if rule.attrs().ignore {
        obj.insert("ignore".to_owned(), true.into());
    }
    match rule {
        Rule::And(node) | Rule::Or(node) => {
            let children = node.rules.iter().map(|child| codec.encode_rule(child));
            obj.insert("rules".to_owned(), json::Value::Array(children.collect()));
        }
        Rule::Not(node) => {
            obj.insert("rule".to_owned(), codec.encode_rule(&node.rule));
        }
        Rule::String(node) => {
            obj.insert("key".to_owned(), node.key.as_str().into());
            obj.insert("operator".to_owned(), node.operator.name().into());
            obj.insert("value".to_owned(), node.expected_json());
        }
        Rule::Number(node) => {
            obj.insert("key".to_owned(), node.key.as_str().into());
            obj.insert("operator".to_owned(), node.operator.name().into());
            obj.insert("value".to_owned(), node.expected_json());
        }
        Rule::Date(node) => {
            obj.insert("key".to_owned(), node.key.as_str().into());
            obj.insert("operator".to_owned(), node.operator.name().into());
            obj.insert("value".to_owned(), node.expected_json());
        }
        Rule::Set(node) => {
            obj.insert("key".to_owned(), node.key.as_str().into());
            obj.insert("operator".to_owned(), node.operator.name().into());
            obj.insert("value".to_owned(), node.expected_json());
        }
        Rule::Exists(node) | Rule::Null(node) => {
            obj.insert("key".to_owned(), node.key.as_str().into());
        }
        Rule::Constant(node) => {
            obj.insert("result".to_owned(), node.result.as_str().into());
        }
    }
    json::Value::Object(obj)
}
