//! Tree-walking evaluator over JSON values.

use core::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::ast::{BinaryOp, Expr, MacroKind, UnaryOp};
use crate::error::{ExprError, Result};

/// Variable bindings visible to an expression.
pub type Bindings = Map<String, Value>;

/// Evaluation scope: global bindings plus comprehension loop variables.
struct Scope<'env> {
    globals: &'env Bindings,
    locals: Vec<(String, Value)>,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| local == name) {
            return Ok(value.clone());
        }
        self.globals
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UnboundVariable(name.to_owned()))
    }
}

/// Evaluate `expr` against `bindings`.
///
/// # Errors
/// Returns an error on unbound variables, missing keys, type mismatches,
/// arithmetic faults or invalid regex patterns.
pub fn evaluate(expr: &Expr, bindings: &Bindings) -> Result<Value> {
    let mut scope = Scope {
        globals: bindings,
        locals: Vec::new(),
    };
    eval(expr, &mut scope)
}

fn eval(expr: &Expr, scope: &mut Scope<'_>) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => scope.lookup(name),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, scope))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Expr::Map(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                let key = match eval(key, scope)? {
                    Value::String(text) => text,
                    other => display(&other),
                };
                map.insert(key, eval(value, scope)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Member { target, field } => {
            let receiver = eval(target, scope)?;
            member(&receiver, field)
        }
        Expr::Index { target, index } => {
            let receiver = eval(target, scope)?;
            let key = eval(index, scope)?;
            index_value(&receiver, &key)
        }
        Expr::Call { function, args } => call_function(function, args, scope),
        Expr::Method {
            target,
            method,
            args,
        } => {
            let receiver = eval(target, scope)?;
            let values = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<Result<Vec<_>>>()?;
            call_method(&receiver, method, &values)
        }
        Expr::Comprehension {
            target,
            kind,
            var,
            body,
        } => comprehension(target, *kind, var, body, scope),
        Expr::Unary { op, operand } => {
            let value = eval(operand, scope)?;
            match (op, value) {
                (UnaryOp::Not, Value::Bool(flag)) => Ok(Value::Bool(!flag)),
                (UnaryOp::Neg, Value::Number(number)) => negate(&number),
                (op, other) => Err(ExprError::Type(format!(
                    "cannot apply {op:?} to {}",
                    type_name(&other)
                ))),
            }
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, scope),
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => match eval(cond, scope)? {
            Value::Bool(true) => eval(then, scope),
            Value::Bool(false) => eval(otherwise, scope),
            other => Err(ExprError::Type(format!(
                "conditional expects bool, got {}",
                type_name(&other)
            ))),
        },
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, scope: &mut Scope<'_>) -> Result<Value> {
    // Short-circuit before evaluating the right-hand side.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let lhs = expect_bool(eval(left, scope)?, op)?;
        if (op == BinaryOp::And && !lhs) || (op == BinaryOp::Or && lhs) {
            return Ok(Value::Bool(lhs));
        }
        return Ok(Value::Bool(expect_bool(eval(right, scope)?, op)?));
    }

    let lhs = eval(left, scope)?;
    let rhs = eval(right, scope)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare(&lhs, &rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::In => membership(&lhs, &rhs),
        BinaryOp::Add => add(lhs, rhs),
        _ => arithmetic(op, &lhs, &rhs),
    }
}

fn expect_bool(value: Value, op: BinaryOp) -> Result<bool> {
    match value {
        Value::Bool(flag) => Ok(flag),
        other => Err(ExprError::Type(format!(
            "{op:?} expects bool operands, got {}",
            type_name(&other)
        ))),
    }
}

fn comprehension(
    target: &Expr,
    kind: MacroKind,
    var: &str,
    body: &Expr,
    scope: &mut Scope<'_>,
) -> Result<Value> {
    let items = match eval(target, scope)? {
        Value::Array(items) => items,
        Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
        other => {
            return Err(ExprError::Type(format!(
                "{kind:?} expects a list or map, got {}",
                type_name(&other)
            )));
        }
    };

    let mut collected = Vec::new();
    for item in items {
        scope.locals.push((var.to_owned(), item.clone()));
        let outcome = eval(body, scope);
        scope.locals.pop();
        let value = outcome?;

        match kind {
            MacroKind::Map => collected.push(value),
            MacroKind::Exists | MacroKind::All | MacroKind::Filter => {
                let Value::Bool(flag) = value else {
                    return Err(ExprError::Type(format!(
                        "{kind:?} predicate must return bool, got {}",
                        type_name(&value)
                    )));
                };
                match kind {
                    MacroKind::Exists if flag => return Ok(Value::Bool(true)),
                    MacroKind::All if !flag => return Ok(Value::Bool(false)),
                    MacroKind::Filter if flag => collected.push(item),
                    _ => {}
                }
            }
        }
    }

    Ok(match kind {
        MacroKind::Exists => Value::Bool(false),
        MacroKind::All => Value::Bool(true),
        MacroKind::Filter | MacroKind::Map => Value::Array(collected),
    })
}

fn call_function(function: &str, args: &[Expr], scope: &mut Scope<'_>) -> Result<Value> {
    if function == "has" {
        let [Expr::Member { target, field }] = args else {
            return Err(ExprError::Type(
                "has() expects a single field selection".to_owned(),
            ));
        };
        return match eval(target, scope)? {
            Value::Object(map) => Ok(Value::Bool(map.contains_key(field))),
            _ => Ok(Value::Bool(false)),
        };
    }

    let values = args
        .iter()
        .map(|arg| eval(arg, scope))
        .collect::<Result<Vec<_>>>()?;
    let [value] = values.as_slice() else {
        return Err(ExprError::Type(format!(
            "{function}() expects 1 argument, got {}",
            values.len()
        )));
    };

    match function {
        "size" => size(value),
        "int" => to_int(value),
        "double" => to_double(value),
        "string" => Ok(Value::String(display(value))),
        "type" => Ok(Value::String(type_name(value).to_owned())),
        _ => Err(ExprError::UnknownFunction(function.to_owned())),
    }
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value> {
    if method == "size" && args.is_empty() {
        return size(receiver);
    }

    match receiver {
        Value::String(text) => string_method(text, method, args),
        Value::Array(items) => match (method, args) {
            ("contains", [needle]) => Ok(Value::Bool(
                items.iter().any(|item| values_equal(item, needle)),
            )),
            _ => Err(ExprError::UnknownFunction(format!("list.{method}"))),
        },
        other => Err(ExprError::Type(format!(
            "no method {method} on {}",
            type_name(other)
        ))),
    }
}

fn string_arg<'args>(method: &str, args: &'args [Value], idx: usize) -> Result<&'args str> {
    match args.get(idx) {
        Some(Value::String(arg)) => Ok(arg.as_str()),
        Some(other) => Err(ExprError::Type(format!(
            "string.{method} expects string argument, got {}",
            type_name(other)
        ))),
        None => Err(ExprError::Type(format!(
            "string.{method} expects an argument"
        ))),
    }
}

fn string_method(text: &str, method: &str, args: &[Value]) -> Result<Value> {
    match method {
        "contains" => Ok(Value::Bool(text.contains(string_arg(method, args, 0)?))),
        "startsWith" => Ok(Value::Bool(text.starts_with(string_arg(method, args, 0)?))),
        "endsWith" => Ok(Value::Bool(text.ends_with(string_arg(method, args, 0)?))),
        "matches" => {
            let pattern = Regex::new(string_arg(method, args, 0)?)?;
            Ok(Value::Bool(pattern.is_match(text)))
        }
        "trim" => Ok(Value::String(text.trim().to_owned())),
        "lowerAscii" => Ok(Value::String(text.to_ascii_lowercase())),
        "upperAscii" => Ok(Value::String(text.to_ascii_uppercase())),
        "split" => Ok(Value::Array(
            text.split(string_arg(method, args, 0)?)
                .map(|part| Value::String(part.to_owned()))
                .collect(),
        )),
        _ => Err(ExprError::UnknownFunction(format!("string.{method}"))),
    }
}

fn member(receiver: &Value, field: &str) -> Result<Value> {
    match receiver {
        Value::Object(map) => map
            .get(field)
            .cloned()
            .ok_or_else(|| ExprError::NoSuchKey(field.to_owned())),
        other => Err(ExprError::Type(format!(
            "cannot select field {field} on {}",
            type_name(other)
        ))),
    }
}

fn index_value(receiver: &Value, key: &Value) -> Result<Value> {
    match (receiver, key) {
        (Value::Array(items), Value::Number(number)) => {
            let idx = number
                .as_i64()
                .ok_or_else(|| ExprError::Type("list index must be an integer".to_owned()))?;
            usize::try_from(idx)
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned()
                .ok_or_else(|| {
                    ExprError::Eval(format!("index {idx} out of range for list of {}", items.len()))
                })
        }
        (Value::Object(map), Value::String(name)) => map
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::NoSuchKey(name.clone())),
        (target, key) => Err(ExprError::Type(format!(
            "cannot index {} with {}",
            type_name(target),
            type_name(key)
        ))),
    }
}

fn membership(needle: &Value, haystack: &Value) -> Result<Value> {
    match haystack {
        Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| values_equal(item, needle)))),
        Value::Object(map) => match needle {
            Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
            _ => Ok(Value::Bool(false)),
        },
        other => Err(ExprError::Type(format!(
            "'in' expects a list or map, got {}",
            type_name(other)
        ))),
    }
}

fn size(value: &Value) -> Result<Value> {
    let len = match value {
        Value::String(text) => text.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(ExprError::Type(format!(
                "size() not defined for {}",
                type_name(other)
            )));
        }
    };
    Ok(Value::from(len as u64))
}

fn to_int(value: &Value) -> Result<Value> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64))
            .map(Value::from)
            .ok_or_else(|| ExprError::Eval(format!("cannot convert {number} to int"))),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|err| ExprError::Eval(format!("cannot convert {text:?} to int: {err}"))),
        Value::Bool(flag) => Ok(Value::from(i64::from(*flag))),
        other => Err(ExprError::Type(format!(
            "int() not defined for {}",
            type_name(other)
        ))),
    }
}

fn to_double(value: &Value) -> Result<Value> {
    let float = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    float
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ExprError::Eval(format!("cannot convert {} to double", display(value))))
}

fn negate(number: &Number) -> Result<Value> {
    if let Some(int) = number.as_i64() {
        return int
            .checked_neg()
            .map(Value::from)
            .ok_or_else(|| ExprError::Eval("integer overflow".to_owned()));
    }
    number
        .as_f64()
        .and_then(|float| Number::from_f64(-float))
        .map(Value::Number)
        .ok_or_else(|| ExprError::Eval(format!("cannot negate {number}")))
}

fn add(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::String(mut left), Value::String(right)) => {
            left.push_str(&right);
            Ok(Value::String(left))
        }
        (Value::Array(mut left), Value::Array(right)) => {
            left.extend(right);
            Ok(Value::Array(left))
        }
        (left, right) => arithmetic(BinaryOp::Add, &left, &right),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    let (Value::Number(left), Value::Number(right)) = (lhs, rhs) else {
        return Err(ExprError::Type(format!(
            "{op:?} not defined for {} and {}",
            type_name(lhs),
            type_name(rhs)
        )));
    };

    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        let result = match op {
            BinaryOp::Add => left.checked_add(right),
            BinaryOp::Sub => left.checked_sub(right),
            BinaryOp::Mul => left.checked_mul(right),
            BinaryOp::Div if right == 0 => {
                return Err(ExprError::Eval("division by zero".to_owned()));
            }
            BinaryOp::Div => left.checked_div(right),
            BinaryOp::Rem if right == 0 => {
                return Err(ExprError::Eval("modulus by zero".to_owned()));
            }
            BinaryOp::Rem => left.checked_rem(right),
            _ => None,
        };
        return result
            .map(Value::from)
            .ok_or_else(|| ExprError::Eval(format!("integer overflow in {op:?}")));
    }

    let (Some(left), Some(right)) = (left.as_f64(), right.as_f64()) else {
        return Err(ExprError::Eval("non-numeric operand".to_owned()));
    };
    let result = match op {
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Mul => left * right,
        BinaryOp::Div => left / right,
        BinaryOp::Rem => left % right,
        _ => return Err(ExprError::Type(format!("{op:?} is not arithmetic"))),
    };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| ExprError::Eval(format!("{op:?} produced a non-finite result")))
}

/// Structural equality with numeric coercion (`1 == 1.0`).
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(left), Value::Number(right)) => {
            match (left.as_i64(), right.as_i64()) {
                (Some(left), Some(right)) => left == right,
                _ => left.as_f64() == right.as_f64(),
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(lhs_item, rhs_item)| values_equal(lhs_item, rhs_item))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, lhs_value)| {
                    right
                        .get(key)
                        .is_some_and(|rhs_value| values_equal(lhs_value, rhs_value))
                })
        }
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    match (lhs, rhs) {
        (Value::Number(left), Value::Number(right)) => {
            if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
                return Ok(left.cmp(&right));
            }
            left.as_f64()
                .zip(right.as_f64())
                .and_then(|(left, right)| left.partial_cmp(&right))
                .ok_or_else(|| ExprError::Eval("incomparable numbers".to_owned()))
        }
        (Value::String(left), Value::String(right)) => Ok(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Ok(left.cmp(right)),
        _ => Err(ExprError::Type(format!(
            "cannot compare {} with {}",
            type_name(lhs),
            type_name(rhs)
        ))),
    }
}

/// Human-readable type name of a value.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "double",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn run(source: &str, bindings: &Value) -> Result<Value> {
        let Value::Object(map) = bindings else {
            panic!("bindings must be an object");
        };
        let expr = match parse(source) {
            Ok(expr) => expr,
            Err(error) => panic!("parse failed: {error}"),
        };
        evaluate(&expr, map)
    }

    fn truthy(source: &str, bindings: &Value) -> bool {
        match run(source, bindings) {
            Ok(Value::Bool(flag)) => flag,
            Ok(other) => panic!("{source} returned non-bool {other}"),
            Err(error) => panic!("{source} failed: {error}"),
        }
    }

    #[test]
    fn test_string_methods() {
        let env = json!({"stdout": "Hello, world\n"});
        assert!(truthy(r#"stdout.contains("world")"#, &env));
        assert!(truthy(r#"stdout.startsWith("Hello")"#, &env));
        assert!(truthy(r#"stdout.trim().endsWith("world")"#, &env));
        assert!(truthy(r#"stdout.matches("w\\w+d")"#, &env));
        assert!(!truthy(r#"stdout.contains("error")"#, &env));
    }

    #[test]
    fn test_regex_shorthand_escapes() {
        let env = json!({"stdout": "version 12"});
        assert!(truthy(r#"stdout.matches("\d+")"#, &env));
    }

    #[test]
    fn test_numeric_comparisons() {
        let env = json!({"exitCode": 0, "count": 3});
        assert!(truthy("exitCode == 0 && count > 2", &env));
        assert!(truthy("count * 2 == 6.0", &env));
        assert!(truthy("count % 2 == 1", &env));
    }

    #[test]
    fn test_json_navigation() {
        let env = json!({"json": {"items": [{"ok": true}, {"ok": false}], "name": "demo"}});
        assert!(truthy("size(json.items) == 2", &env));
        assert!(truthy("json.items.exists(item, item.ok)", &env));
        assert!(!truthy("json.items.all(item, item.ok)", &env));
        assert!(truthy("json.items.filter(item, !item.ok).size() == 1", &env));
        assert!(truthy(r#"json["name"] == "demo""#, &env));
        assert!(truthy(r#""name" in json && has(json.items)"#, &env));
        assert!(!truthy("has(json.missing)", &env));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let env = json!({"a": false});
        assert!(!truthy("a && missing.field", &env));
        assert!(truthy("!a || missing.field", &env));
    }

    #[test]
    fn test_missing_key_is_error() {
        let env = json!({"json": {}});
        assert!(matches!(
            run("json.absent == 1", &env),
            Err(ExprError::NoSuchKey(key)) if key == "absent"
        ));
    }

    #[test]
    fn test_unbound_variable() {
        assert!(matches!(
            run("nope", &json!({})),
            Err(ExprError::UnboundVariable(_))
        ));
    }

    #[test]
    fn test_type_errors() {
        let env = json!({"stdout": "x"});
        assert!(matches!(run("stdout && true", &env), Err(ExprError::Type(_))));
        assert!(matches!(run("1 / 0", &env), Err(ExprError::Eval(_))));
    }

    #[test]
    fn test_conversions() {
        let env = json!({"stdout": " 42\n"});
        assert!(truthy("int(stdout) == 42", &env));
        assert!(truthy(r#"string(42) == "42""#, &env));
        assert!(truthy(r#"type(1.5) == "double""#, &env));
    }
}
