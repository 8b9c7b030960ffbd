//! Placeholder substitution at step-materialization time.
//!
//! Variable names inside argument values, expected response
//! values, and constraint parameters are replaced with their
//! current runtime bindings just before a step is dispatched. A
//! pure function of the literal tree and the store; no side
//! effects.

use crate::errors::SuiteError;
use crate::expr;
use crate::value::Value;
use crate::vars::VariableStore;
use indexmap::IndexMap;

/// Substitute bound variable names in `value`.
///
/// Maps and sequences keep their shape; the scalar rule applies at
/// string leaves:
/// - a single token that names a bound variable becomes the bound
///   value itself, preserving its native type;
/// - multiple tokens with at least one bound name are substituted
///   token-by-token (string form) and the result must parse as a
///   restricted arithmetic expression, yielding its numeric value;
/// - everything else passes through unchanged.
pub fn resolve(value: &Value, vars: &VariableStore) -> Result<Value, SuiteError> {
    match value {
        Value::Str(text) => resolve_str(text, vars),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve(item, vars)?);
            }
            Ok(Value::List(out))
        }
        Value::Map(map) => {
            let mut out = IndexMap::new();
            for (key, sub) in map {
                out.insert(key.clone(), resolve(sub, vars)?);
            }
            Ok(Value::Map(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_str(text: &str, vars: &VariableStore) -> Result<Value, SuiteError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.len() {
        0 => Ok(Value::Str(text.to_string())),
        1 => match vars.get(tokens[0]) {
            Some(bound) => Ok(bound.clone()),
            None => Ok(Value::Str(text.to_string())),
        },
        _ => {
            let mut matched = false;
            let substituted: Vec<String> = tokens
                .iter()
                .map(|token| match vars.get(token) {
                    Some(bound) => {
                        matched = true;
                        bound.to_string()
                    }
                    None => (*token).to_string(),
                })
                .collect();
            if !matched {
                return Ok(Value::Str(text.to_string()));
            }
            expr::evaluate(&substituted.join(" "))
        }
    }
}
