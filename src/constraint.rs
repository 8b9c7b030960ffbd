//! Per-field response constraint language.
//!
//! Each constraint kind declares the value kinds it accepts,
//! whether a null actual value satisfies it, and a kind-specific
//! predicate. The kind-specific predicate only ever runs on a
//! non-null value of an accepted kind.

use crate::errors::{DiagnosticContext, SuiteError};
use crate::schema::WireType;
use crate::value::{Value, ValueKind};
use crate::vars::VariableStore;
use indexmap::IndexMap;

/// The wire-compatible constraint key vocabulary. Keys outside
/// this list fail suite construction.
pub const CONSTRAINT_KEYS: &[&str] = &[
    "hasValue",
    "type",
    "minLength",
    "maxLength",
    "isHexString",
    "startsWith",
    "endsWith",
    "isUpperCase",
    "isLowerCase",
    "minValue",
    "maxValue",
    "contains",
    "excludes",
    "hasMasksSet",
    "hasMasksClear",
    "notValue",
];

/// One named check against a response value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Type(WireType),
    MinLength(usize),
    MaxLength(usize),
    IsHexString(bool),
    StartsWith(String),
    EndsWith(String),
    IsUpperCase(bool),
    IsLowerCase(bool),
    MinValue(Value),
    MaxValue(Value),
    Contains(Vec<Value>),
    Excludes(Vec<Value>),
    HasMasksSet(Vec<Value>),
    HasMasksClear(Vec<Value>),
    NotValue(Value),
    /// Present in the vocabulary but has no evaluator.
    HasValue(bool),
}

impl Constraint {
    /// Parse every entry of a `constraints:` block, failing fast
    /// on unknown keys or malformed argument shapes. `vars` tells
    /// the bound parameters which strings are placeholder
    /// expressions rather than bad literals.
    pub fn parse_all(
        block: &IndexMap<String, Value>,
        vars: &VariableStore,
    ) -> Result<Vec<Constraint>, SuiteError> {
        let mut constraints = Vec::with_capacity(block.len());
        for (key, arg) in block {
            constraints.push(Self::parse(key, arg, block, vars)?);
        }
        Ok(constraints)
    }

    fn parse(
        key: &str,
        arg: &Value,
        block: &IndexMap<String, Value>,
        vars: &VariableStore,
    ) -> Result<Constraint, SuiteError> {
        let malformed = |reason: &str| SuiteError::MalformedConstraint {
            key: key.to_string(),
            reason: reason.to_string(),
            context: DiagnosticContext::new(block.clone(), key),
        };

        match key {
            "hasValue" => match arg {
                Value::Bool(b) => Ok(Constraint::HasValue(*b)),
                _ => Err(malformed("expected a boolean")),
            },
            "type" => match arg {
                Value::Str(tag) => WireType::parse(tag)
                    .map(Constraint::Type)
                    .ok_or_else(|| malformed("not a canonical wire type tag")),
                _ => Err(malformed("expected a wire type tag string")),
            },
            "minLength" => parse_length(arg).map(Constraint::MinLength).ok_or_else(|| {
                malformed("expected a non-negative integer")
            }),
            "maxLength" => parse_length(arg).map(Constraint::MaxLength).ok_or_else(|| {
                malformed("expected a non-negative integer")
            }),
            "isHexString" => match arg {
                Value::Bool(b) => Ok(Constraint::IsHexString(*b)),
                _ => Err(malformed("expected a boolean")),
            },
            "startsWith" => match arg {
                Value::Str(s) => Ok(Constraint::StartsWith(s.clone())),
                _ => Err(malformed("expected a string")),
            },
            "endsWith" => match arg {
                Value::Str(s) => Ok(Constraint::EndsWith(s.clone())),
                _ => Err(malformed("expected a string")),
            },
            "isUpperCase" => match arg {
                Value::Bool(b) => Ok(Constraint::IsUpperCase(*b)),
                _ => Err(malformed("expected a boolean")),
            },
            "isLowerCase" => match arg {
                Value::Bool(b) => Ok(Constraint::IsLowerCase(*b)),
                _ => Err(malformed("expected a boolean")),
            },
            // Bound parameters may be placeholder strings that
            // resolve to numbers at materialization time; a string
            // naming no declared variable can never become one.
            "minValue" => match arg {
                Value::Int(_) | Value::Float(_) => Ok(Constraint::MinValue(arg.clone())),
                Value::Str(s) if is_placeholder(s, vars) => {
                    Ok(Constraint::MinValue(arg.clone()))
                }
                _ => Err(malformed("expected a number or a variable expression")),
            },
            "maxValue" => match arg {
                Value::Int(_) | Value::Float(_) => Ok(Constraint::MaxValue(arg.clone())),
                Value::Str(s) if is_placeholder(s, vars) => {
                    Ok(Constraint::MaxValue(arg.clone()))
                }
                _ => Err(malformed("expected a number or a variable expression")),
            },
            "contains" => Ok(Constraint::Contains(as_list(arg))),
            "excludes" => Ok(Constraint::Excludes(as_list(arg))),
            "hasMasksSet" => Ok(Constraint::HasMasksSet(as_list(arg))),
            "hasMasksClear" => Ok(Constraint::HasMasksClear(as_list(arg))),
            "notValue" => Ok(Constraint::NotValue(arg.clone())),
            unknown => Err(SuiteError::UnknownConstraint {
                key: unknown.to_string(),
                context: DiagnosticContext::new(block.clone(), unknown),
            }),
        }
    }

    /// The constraint key this variant answers to.
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::Type(_) => "type",
            Constraint::MinLength(_) => "minLength",
            Constraint::MaxLength(_) => "maxLength",
            Constraint::IsHexString(_) => "isHexString",
            Constraint::StartsWith(_) => "startsWith",
            Constraint::EndsWith(_) => "endsWith",
            Constraint::IsUpperCase(_) => "isUpperCase",
            Constraint::IsLowerCase(_) => "isLowerCase",
            Constraint::MinValue(_) => "minValue",
            Constraint::MaxValue(_) => "maxValue",
            Constraint::Contains(_) => "contains",
            Constraint::Excludes(_) => "excludes",
            Constraint::HasMasksSet(_) => "hasMasksSet",
            Constraint::HasMasksClear(_) => "hasMasksClear",
            Constraint::NotValue(_) => "notValue",
            Constraint::HasValue(_) => "hasValue",
        }
    }

    /// The value kinds this constraint can check. Empty means any.
    fn accepted_kinds(&self) -> &'static [ValueKind] {
        match self {
            Constraint::Type(_) | Constraint::NotValue(_) | Constraint::HasValue(_) => &[],
            Constraint::MinLength(_) | Constraint::MaxLength(_) => {
                &[ValueKind::Str, ValueKind::Bytes, ValueKind::List]
            }
            Constraint::IsHexString(_)
            | Constraint::StartsWith(_)
            | Constraint::EndsWith(_)
            | Constraint::IsUpperCase(_)
            | Constraint::IsLowerCase(_) => &[ValueKind::Str],
            Constraint::MinValue(_) | Constraint::MaxValue(_) => {
                &[ValueKind::Int, ValueKind::Float]
            }
            Constraint::Contains(_) | Constraint::Excludes(_) => &[ValueKind::List],
            Constraint::HasMasksSet(_) | Constraint::HasMasksClear(_) => &[ValueKind::Int],
        }
    }

    fn accepts_null(&self) -> bool {
        matches!(
            self,
            Constraint::Type(_)
                | Constraint::NotValue(_)
                | Constraint::MinValue(_)
                | Constraint::MaxValue(_)
        )
    }

    /// Evaluate this constraint against an actual response value.
    ///
    /// The type-acceptance check runs before the kind-specific
    /// predicate; a kind mismatch on a non-null value never
    /// reaches the predicate. Evaluating `hasValue` is a fatal
    /// configuration error.
    pub fn is_met(&self, actual: &Value) -> Result<bool, SuiteError> {
        if matches!(self, Constraint::HasValue(_)) {
            return Err(SuiteError::UnsupportedConstraint);
        }
        if actual.is_null() {
            return Ok(self.accepts_null());
        }
        let kinds = self.accepted_kinds();
        if !kinds.is_empty() && !kinds.contains(&actual.kind()) {
            return Ok(false);
        }
        Ok(self.check(actual))
    }

    fn check(&self, actual: &Value) -> bool {
        match self {
            Constraint::Type(declared) => type_matches(declared, actual),
            Constraint::MinLength(bound) => actual.length().is_some_and(|len| len >= *bound),
            Constraint::MaxLength(bound) => actual.length().is_some_and(|len| len <= *bound),
            Constraint::IsHexString(expected) => {
                // Universally quantified, so the empty string is
                // vacuously hex.
                let is_hex = actual
                    .as_str()
                    .is_some_and(|s| s.chars().all(|c| c.is_ascii_hexdigit()));
                is_hex == *expected
            }
            Constraint::StartsWith(prefix) => {
                actual.as_str().is_some_and(|s| s.starts_with(prefix))
            }
            Constraint::EndsWith(suffix) => actual.as_str().is_some_and(|s| s.ends_with(suffix)),
            Constraint::IsUpperCase(expected) => {
                let is_upper = actual
                    .as_str()
                    .is_some_and(|s| !s.chars().any(|c| c.is_lowercase()));
                is_upper == *expected
            }
            Constraint::IsLowerCase(expected) => {
                let is_lower = actual
                    .as_str()
                    .is_some_and(|s| !s.chars().any(|c| c.is_uppercase()));
                is_lower == *expected
            }
            Constraint::MinValue(bound) => match (actual.as_f64(), bound.as_f64()) {
                (Some(a), Some(b)) => a >= b,
                _ => false,
            },
            Constraint::MaxValue(bound) => match (actual.as_f64(), bound.as_f64()) {
                (Some(a), Some(b)) => a <= b,
                _ => false,
            },
            Constraint::Contains(declared) => match actual {
                Value::List(items) => declared
                    .iter()
                    .all(|needle| items.iter().any(|item| item.loosely_equals(needle))),
                _ => false,
            },
            Constraint::Excludes(declared) => match actual {
                Value::List(items) => !declared
                    .iter()
                    .any(|needle| items.iter().any(|item| item.loosely_equals(needle))),
                _ => false,
            },
            Constraint::HasMasksSet(masks) => match actual.as_int() {
                Some(v) => masks
                    .iter()
                    .all(|mask| mask.as_int().is_some_and(|m| v & m == m)),
                None => false,
            },
            Constraint::HasMasksClear(masks) => match actual.as_int() {
                Some(v) => masks
                    .iter()
                    .all(|mask| mask.as_int().is_some_and(|m| v & m == 0)),
                None => false,
            },
            Constraint::NotValue(declared) => !actual.loosely_equals(declared),
            Constraint::HasValue(_) => unreachable!("rejected before dispatch"),
        }
    }
}

fn type_matches(declared: &WireType, actual: &Value) -> bool {
    if let Some((min, max)) = declared.bounds() {
        return matches!(actual, Value::Int(i) if *i >= min && *i <= max);
    }
    if declared.is_float() {
        return matches!(actual, Value::Float(_) | Value::Int(_));
    }
    if declared.is_char_string() {
        return matches!(actual, Value::Str(_));
    }
    if declared.is_octet_string() {
        return matches!(actual, Value::Bytes(_));
    }
    if declared.is_boolean() {
        return matches!(actual, Value::Bool(_));
    }
    if declared.is_list() {
        return matches!(actual, Value::List(_));
    }
    false
}

/// True when `text` references at least one declared variable,
/// either as the whole string or as a whitespace token of an
/// arithmetic expression.
fn is_placeholder(text: &str, vars: &VariableStore) -> bool {
    vars.is_declared(text) || text.split_whitespace().any(|token| vars.is_declared(token))
}

fn parse_length(arg: &Value) -> Option<usize> {
    match arg {
        Value::Int(i) if *i >= 0 => usize::try_from(*i).ok(),
        _ => None,
    }
}

/// Scalar constraint arguments are promoted to single-element
/// lists so `contains: 3` and `contains: [3]` mean the same thing.
fn as_list(arg: &Value) -> Vec<Value> {
    match arg {
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    }
}
