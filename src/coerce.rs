//! Type-directed fix-ups of raw document values.
//!
//! YAML cannot express every wire type directly: 64-bit integers
//! are written as strings so they survive parsers that round-trip
//! numbers through doubles, octet strings use a legacy text
//! encoding, and booleans may arrive as 0/1. The coercer rewrites
//! such literals once the schema has resolved a canonical type,
//! and leaves everything else untouched.

use crate::errors::SuiteError;
use crate::schema::{FieldType, WireType};
use crate::value::Value;
use crate::vars::VariableStore;
use indexmap::IndexMap;

/// Struct sub-fields with this name are "add as-is" markers
/// (fabric-index overrides) and bypass coercion entirely.
pub const FABRIC_INDEX_MARKER: &str = "FabricIndex";

/// Coerce `value` toward `ty`, recursing into maps and sequences.
///
/// A string that names a declared variable is a reference, not a
/// literal, and passes through so the placeholder resolver can
/// substitute it later. `FieldType::Unknown` disables all
/// fix-ups for the subtree.
pub fn coerce(value: &Value, ty: &FieldType, vars: &VariableStore) -> Result<Value, SuiteError> {
    match ty {
        FieldType::Unknown => Ok(value.clone()),
        FieldType::Scalar(wire) => coerce_scalar(value, wire, vars),
        FieldType::Struct(fields) => match value {
            Value::Map(map) => {
                let mut out = IndexMap::new();
                for (key, sub_value) in map {
                    if key == FABRIC_INDEX_MARKER {
                        out.insert(key.clone(), sub_value.clone());
                        continue;
                    }
                    let sub_ty = fields.get(key).cloned().unwrap_or(FieldType::Unknown);
                    out.insert(key.clone(), coerce(sub_value, &sub_ty, vars)?);
                }
                Ok(Value::Map(out))
            }
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(coerce(item, ty, vars)?);
                }
                Ok(Value::List(out))
            }
            other => Ok(other.clone()),
        },
    }
}

fn coerce_scalar(value: &Value, wire: &WireType, vars: &VariableStore) -> Result<Value, SuiteError> {
    // Every element of a sequence shares the declared type.
    if let Value::List(items) = value {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(coerce_scalar(item, wire, vars)?);
        }
        return Ok(Value::List(out));
    }

    // A struct value under a scalar type happens for unseen
    // shapes; recurse field-by-field with the same type so nested
    // literals still get fixed up.
    if let Value::Map(map) = value {
        let mut out = IndexMap::new();
        for (key, sub_value) in map {
            if key == FABRIC_INDEX_MARKER {
                out.insert(key.clone(), sub_value.clone());
            } else {
                out.insert(key.clone(), coerce_scalar(sub_value, wire, vars)?);
            }
        }
        return Ok(Value::Map(out));
    }

    let Value::Str(text) = value else {
        if wire.is_boolean() {
            return Ok(coerce_boolean(value));
        }
        return Ok(value.clone());
    };

    // Variable references are substituted later, never coerced.
    // This covers both a bare name and a multi-token placeholder
    // expression mentioning one.
    if vars.is_declared(text)
        || text
            .split_whitespace()
            .any(|token| vars.is_declared(token))
    {
        return Ok(value.clone());
    }

    if wire.is_wide_integer() {
        let parsed = text
            .parse::<i128>()
            .map_err(|e| SuiteError::BadLiteral {
                literal: text.clone(),
                wire_type: wire.tag(),
                reason: e.to_string(),
            })?;
        return Ok(Value::Int(parsed));
    }

    if wire.is_float() {
        let parsed = text
            .parse::<f64>()
            .map_err(|e| SuiteError::BadLiteral {
                literal: text.clone(),
                wire_type: wire.tag(),
                reason: e.to_string(),
            })?;
        return Ok(Value::Float(parsed));
    }

    if wire.is_octet_string() {
        return decode_octet_string(text).map(Value::Bytes);
    }

    if wire.is_boolean() {
        return Ok(coerce_boolean(value));
    }

    Ok(value.clone())
}

/// Legacy text-to-bytes encoding for octet strings.
///
/// A `hex:` prefix hex-decodes the remainder. Otherwise each
/// character becomes one byte: code points >= 0x200 are rejected,
/// code points above 0xFF keep only the low byte. Both behaviors
/// are a compatibility contract with the historical encoder.
pub fn decode_octet_string(text: &str) -> Result<Vec<u8>, SuiteError> {
    if let Some(hex) = text.strip_prefix("hex:") {
        return decode_hex(hex).map_err(|reason| SuiteError::BadLiteral {
            literal: text.to_string(),
            wire_type: "octet_string".to_string(),
            reason,
        });
    }

    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code = ch as u32;
        if code >= 0x200 {
            return Err(SuiteError::UnsupportedOctetChar {
                literal: text.to_string(),
                codepoint: code,
            });
        }
        bytes.push((code & 0xFF) as u8);
    }
    Ok(bytes)
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    let digits: Vec<u8> = hex
        .chars()
        .map(|c| {
            c.to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| format!("invalid hex digit '{c}'"))
        })
        .collect::<Result<_, _>>()?;
    Ok(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

fn coerce_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(_) => value.clone(),
        Value::Int(i) => Value::Bool(*i != 0),
        Value::Float(f) => Value::Bool(*f != 0.0),
        Value::Str(s) => match s.as_str() {
            "true" | "True" | "1" => Value::Bool(true),
            "false" | "False" | "0" => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}
