//! Suite construction error taxonomy and located diagnostics.
//!
//! Construction-time problems (unknown constraint key, malformed
//! arguments, mutually exclusive fields) are fatal to loading a
//! suite and carry a [`DiagnosticContext`] pointing at the
//! offending key inside a copy of the surrounding document
//! fragment. Run-time validation outcomes are never represented
//! here; they accumulate as entries in a
//! [`PostProcessResult`](crate::validator::PostProcessResult).

use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

/// A fatal error raised while constructing a test suite.
#[derive(Debug, Error)]
pub enum SuiteError {
    /// A constraint block used a key outside the wire-compatible
    /// constraint vocabulary.
    #[error("unknown constraint '{key}'\n{context}")]
    UnknownConstraint {
        key: String,
        context: DiagnosticContext,
    },

    /// A constraint key was recognized but its argument had the
    /// wrong shape (e.g. `minValue: [1, 2]`).
    #[error("malformed argument for constraint '{key}': {reason}\n{context}")]
    MalformedConstraint {
        key: String,
        reason: String,
        context: DiagnosticContext,
    },

    /// `value` and `values` (or `error` next to a success shape)
    /// were both present where only one is allowed.
    #[error("fields '{first}' and '{second}' are mutually exclusive in step '{label}'")]
    MutuallyExclusiveFields {
        label: String,
        first: String,
        second: String,
    },

    /// The `hasValue` constraint is part of the vocabulary but has
    /// no evaluator; reaching it at run time is a configuration
    /// error, not a validation failure.
    #[error("constraint 'hasValue' is not supported by this engine")]
    UnsupportedConstraint,

    /// A character outside the legacy octet-string alphabet
    /// (code point >= 0x200) appeared in an octet-string literal.
    #[error("unsupported character u+{codepoint:04X} in octet string literal '{literal}'")]
    UnsupportedOctetChar { literal: String, codepoint: u32 },

    /// A string literal could not be coerced to the wire type the
    /// schema resolved for its field.
    #[error("cannot coerce '{literal}' to {wire_type}: {reason}")]
    BadLiteral {
        literal: String,
        wire_type: String,
        reason: String,
    },

    /// A multi-token placeholder string substituted at least one
    /// variable but the result was not a valid arithmetic
    /// expression.
    #[error("invalid arithmetic expression '{expr}': {reason}")]
    BadExpression { expr: String, reason: String },

    /// Catch-all for malformed step documents (bad target, missing
    /// name on a values entry, and similar shape problems).
    #[error("malformed step '{label}': {reason}")]
    MalformedStep { label: String, reason: String },
}

/// A rendered view of the document fragment surrounding a
/// construction error, with the offending key marked.
///
/// The fragment is an order-preserving copy of the original
/// mapping; rendering walks it in document order and prefixes the
/// highlighted key, so no entry ever has to be removed and
/// reinserted to keep its position.
#[derive(Debug, Clone)]
pub struct DiagnosticContext {
    pub fragment: IndexMap<String, Value>,
    pub highlighted_key: String,
}

impl DiagnosticContext {
    pub fn new(fragment: IndexMap<String, Value>, highlighted_key: impl Into<String>) -> Self {
        Self {
            fragment,
            highlighted_key: highlighted_key.into(),
        }
    }
}

impl fmt::Display for DiagnosticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "in fragment:")?;
        for (key, value) in &self.fragment {
            let marker = if *key == self.highlighted_key {
                ">>> "
            } else {
                "    "
            };
            writeln!(f, "{marker}{key}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_context_marks_offending_key() {
        let mut fragment = IndexMap::new();
        fragment.insert("minValue".to_string(), Value::Int(1));
        fragment.insert("badKey".to_string(), Value::Int(2));
        fragment.insert("maxValue".to_string(), Value::Int(3));

        let ctx = DiagnosticContext::new(fragment, "badKey");
        let rendered = ctx.to_string();

        assert!(rendered.contains(">>> badKey: 2"));
        assert!(rendered.contains("    minValue: 1"));
        assert!(rendered.contains("    maxValue: 3"));

        // Order of the original fragment is preserved.
        let min_pos = rendered.find("minValue").unwrap();
        let bad_pos = rendered.find("badKey").unwrap();
        let max_pos = rendered.find("maxValue").unwrap();
        assert!(min_pos < bad_pos && bad_pos < max_pos);
    }

    #[test]
    fn unknown_constraint_message_contains_key_and_fragment() {
        let mut fragment = IndexMap::new();
        fragment.insert("frobnicate".to_string(), Value::Bool(true));

        let err = SuiteError::UnknownConstraint {
            key: "frobnicate".to_string(),
            context: DiagnosticContext::new(fragment, "frobnicate"),
        };
        let msg = err.to_string();
        assert!(msg.contains("unknown constraint 'frobnicate'"));
        assert!(msg.contains(">>> frobnicate"));
    }
}
