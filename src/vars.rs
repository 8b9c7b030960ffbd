//! Ordered name-to-value variable store.
//!
//! Two instances exist per suite run: the parse-time store is
//! populated while the suite is read (config entries plus
//! forward-declared `saveAs` names) and frozen afterwards; the
//! runtime store starts as a copy and is mutated as steps save
//! values.

use crate::value::Value;
use indexmap::IndexMap;
use tracing::debug;

/// An ordered mapping of variable names to values. A name may be
/// declared without a value yet (`saveAs` targets before the step
/// that produces them has run).
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    entries: IndexMap<String, Option<Value>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a name without binding it. Existing bindings are
    /// left untouched.
    pub fn declare(&mut self, name: &str) {
        self.entries.entry(name.to_string()).or_insert(None);
    }

    /// Bind `name` to `value`, declaring it if needed.
    pub fn set(&mut self, name: &str, value: Value) {
        debug!("variable '{}' = {}", name, value);
        self.entries.insert(name.to_string(), Some(value));
    }

    /// The current value bound to `name`, if any. Declared-unbound
    /// names return `None`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).and_then(|slot| slot.as_ref())
    }

    /// True when `name` is declared, bound or not. Literal
    /// detection in the coercer uses this so forward-declared
    /// `saveAs` names are never coerced as plain literals.
    pub fn is_declared(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// True when `name` currently has a value.
    pub fn is_bound(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
