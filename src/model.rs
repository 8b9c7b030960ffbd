//! Raw suite document model.
//!
//! Mirrors the YAML shape of a conformance test suite: a name, an
//! optional PICS gate, a `config:` section seeding the variable
//! store, and an ordered list of step documents. Schema resolution
//! and coercion happen later, in [`crate::step`].

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

/// A parsed (but not yet schema-resolved) test suite document.
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteDoc {
    pub name: String,
    /// PICS expression(s) gating the whole suite. Carried
    /// verbatim; evaluating them is the external runner's job.
    #[serde(rename = "PICS", default)]
    pub pics: Option<PicsDoc>,
    /// Variable seeds: `name: value` or `name: {defaultValue: v}`.
    #[serde(default)]
    pub config: IndexMap<String, ConfigEntry>,
    #[serde(default)]
    pub tests: Vec<StepDoc>,
}

impl SuiteDoc {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// A PICS gate: a single expression or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PicsDoc {
    One(String),
    Many(Vec<String>),
}

impl PicsDoc {
    pub fn expressions(&self) -> Vec<&str> {
        match self {
            PicsDoc::One(s) => vec![s.as_str()],
            PicsDoc::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

/// One entry of the `config:` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConfigEntry {
    Defaulted {
        #[serde(rename = "defaultValue")]
        default_value: Value,
    },
    Plain(Value),
}

impl ConfigEntry {
    pub fn value(&self) -> &Value {
        match self {
            ConfigEntry::Defaulted { default_value } => default_value,
            ConfigEntry::Plain(value) => value,
        }
    }
}

/// One raw test step, exactly as written in the suite document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDoc {
    pub label: String,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub node_id: Option<u64>,
    #[serde(default)]
    pub group_id: Option<u64>,
    #[serde(default)]
    pub endpoint: Option<u64>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub fabric_filtered: bool,
    #[serde(default)]
    pub verification: Option<String>,
    #[serde(rename = "PICS", default)]
    pub pics: Option<String>,
    #[serde(default)]
    pub arguments: Option<ArgumentsDoc>,
    #[serde(default)]
    pub response: Option<ResponseDoc>,
    #[serde(default)]
    pub min_interval: Option<u64>,
    #[serde(default)]
    pub max_interval: Option<u64>,
    #[serde(default)]
    pub timed_interaction_timeout_ms: Option<u64>,
    #[serde(default)]
    pub busy_wait_ms: Option<u64>,
}

/// `arguments:` block — either a uniform `values:` list or the
/// single-`value:` shorthand. Both present is a construction
/// error caught in [`crate::step`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArgumentsDoc {
    #[serde(default)]
    pub values: Option<Vec<ValueSpecDoc>>,
    #[serde(default, deserialize_with = "explicit_value")]
    pub value: Option<Value>,
}

/// `response:` block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDoc {
    #[serde(default)]
    pub values: Option<Vec<ValueSpecDoc>>,
    #[serde(default, deserialize_with = "explicit_value")]
    pub value: Option<Value>,
    /// Constraints attached to the single-value shorthand.
    #[serde(default)]
    pub constraints: Option<IndexMap<String, Value>>,
    #[serde(default)]
    pub save_as: Option<String>,
    /// Expected top-level status code name.
    #[serde(default)]
    pub error: Option<String>,
    /// Expected cluster-specific status code.
    #[serde(default)]
    pub cluster_error: Option<i64>,
}

/// One named value inside `arguments.values` or `response.values`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSpecDoc {
    pub name: String,
    #[serde(default, deserialize_with = "explicit_value")]
    pub value: Option<Value>,
    #[serde(default)]
    pub constraints: Option<IndexMap<String, Value>>,
    #[serde(default)]
    pub save_as: Option<String>,
}

/// Keeps `value: null` distinguishable from an absent `value:`
/// key — an explicit null is a real expectation.
fn explicit_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}
