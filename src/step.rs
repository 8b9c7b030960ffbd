//! Parse-time and runtime step models.
//!
//! A [`StepDefinition`] is built once when the suite is parsed:
//! shorthand is normalized, the schema resolves a field-type
//! mapping, literals are coerced, `saveAs` targets are
//! forward-declared, and every constraint block gets an early
//! sanity parse so a malformed suite fails before anything runs.
//! A [`Step`] is the runtime copy materialized lazily per
//! iteration with placeholders substituted, ready to dispatch.

use crate::coerce;
use crate::constraint::Constraint;
use crate::errors::SuiteError;
use crate::model::{ArgumentsDoc, ResponseDoc, StepDoc, ValueSpecDoc};
use crate::resolve;
use crate::schema::{FieldType, SchemaRegistry};
use crate::value::Value;
use crate::vars::VariableStore;
use indexmap::IndexMap;

/// Constraint keys whose arguments are field values, and so get
/// the same coercion and substitution treatment as the field
/// itself.
const VALUE_PARAM_KEYS: &[&str] = &[
    "minValue",
    "maxValue",
    "notValue",
    "contains",
    "excludes",
    "hasMasksSet",
    "hasMasksClear",
];

/// What a step addresses on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTarget {
    Command(String),
    Attribute(String),
    Event(String),
    /// Steps with no cluster interaction (waits, prompts).
    None,
}

impl StepTarget {
    pub fn name(&self) -> Option<&str> {
        match self {
            StepTarget::Command(n) | StepTarget::Attribute(n) | StepTarget::Event(n) => Some(n),
            StepTarget::None => None,
        }
    }
}

/// One named value inside arguments or response, after shorthand
/// normalization and literal coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub name: String,
    pub value: Option<Value>,
    pub constraints: Option<IndexMap<String, Value>>,
    pub save_as: Option<String>,
}

/// Expected response shape of a step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSpec {
    pub values: Vec<ValueSpec>,
    pub error: Option<String>,
    pub cluster_error: Option<i64>,
}

/// An immutable, schema-resolved test action.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub label: String,
    pub disabled: bool,
    pub optional: bool,
    pub fabric_filtered: bool,
    pub cluster: Option<String>,
    pub target: StepTarget,
    pub node_id: Option<u64>,
    pub group_id: Option<u64>,
    pub endpoint: Option<u64>,
    pub pics: Option<String>,
    pub verification: Option<String>,
    pub min_interval: Option<u64>,
    pub max_interval: Option<u64>,
    pub timed_interaction_timeout_ms: Option<u64>,
    pub busy_wait_ms: Option<u64>,
    pub arguments: Vec<ValueSpec>,
    pub response: ResponseSpec,
    field_types: FieldType,
}

impl StepDefinition {
    /// Build a definition from a raw step document.
    ///
    /// `parse_vars` is the parse-time variable store; `saveAs`
    /// targets found here are declared into it so later steps can
    /// recognize them as variable references during coercion.
    pub fn from_doc(
        doc: StepDoc,
        schema: &dyn SchemaRegistry,
        parse_vars: &mut VariableStore,
    ) -> Result<Self, SuiteError> {
        if doc.disabled {
            // Inert: carries nothing beyond its label.
            return Ok(Self {
                label: doc.label,
                disabled: true,
                optional: false,
                fabric_filtered: false,
                cluster: None,
                target: StepTarget::None,
                node_id: None,
                group_id: None,
                endpoint: None,
                pics: None,
                verification: None,
                min_interval: None,
                max_interval: None,
                timed_interaction_timeout_ms: None,
                busy_wait_ms: None,
                arguments: Vec::new(),
                response: ResponseSpec::default(),
                field_types: FieldType::Unknown,
            });
        }

        let target = resolve_target(&doc)?;

        let field_types = match (&doc.cluster, target.name()) {
            (Some(cluster), Some(field)) => schema.resolve_field(cluster, field),
            _ => FieldType::Unknown,
        };

        let shorthand_name = match &target {
            StepTarget::Attribute(name) | StepTarget::Event(name) => name.clone(),
            _ => "value".to_string(),
        };
        let is_command = matches!(target, StepTarget::Command(_));

        let arguments = normalize_arguments(&doc.label, doc.arguments, &shorthand_name)?;
        let response = normalize_response(&doc.label, doc.response, &shorthand_name)?;

        // Forward-declare every saveAs target before coercing, so
        // a save in this step's own response is already known.
        for spec in &response.values {
            if let Some(name) = &spec.save_as {
                parse_vars.declare(name);
            }
        }

        let arguments = coerce_specs(arguments, &field_types, is_command, parse_vars)?;
        let response_values =
            coerce_specs(response.values, &field_types, is_command, parse_vars)?;
        let response = ResponseSpec {
            values: response_values,
            ..response
        };

        // Early sanity parse: a malformed constraint block fails
        // the whole suite before any step executes.
        for spec in &response.values {
            if let Some(block) = &spec.constraints {
                Constraint::parse_all(block, parse_vars)?;
            }
        }

        Ok(Self {
            label: doc.label,
            disabled: false,
            optional: doc.optional,
            fabric_filtered: doc.fabric_filtered,
            cluster: doc.cluster,
            target,
            node_id: doc.node_id,
            group_id: doc.group_id,
            endpoint: doc.endpoint,
            pics: doc.pics,
            verification: doc.verification,
            min_interval: doc.min_interval,
            max_interval: doc.max_interval,
            timed_interaction_timeout_ms: doc.timed_interaction_timeout_ms,
            busy_wait_ms: doc.busy_wait_ms,
            arguments,
            response,
            field_types,
        })
    }

    /// The resolved type mapping for this step's target.
    pub fn field_types(&self) -> &FieldType {
        &self.field_types
    }
}

/// A runtime step: same shape as its definition, with every
/// placeholder substituted against the current runtime store.
/// Created just before dispatch and discarded after validation.
#[derive(Debug, Clone)]
pub struct Step {
    pub label: String,
    pub disabled: bool,
    pub optional: bool,
    pub fabric_filtered: bool,
    pub cluster: Option<String>,
    pub target: StepTarget,
    pub node_id: Option<u64>,
    pub group_id: Option<u64>,
    pub endpoint: Option<u64>,
    pub pics: Option<String>,
    pub verification: Option<String>,
    pub min_interval: Option<u64>,
    pub max_interval: Option<u64>,
    pub timed_interaction_timeout_ms: Option<u64>,
    pub busy_wait_ms: Option<u64>,
    pub arguments: Vec<ValueSpec>,
    pub response: ResponseSpec,
}

impl Step {
    /// Deep-copy the definition and run placeholder resolution
    /// over argument values, expected response values, and
    /// constraint parameters.
    pub fn materialize(
        definition: &StepDefinition,
        vars: &VariableStore,
    ) -> Result<Self, SuiteError> {
        let arguments = definition
            .arguments
            .iter()
            .map(|spec| resolve_spec(spec, vars))
            .collect::<Result<Vec<_>, _>>()?;
        let response_values = definition
            .response
            .values
            .iter()
            .map(|spec| resolve_spec(spec, vars))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            label: definition.label.clone(),
            disabled: definition.disabled,
            optional: definition.optional,
            fabric_filtered: definition.fabric_filtered,
            cluster: definition.cluster.clone(),
            target: definition.target.clone(),
            node_id: definition.node_id,
            group_id: definition.group_id,
            endpoint: definition.endpoint,
            pics: definition.pics.clone(),
            verification: definition.verification.clone(),
            min_interval: definition.min_interval,
            max_interval: definition.max_interval,
            timed_interaction_timeout_ms: definition.timed_interaction_timeout_ms,
            busy_wait_ms: definition.busy_wait_ms,
            arguments,
            response: ResponseSpec {
                values: response_values,
                error: definition.response.error.clone(),
                cluster_error: definition.response.cluster_error,
            },
        })
    }

    /// Argument value by name, if present.
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|spec| spec.name == name)
            .and_then(|spec| spec.value.as_ref())
    }
}

fn resolve_target(doc: &StepDoc) -> Result<StepTarget, SuiteError> {
    let mut targets = Vec::new();
    if let Some(command) = &doc.command {
        targets.push(("command", StepTarget::Command(command.clone())));
    }
    if let Some(attribute) = &doc.attribute {
        targets.push(("attribute", StepTarget::Attribute(attribute.clone())));
    }
    if let Some(event) = &doc.event {
        targets.push(("event", StepTarget::Event(event.clone())));
    }
    if targets.len() > 1 {
        return Err(SuiteError::MutuallyExclusiveFields {
            label: doc.label.clone(),
            first: targets[0].0.to_string(),
            second: targets[1].0.to_string(),
        });
    }
    Ok(targets
        .pop()
        .map(|(_, target)| target)
        .unwrap_or(StepTarget::None))
}

fn normalize_arguments(
    label: &str,
    doc: Option<ArgumentsDoc>,
    shorthand_name: &str,
) -> Result<Vec<ValueSpec>, SuiteError> {
    let Some(doc) = doc else { return Ok(Vec::new()) };
    match (doc.values, doc.value) {
        (Some(_), Some(_)) => Err(SuiteError::MutuallyExclusiveFields {
            label: label.to_string(),
            first: "value".to_string(),
            second: "values".to_string(),
        }),
        (Some(values), None) => Ok(values.into_iter().map(value_spec_from_doc).collect()),
        (None, Some(value)) => Ok(vec![ValueSpec {
            name: shorthand_name.to_string(),
            value: Some(value),
            constraints: None,
            save_as: None,
        }]),
        (None, None) => Ok(Vec::new()),
    }
}

fn normalize_response(
    label: &str,
    doc: Option<ResponseDoc>,
    shorthand_name: &str,
) -> Result<ResponseSpec, SuiteError> {
    let Some(doc) = doc else {
        return Ok(ResponseSpec::default());
    };
    if doc.values.is_some() && doc.value.is_some() {
        return Err(SuiteError::MutuallyExclusiveFields {
            label: label.to_string(),
            first: "value".to_string(),
            second: "values".to_string(),
        });
    }

    let values = if let Some(values) = doc.values {
        values.into_iter().map(value_spec_from_doc).collect()
    } else if doc.value.is_some() || doc.constraints.is_some() || doc.save_as.is_some() {
        vec![ValueSpec {
            name: shorthand_name.to_string(),
            value: doc.value,
            constraints: doc.constraints,
            save_as: doc.save_as,
        }]
    } else {
        Vec::new()
    };

    Ok(ResponseSpec {
        values,
        error: doc.error,
        cluster_error: doc.cluster_error,
    })
}

fn value_spec_from_doc(doc: ValueSpecDoc) -> ValueSpec {
    ValueSpec {
        name: doc.name,
        value: doc.value,
        constraints: doc.constraints,
        save_as: doc.save_as,
    }
}

/// The type that applies to one named entry: command parameters
/// each resolve their own sub-field, while attribute/event
/// shorthand entries carry the target's whole type.
fn spec_type(field_types: &FieldType, is_command: bool, name: &str) -> FieldType {
    if is_command {
        field_types.field(name)
    } else {
        field_types.clone()
    }
}

fn coerce_specs(
    specs: Vec<ValueSpec>,
    field_types: &FieldType,
    is_command: bool,
    vars: &VariableStore,
) -> Result<Vec<ValueSpec>, SuiteError> {
    specs
        .into_iter()
        .map(|spec| {
            let ty = spec_type(field_types, is_command, &spec.name);
            let value = match spec.value {
                Some(v) => Some(coerce::coerce(&v, &ty, vars)?),
                None => None,
            };
            let constraints = match spec.constraints {
                Some(block) => {
                    let mut out = IndexMap::new();
                    for (key, arg) in block {
                        let arg = if VALUE_PARAM_KEYS.contains(&key.as_str()) {
                            coerce::coerce(&arg, &ty, vars)?
                        } else {
                            arg
                        };
                        out.insert(key, arg);
                    }
                    Some(out)
                }
                None => None,
            };
            Ok(ValueSpec {
                name: spec.name,
                value,
                constraints,
                save_as: spec.save_as,
            })
        })
        .collect()
}

fn resolve_spec(spec: &ValueSpec, vars: &VariableStore) -> Result<ValueSpec, SuiteError> {
    let value = match &spec.value {
        Some(v) => Some(resolve::resolve(v, vars)?),
        None => None,
    };
    let constraints = match &spec.constraints {
        Some(block) => {
            let mut out = IndexMap::new();
            for (key, arg) in block {
                let arg = if VALUE_PARAM_KEYS.contains(&key.as_str()) {
                    resolve::resolve(arg, vars)?
                } else {
                    arg.clone()
                };
                out.insert(key.clone(), arg);
            }
            Some(out)
        }
        None => None,
    };
    Ok(ValueSpec {
        name: spec.name.clone(),
        value,
        constraints,
        save_as: spec.save_as.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SuiteDoc;
    use crate::schema::StaticSchemaRegistry;

    fn parse_step(yaml: &str) -> StepDoc {
        let doc = SuiteDoc::from_yaml(&format!("name: t\ntests:\n{yaml}")).unwrap();
        doc.tests.into_iter().next().unwrap()
    }

    fn schema() -> StaticSchemaRegistry {
        let mut registry = StaticSchemaRegistry::new();
        registry.insert_scalar("Basic", "Uptime", "int64u");
        registry.insert_scalar("Basic", "Label", "char_string");
        let mut params = IndexMap::new();
        params.insert(
            "Key".to_string(),
            FieldType::Scalar(crate::schema::WireType::parse("octet_string").unwrap()),
        );
        params.insert(
            "Timeout".to_string(),
            FieldType::Scalar(crate::schema::WireType::parse("int64u").unwrap()),
        );
        registry.insert("Basic", "Arm", FieldType::Struct(params));
        registry
    }

    #[test]
    fn disabled_step_is_inert() {
        let doc = parse_step(
            "  - label: off\n    disabled: true\n    cluster: Basic\n    attribute: Uptime\n    \
             response:\n      value: 3\n",
        );
        let mut vars = VariableStore::new();
        let def = StepDefinition::from_doc(doc, &schema(), &mut vars).unwrap();
        assert!(def.disabled);
        assert_eq!(def.target, StepTarget::None);
        assert!(def.arguments.is_empty());
        assert!(def.response.values.is_empty());
    }

    #[test]
    fn attribute_shorthand_normalizes_to_named_values() {
        let doc = parse_step(
            "  - label: read\n    cluster: Basic\n    attribute: Uptime\n    response:\n      \
             value: \"12345678901234567890\"\n",
        );
        let mut vars = VariableStore::new();
        let def = StepDefinition::from_doc(doc, &schema(), &mut vars).unwrap();
        assert_eq!(def.response.values.len(), 1);
        let spec = &def.response.values[0];
        assert_eq!(spec.name, "Uptime");
        // Coerced through the schema-resolved int64u type.
        assert_eq!(spec.value, Some(Value::Int(12345678901234567890)));
    }

    #[test]
    fn command_parameters_each_use_their_own_type() {
        let doc = parse_step(
            "  - label: arm\n    cluster: Basic\n    command: Arm\n    arguments:\n      values:\n        \
             - name: Key\n          value: \"hex:0102\"\n        - name: Timeout\n          \
             value: \"900\"\n",
        );
        let mut vars = VariableStore::new();
        let def = StepDefinition::from_doc(doc, &schema(), &mut vars).unwrap();
        assert_eq!(def.arguments[0].value, Some(Value::Bytes(vec![1, 2])));
        assert_eq!(def.arguments[1].value, Some(Value::Int(900)));
    }

    #[test]
    fn save_as_targets_are_forward_declared() {
        let doc = parse_step(
            "  - label: read\n    cluster: Basic\n    attribute: Uptime\n    response:\n      \
             saveAs: bootCount\n      constraints:\n        minValue: 0\n",
        );
        let mut vars = VariableStore::new();
        StepDefinition::from_doc(doc, &schema(), &mut vars).unwrap();
        assert!(vars.is_declared("bootCount"));
        assert!(!vars.is_bound("bootCount"));
    }

    #[test]
    fn mutually_exclusive_value_and_values_is_fatal() {
        let doc = parse_step(
            "  - label: bad\n    cluster: Basic\n    attribute: Uptime\n    response:\n      \
             value: 1\n      values:\n        - name: x\n          value: 2\n",
        );
        let mut vars = VariableStore::new();
        let err = StepDefinition::from_doc(doc, &schema(), &mut vars).unwrap_err();
        assert!(matches!(err, SuiteError::MutuallyExclusiveFields { .. }));
    }

    #[test]
    fn multiple_targets_are_rejected() {
        let doc = parse_step("  - label: bad\n    cluster: Basic\n    command: Arm\n    attribute: Uptime\n");
        let mut vars = VariableStore::new();
        let err = StepDefinition::from_doc(doc, &schema(), &mut vars).unwrap_err();
        assert!(matches!(err, SuiteError::MutuallyExclusiveFields { .. }));
    }

    #[test]
    fn malformed_constraint_fails_at_parse_time() {
        let doc = parse_step(
            "  - label: read\n    cluster: Basic\n    attribute: Label\n    response:\n      \
             constraints:\n        madeUpKey: 1\n",
        );
        let mut vars = VariableStore::new();
        let err = StepDefinition::from_doc(doc, &schema(), &mut vars).unwrap_err();
        assert!(matches!(err, SuiteError::UnknownConstraint { .. }));
    }

    #[test]
    fn materialize_substitutes_arguments_and_constraints() {
        let doc = parse_step(
            "  - label: write\n    cluster: Basic\n    attribute: Uptime\n    arguments:\n      \
             value: \"lastUptime\"\n    response:\n      constraints:\n        \
             minValue: \"lastUptime + 1\"\n",
        );
        let mut parse_vars = VariableStore::new();
        parse_vars.declare("lastUptime");
        let def = StepDefinition::from_doc(doc, &schema(), &mut parse_vars).unwrap();

        let mut runtime = parse_vars.clone();
        runtime.set("lastUptime", Value::Int(41));
        let step = Step::materialize(&def, &runtime).unwrap();

        assert_eq!(step.argument("Uptime"), Some(&Value::Int(41)));
        let constraints = step.response.values[0].constraints.as_ref().unwrap();
        assert_eq!(constraints["minValue"], Value::Int(42));
    }

    #[test]
    fn materialize_keeps_annotation_fields() {
        let doc = parse_step(
            "  - label: subscribe\n    cluster: Basic\n    attribute: Uptime\n    \
             verification: \"Check the device log\"\n    minInterval: 2\n    maxInterval: 10\n",
        );
        let mut vars = VariableStore::new();
        let def = StepDefinition::from_doc(doc, &schema(), &mut vars).unwrap();
        let step = Step::materialize(&def, &vars).unwrap();

        assert_eq!(step.verification.as_deref(), Some("Check the device log"));
        assert_eq!(step.min_interval, Some(2));
        assert_eq!(step.max_interval, Some(10));
    }
}
