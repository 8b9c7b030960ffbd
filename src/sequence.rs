//! Ordered, lazily-materialized step sequence over one suite.
//!
//! Construction resolves every step definition against the schema
//! and fills the parse-time variable store. Each call to
//! [`SequenceRun::next_step`] materializes the next runtime step
//! against the store as it stands *now*, so a save committed by
//! step N is always visible to step N+1's substitution.

use crate::errors::SuiteError;
use crate::model::SuiteDoc;
use crate::schema::SchemaRegistry;
use crate::step::{Step, StepDefinition};
use crate::vars::VariableStore;
use tracing::debug;

/// A fully parsed, schema-resolved suite ready to run.
#[derive(Debug)]
pub struct TestSequence {
    pub name: String,
    pub pics: Vec<String>,
    definitions: Vec<StepDefinition>,
    parse_vars: VariableStore,
}

impl TestSequence {
    /// Build the sequence from a raw suite document. Fails on the
    /// first construction error; nothing executes on failure.
    pub fn from_doc(doc: SuiteDoc, schema: &dyn SchemaRegistry) -> Result<Self, SuiteError> {
        let mut parse_vars = VariableStore::new();
        for (name, entry) in &doc.config {
            parse_vars.set(name, entry.value().clone());
        }

        let pics = doc
            .pics
            .as_ref()
            .map(|p| p.expressions().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        let mut definitions = Vec::with_capacity(doc.tests.len());
        for step_doc in doc.tests {
            debug!("resolving step '{}'", step_doc.label);
            definitions.push(StepDefinition::from_doc(step_doc, schema, &mut parse_vars)?);
        }

        Ok(Self {
            name: doc.name,
            pics,
            definitions,
            parse_vars,
        })
    }

    pub fn parse_yaml(yaml: &str, schema: &dyn SchemaRegistry) -> Result<Self, SuiteError> {
        let doc = SuiteDoc::from_yaml(yaml).map_err(|e| SuiteError::MalformedStep {
            label: "<document>".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_doc(doc, schema)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[StepDefinition] {
        &self.definitions
    }

    /// Begin one execution: the runtime store starts as a copy of
    /// the parse-time store. The sequence itself stays immutable
    /// and can be started again for an independent run.
    pub fn start(&self) -> SequenceRun<'_> {
        SequenceRun {
            definitions: &self.definitions,
            vars: self.parse_vars.clone(),
            cursor: 0,
        }
    }
}

/// One in-progress execution of a [`TestSequence`].
#[derive(Debug)]
pub struct SequenceRun<'a> {
    definitions: &'a [StepDefinition],
    vars: VariableStore,
    cursor: usize,
}

impl SequenceRun<'_> {
    /// Materialize the next step. Disabled steps come back inert
    /// (they carry no fields to substitute); the caller reports
    /// them as skipped.
    pub fn next_step(&mut self) -> Option<Result<Step, SuiteError>> {
        let definition = self.definitions.get(self.cursor)?;
        self.cursor += 1;
        Some(Step::materialize(definition, &self.vars))
    }

    pub fn remaining(&self) -> usize {
        self.definitions.len() - self.cursor
    }

    pub fn variables(&self) -> &VariableStore {
        &self.vars
    }

    /// Mutable access for committing save-as extractions between
    /// steps.
    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EmptySchemaRegistry, StaticSchemaRegistry};
    use crate::value::Value;

    #[test]
    fn config_seeds_the_parse_store() {
        let sequence = TestSequence::parse_yaml(
            "name: t\nconfig:\n  nodeId: 5\n  delay:\n    defaultValue: 100\ntests: []\n",
            &EmptySchemaRegistry,
        )
        .unwrap();
        let run = sequence.start();
        assert_eq!(run.variables().get("nodeId"), Some(&Value::Int(5)));
        assert_eq!(run.variables().get("delay"), Some(&Value::Int(100)));
    }

    #[test]
    fn save_as_from_one_step_reaches_the_next() {
        let mut schema = StaticSchemaRegistry::new();
        schema.insert_scalar("Counter", "Count", "int64u");

        let sequence = TestSequence::parse_yaml(
            "name: t\ntests:\n  - label: read\n    cluster: Counter\n    attribute: Count\n    \
             response:\n      saveAs: firstCount\n  - label: compare\n    cluster: Counter\n    \
             attribute: Count\n    response:\n      value: \"firstCount + 1\"\n",
            &schema,
        )
        .unwrap();
        let mut run = sequence.start();

        let _first = run.next_step().unwrap().unwrap();
        // The runner would commit the save after dispatch.
        run.variables_mut().set("firstCount", Value::Int(41));

        let second = run.next_step().unwrap().unwrap();
        assert_eq!(second.response.values[0].value, Some(Value::Int(42)));
    }

    #[test]
    fn runs_are_independent() {
        let sequence = TestSequence::parse_yaml(
            "name: t\nconfig:\n  base: 1\ntests:\n  - label: s\n",
            &EmptySchemaRegistry,
        )
        .unwrap();

        let mut first = sequence.start();
        first.variables_mut().set("base", Value::Int(99));

        let second = sequence.start();
        assert_eq!(second.variables().get("base"), Some(&Value::Int(1)));
    }

    #[test]
    fn construction_fails_on_bad_constraints_before_any_step_runs() {
        let err = TestSequence::parse_yaml(
            "name: t\ntests:\n  - label: s\n    cluster: C\n    attribute: A\n    response:\n      \
             constraints:\n        nonsense: 1\n",
            &EmptySchemaRegistry,
        )
        .unwrap_err();
        assert!(matches!(err, SuiteError::UnknownConstraint { .. }));
    }
}
