//! Declarative conformance-test engine for device clusters.
//!
//! Suites are YAML documents describing an ordered list of steps:
//! commands to invoke, attributes or events to read, and the
//! expected responses with equality checks, typed constraints, and
//! save-as variable captures. The engine parses and
//! schema-resolves a whole suite up front, then executes it
//! through a pluggable [`adapter::DeviceAdapter`] and validates
//! every decoded response.

pub mod adapter;
pub mod coerce;
pub mod constraint;
pub mod errors;
pub mod expr;
pub mod loader;
pub mod model;
pub mod resolve;
pub mod runner;
pub mod schema;
pub mod sequence;
pub mod step;
pub mod validator;
pub mod value;
pub mod vars;

pub use adapter::{DeviceAdapter, DeviceResponse, PseudoCluster, ScriptedAdapter, SimulatedAdapter};
pub use constraint::Constraint;
pub use errors::SuiteError;
pub use runner::{StepOutcome, StepStatus, SuiteResult, SuiteRunner};
pub use schema::{FieldType, SchemaRegistry, StaticSchemaRegistry, WireType};
pub use sequence::{SequenceRun, TestSequence};
pub use step::{Step, StepDefinition};
pub use validator::{CheckEntry, CheckStatus, PostProcessResult};
pub use value::Value;
pub use vars::VariableStore;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
