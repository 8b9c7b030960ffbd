//! Dispatch seams: the transport adapter and pseudo-cluster
//! interfaces, plus the in-process implementations used by tests
//! and the CLI.
//!
//! The engine never performs I/O itself; a dispatched step comes
//! back as a fully-decoded [`DeviceResponse`] and any waiting
//! happens behind these traits.

use crate::step::Step;
use crate::value::Value;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// A decoded response to one dispatched step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceResponse {
    /// Top-level status code name, absent on success.
    pub error: Option<String>,
    /// Cluster-specific status code, independent of `error`.
    pub cluster_error: Option<i64>,
    /// Named response values.
    pub values: IndexMap<String, Value>,
}

impl DeviceResponse {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_error(code: &str) -> Self {
        Self {
            error: Some(code.to_string()),
            ..Self::default()
        }
    }

    pub fn with_cluster_error(code: i64) -> Self {
        Self {
            cluster_error: Some(code),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }
}

/// Transport seam: encodes and sends a step's request, decodes the
/// device's answer. Network, IPC, or simulated.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    async fn dispatch(&self, step: &Step) -> Result<DeviceResponse>;
}

/// A locally simulated command target dispatched instead of the
/// transport adapter.
#[async_trait]
pub trait PseudoCluster: Send + Sync {
    /// The cluster name this handler answers for.
    fn name(&self) -> &str;

    async fn execute(&self, step: &Step) -> Result<DeviceResponse>;
}

/// Adapter that answers every dispatch with an empty success
/// response. Used by the CLI when no real transport is wired in.
#[derive(Debug, Default)]
pub struct SimulatedAdapter;

#[async_trait]
impl DeviceAdapter for SimulatedAdapter {
    async fn dispatch(&self, step: &Step) -> Result<DeviceResponse> {
        debug!("simulated dispatch for step '{}'", step.label);
        Ok(DeviceResponse::success())
    }
}

/// Adapter replaying a queue of predefined responses, one per
/// dispatched step, in order. Running out of responses is an
/// error.
#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    responses: Mutex<VecDeque<DeviceResponse>>,
}

impl ScriptedAdapter {
    pub fn new(responses: impl IntoIterator<Item = DeviceResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    pub fn push(&self, response: DeviceResponse) {
        self.responses
            .lock()
            .expect("scripted adapter lock poisoned")
            .push_back(response);
    }
}

#[async_trait]
impl DeviceAdapter for ScriptedAdapter {
    async fn dispatch(&self, step: &Step) -> Result<DeviceResponse> {
        self.responses
            .lock()
            .expect("scripted adapter lock poisoned")
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response left for step '{}'", step.label))
    }
}

/// Built-in pseudo-cluster handling `DelayCommands`: the
/// `WaitForMs` command sleeps for its `ms` argument.
#[derive(Debug, Default)]
pub struct DelayCommands;

#[async_trait]
impl PseudoCluster for DelayCommands {
    fn name(&self) -> &str {
        "DelayCommands"
    }

    async fn execute(&self, step: &Step) -> Result<DeviceResponse> {
        match step.target.name() {
            Some("WaitForMs") => {
                let ms = step
                    .argument("ms")
                    .and_then(Value::as_int)
                    .ok_or_else(|| anyhow!("WaitForMs requires an integer 'ms' argument"))?;
                let ms = u64::try_from(ms)
                    .map_err(|_| anyhow!("WaitForMs 'ms' argument must be non-negative"))?;
                debug!("waiting {} ms", ms);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(DeviceResponse::success())
            }
            other => Err(anyhow!(
                "DelayCommands does not support command {:?}",
                other
            )),
        }
    }
}

/// Built-in pseudo-cluster handling `LogCommands`: the `Log`
/// command emits its `message` argument through the log stream.
#[derive(Debug, Default)]
pub struct LogCommands;

#[async_trait]
impl PseudoCluster for LogCommands {
    fn name(&self) -> &str {
        "LogCommands"
    }

    async fn execute(&self, step: &Step) -> Result<DeviceResponse> {
        match step.target.name() {
            Some("Log") => {
                let message = step
                    .argument("message")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                info!("{}", message);
                Ok(DeviceResponse::success())
            }
            other => Err(anyhow!("LogCommands does not support command {:?}", other)),
        }
    }
}
