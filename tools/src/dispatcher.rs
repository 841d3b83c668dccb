//! Tool dispatch pipeline
//!
//! Pipeline: lookup → validate arguments → execute (spawned, time-bounded) → reduce
//!
//! Every path ends in exactly one `InvocationResult`. Handler panics and
//! timeouts are caught here and turned into failures so a single bad call
//! never takes the serving loop down.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{FailureKind, ToolFailure};
use crate::registry::ToolRegistry;
use crate::runtime::RuntimeClient;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Success(String),
    Failure(ToolFailure),
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    /// Text shown to the caller, for either outcome
    pub fn text(&self) -> &str {
        match self {
            InvocationResult::Success(text) => text,
            InvocationResult::Failure(failure) => &failure.message,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::Failure(failure) => Some(failure.kind),
        }
    }
}

impl From<Result<String, ToolFailure>> for InvocationResult {
    fn from(result: Result<String, ToolFailure>) -> Self {
        match result {
            Ok(text) => InvocationResult::Success(text),
            Err(failure) => InvocationResult::Failure(failure),
        }
    }
}

/// Executes registered tools against a bound runtime client
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    client: RuntimeClient,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, client: RuntimeClient) -> Self {
        Self {
            registry,
            client,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Invoke a tool through the full pipeline
    pub async fn invoke(&self, name: &str, raw_args: Value) -> InvocationResult {
        let execution_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        // 1. Lookup
        let tool = match self.registry.lookup(name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!("Unknown tool requested: {name} (execution {execution_id})");
                return InvocationResult::Failure(ToolFailure::new(
                    FailureKind::UnknownOperation,
                    e.to_string(),
                ));
            }
        };

        // 2. Validate arguments
        let args = match tool.schema.validate(&raw_args) {
            Ok(args) => args,
            Err(e) => {
                warn!(
                    "Rejected arguments: tool={} param={} execution={}: {}",
                    tool.name,
                    e.param(),
                    execution_id,
                    e
                );
                return InvocationResult::Failure(ToolFailure::new(
                    e.kind(),
                    format!("Invalid arguments for {}: {}", tool.name, e),
                ));
            }
        };

        info!("Executing: tool={} execution={}", tool.name, execution_id);

        // 3. Execute on its own task so a panic stays contained
        let future = (tool.handler)(self.client.clone(), args);
        let task = tokio::spawn(tokio::time::timeout(self.call_timeout, future));

        let result = match task.await {
            Ok(Ok(outcome)) => InvocationResult::from(outcome),
            Ok(Err(_elapsed)) => InvocationResult::Failure(ToolFailure::runtime(format!(
                "Error: {} timed out after {}s",
                tool.name,
                self.call_timeout.as_secs_f64()
            ))),
            Err(join_error) => {
                let detail = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                error!(
                    "Handler fault: tool={} execution={}: {}",
                    tool.name, execution_id, detail
                );
                InvocationResult::Failure(ToolFailure::unexpected(format!(
                    "Error: internal error while running {}",
                    tool.name
                )))
            }
        };

        // 4. Reduce
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            InvocationResult::Success(_) => info!(
                "Completed: tool={} execution={} duration_ms={}",
                tool.name, execution_id, duration_ms
            ),
            InvocationResult::Failure(failure) => warn!(
                "Failed: tool={} execution={} kind={} duration_ms={}: {}",
                tool.name, execution_id, failure.kind, duration_ms, failure.message
            ),
        }
        result
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
