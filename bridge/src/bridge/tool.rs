//! Per-session tool objects

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::mcp::{Connection, JsonObject, ToolDescriptor, ToolFailure, ToolOutcome};

/// Longest argument summary shown in progress displays
const ACTIVITY_ARGS_MAX_CHARS: usize = 80;

/// Whether the hosting session must confirm a call before running it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// Run as soon as invoked
    Auto,
    /// Ask the user first
    Ask,
}

/// A tool as seen by the calling session
#[async_trait]
pub trait SessionTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> &Value;

    fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    /// Short line for progress display while the call runs
    fn activity_description(&self, args: &Value) -> String;

    /// Run the tool. Failures and cancellation come back as outcomes, never panics or errors.
    async fn execute(&self, args: Value) -> ToolOutcome;
}

/// One discovered tool bound to a session's private connection
pub struct BridgeTool {
    descriptor: ToolDescriptor,
    connection: Arc<Connection>,
    cancel: CancellationToken,
    session_id: String,
}

impl BridgeTool {
    pub(crate) fn new(
        descriptor: ToolDescriptor,
        connection: Arc<Connection>,
        cancel: CancellationToken,
        session_id: String,
    ) -> Self {
        Self {
            descriptor,
            connection,
            cancel,
            session_id,
        }
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Run with a caller-chosen token instead of the session's
    ///
    /// Pass a child of the session token to keep session-wide cancellation.
    pub async fn execute_with_cancel(
        &self,
        args: Value,
        cancel: Option<&CancellationToken>,
    ) -> ToolOutcome {
        let arguments = match into_arguments(args) {
            Ok(arguments) => arguments,
            Err(failure) => return ToolOutcome::Failure(failure),
        };

        tracing::debug!(session = %self.session_id, tool = %self.descriptor.name, "Executing bridged tool");

        match self
            .connection
            .call_tool(&self.descriptor.name, arguments, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => ToolOutcome::Failure(ToolFailure::Unavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl SessionTool for BridgeTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters_schema(&self) -> &Value {
        &self.descriptor.input_schema
    }

    // The tool only reaches this session's own server process
    fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn activity_description(&self, args: &Value) -> String {
        let summary = match args {
            Value::Object(map) if !map.is_empty() => args.to_string(),
            Value::Null | Value::Object(_) => return format!("Running {}", self.descriptor.name),
            other => other.to_string(),
        };
        format!(
            "Running {} {}",
            self.descriptor.name,
            truncate_chars(&summary, ACTIVITY_ARGS_MAX_CHARS)
        )
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        self.execute_with_cancel(args, Some(&self.cancel)).await
    }
}

/// Arguments must be a JSON object; `null` means no arguments
fn into_arguments(args: Value) -> Result<JsonObject, ToolFailure> {
    match args {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonObject::new()),
        other => Err(ToolFailure::InvalidArguments(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
