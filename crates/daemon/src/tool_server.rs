// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `OrchestratorServer`: the MCP tool surface over `Arc<Orchestrator>`.
//!
//! One `#[tool]` method per contract in spec.md §4.G. Tool failures are
//! folded into a successful `CallToolResult` carrying `{"error": message}`
//! — never an MCP protocol-level error — per spec.md §6's error shape.

use mvm_core::TaskId;
use mvm_engine::{Orchestrator, OrchestratorError, RunTaskError, WaitOutcome};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, ErrorData, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, RoleServer, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunTaskParams {
    /// Free-text task description, stored verbatim as the task's `task.md`.
    pub description: String,
    /// Alias of a repo previously registered with `mvm allow`.
    pub repo: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskIdParams {
    pub task_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WaitNextEventParams {
    /// Milliseconds to wait before returning `{"timeout": true}`.
    #[serde(default = "default_wait_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_wait_timeout_ms() -> u64 {
    1_800_000
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CleanupTaskParams {
    pub task_id: String,
    /// Also delete the `refs/tasks/<id>` preservation ref.
    #[serde(default)]
    pub delete_ref: bool,
}

/// Wraps a single `error_response` payload for a successful `CallToolResult`.
fn error_result(message: impl std::fmt::Display) -> CallToolResult {
    json_result(&json!({ "error": message.to_string() }))
}

fn json_result(value: &Value) -> CallToolResult {
    match Content::json(value) {
        Ok(content) => CallToolResult::success(vec![content]),
        Err(e) => CallToolResult::success(vec![Content::text(format!(
            "{{\"error\": \"failed to serialize tool result: {e}\"}}"
        ))]),
    }
}

fn parse_task_id(raw: &str) -> TaskId {
    TaskId::new(raw)
}

#[derive(Clone)]
pub struct OrchestratorServer {
    orchestrator: Arc<Orchestrator>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OrchestratorServer {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Start a new task: clones the named repo into an isolated worktree, boots a microVM with the task description mounted, and returns the new task's id. Fails with {error} if the repo alias is unknown, all slots are busy, or the API credential env var is unset.")]
    async fn run_task(&self, params: Parameters<RunTaskParams>) -> Result<CallToolResult, ErrorData> {
        let RunTaskParams { description, repo } = params.0;
        match self.orchestrator.run_task(description, &repo).await {
            Ok(task_id) => Ok(json_result(&json!({ "task_id": task_id.as_str() }))),
            Err(e) => Ok(run_task_error_result(e)),
        }
    }

    #[tool(description = "Look up a task's status, and if present its parsed result.json and merge-result.json, pid, and exit code.")]
    async fn get_task_info(&self, params: Parameters<TaskIdParams>) -> Result<CallToolResult, ErrorData> {
        let task_id = parse_task_id(&params.0.task_id);
        match self.orchestrator.get_task_info(&task_id) {
            Ok(info) => Ok(json_result(&json!(info))),
            Err(e) => Ok(orchestrator_error_result(e)),
        }
    }

    #[tool(description = "Return the absolute path of a task's serial.log. Does not stream log content.")]
    async fn get_task_logs(&self, params: Parameters<TaskIdParams>) -> Result<CallToolResult, ErrorData> {
        let task_id = parse_task_id(&params.0.task_id);
        match self.orchestrator.get_task_logs(&task_id) {
            Ok(path) => Ok(json_result(&json!({ "log_path": path.display().to_string() }))),
            Err(e) => Ok(orchestrator_error_result(e)),
        }
    }

    #[tool(description = "Block until the next completed/failed event, a timeout (default 1800000ms), or client cancellation. Returns {type, task_id, ...} on an event, {timeout: true} on timeout, or {cancelled: true} if the caller disconnects mid-wait.")]
    async fn wait_next_event(
        &self,
        params: Parameters<WaitNextEventParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let cancel = async move {
            context.ct.cancelled().await;
        };
        let outcome = self.orchestrator.wait_next_event(params.0.timeout_ms, cancel).await;
        let value = match outcome {
            WaitOutcome::Event(event) => serde_json::to_value(event).unwrap_or(Value::Null),
            WaitOutcome::Timeout => json!({ "timeout": true }),
            WaitOutcome::Cancelled => json!({ "cancelled": true }),
        };
        Ok(json_result(&value))
    }

    #[tool(description = "Delete a finished task's working directory, optionally also deleting its refs/tasks/<id> preservation ref. Refuses with {error} while the task is still running.")]
    async fn cleanup_task(&self, params: Parameters<CleanupTaskParams>) -> Result<CallToolResult, ErrorData> {
        let task_id = parse_task_id(&params.0.task_id);
        match self.orchestrator.cleanup_task(&task_id, params.0.delete_ref).await {
            Ok(()) => Ok(json_result(&json!({ "success": true }))),
            Err(e) => Ok(orchestrator_error_result(e)),
        }
    }

    #[tool(description = "List every registered repo alias and its canonical path.")]
    async fn list_repos(&self) -> Result<CallToolResult, ErrorData> {
        match self.orchestrator.list_repos() {
            Ok(repos) => Ok(json_result(&json!(repos))),
            Err(e) => Ok(orchestrator_error_result(e)),
        }
    }

    #[tool(description = "List every task recorded on disk across all registered repos, most recent state included.")]
    async fn list_tasks(&self) -> Result<CallToolResult, ErrorData> {
        match self.orchestrator.list_tasks() {
            Ok(tasks) => Ok(json_result(&json!(tasks))),
            Err(e) => Ok(orchestrator_error_result(e)),
        }
    }

    #[tool(description = "Snapshot of the slot pool: max slots, active (slot, task_id, repo_alias) triples, and free slot numbers.")]
    async fn list_slots(&self) -> Result<CallToolResult, ErrorData> {
        Ok(json_result(&json!(self.orchestrator.list_slots())))
    }
}

#[tool_handler]
impl ServerHandler for OrchestratorServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mvm-daemon".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Dispatches developer-agent tasks into ephemeral microVMs and merges results back via git."
                    .into(),
            ),
        }
    }
}

fn run_task_error_result(err: RunTaskError) -> CallToolResult {
    match &err {
        RunTaskError::SlotsBusy { max, active } => json_result(&json!({
            "error": err.to_string(),
            "max": max,
            "active": active,
        })),
        _ => error_result(err),
    }
}

fn orchestrator_error_result(err: OrchestratorError) -> CallToolResult {
    error_result(err)
}
