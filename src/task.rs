use crate::client::endpoint::{Endpoint, Surface};
use crate::client::types::ApiRequest;
use crate::prelude::{Error, Result, Session};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Identifier of a server-side task, tagged by the response shape it was
/// found in.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskHandle {
    /// v3 flat `task_uuid`.
    V3Flat(String),
    /// v3 `status.execution_context.task_uuid`.
    V3Nested(String),
    /// v4 typed task reference carrying an `extId`.
    V4Typed(String),
}

impl TaskHandle {
    /// Finds the task identifier in a mutation response.
    ///
    pub fn normalize(response: &Value) -> Result<TaskHandle> {
        let text = |pointer: &str| {
            response
                .pointer(pointer)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        if let Some(uuid) = text("/status/execution_context/task_uuid") {
            return Ok(TaskHandle::V3Nested(uuid));
        }
        if let Some(uuid) = text("/task_uuid") {
            return Ok(TaskHandle::V3Flat(uuid));
        }
        ["/data/extId", "/data/ext_id", "/extId", "/ext_id"]
            .iter()
            .find_map(|pointer| text(pointer))
            .map(TaskHandle::V4Typed)
            .ok_or_else(|| Error::Protocol(format!("unrecognized task shape: {}", response)))
    }

    pub fn ext_id(&self) -> &str {
        match self {
            TaskHandle::V3Flat(id) | TaskHandle::V3Nested(id) | TaskHandle::V4Typed(id) => id,
        }
    }

    fn endpoint(&self) -> Endpoint {
        match self {
            TaskHandle::V3Flat(id) | TaskHandle::V3Nested(id) => {
                Endpoint::new(Surface::Intent, "/tasks").ext_id(id)
            }
            TaskHandle::V4Typed(id) => Endpoint::new(Surface::PRISM, "/config/tasks").ext_id(id),
        }
    }

    /// Task descriptor returned when the caller does not wait.
    ///
    pub fn to_json(&self) -> Value {
        json!({ "ext_id": self.ext_id() })
    }
}

// -----------------------------------------------------------------------------

/// Parsed task status. Parsing is case-insensitive and unknown strings are
/// treated as still in progress.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Pending,
    Running,
    Succeeded,
    Complete,
    Failed,
    Error,
    Canceled,
    Other(String),
}

impl TaskStatus {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "queued" => TaskStatus::Queued,
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "succeeded" => TaskStatus::Succeeded,
            "complete" => TaskStatus::Complete,
            "failed" => TaskStatus::Failed,
            "error" => TaskStatus::Error,
            "canceled" | "cancelled" => TaskStatus::Canceled,
            _ => TaskStatus::Other(value.to_owned()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded
                | TaskStatus::Complete
                | TaskStatus::Failed
                | TaskStatus::Error
                | TaskStatus::Canceled
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskStatus::Failed | TaskStatus::Error | TaskStatus::Canceled
        )
    }
}

/// Entity touched by a task.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityAffected {
    pub rel: String,
    pub ext_id: String,
}

/// Key/value detail published by a finished task.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionDetail {
    pub name: String,
    pub value: Value,
}

/// Surface-independent view of a task.
///
/// # Fields
///
/// * `status`: Status string exactly as returned by the server.
/// * `progress_percentage`: Progress, when the server reports one.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub ext_id: String,
    pub status: String,
    pub progress_percentage: Option<u64>,
    pub entities_affected: Vec<EntityAffected>,
    pub completion_details: Vec<CompletionDetail>,
    pub error_messages: Vec<String>,
}

impl TaskRecord {
    pub fn state(&self) -> TaskStatus {
        TaskStatus::parse(&self.status)
    }

    /// Parses a v3 `/tasks/{uuid}` body.
    ///
    pub fn from_v3(fallback_id: &str, body: &Value) -> Result<Self> {
        let status = required_status(body)?;
        let entities_affected = array(body, "entity_reference_list")
            .iter()
            .filter_map(|entity| {
                Some(EntityAffected {
                    rel: entity.get("kind")?.as_str()?.to_owned(),
                    ext_id: entity.get("uuid")?.as_str()?.to_owned(),
                })
            })
            .collect();
        let error_messages = ["error_detail", "error_code"]
            .iter()
            .filter_map(|key| body.get(*key).and_then(scalar_text))
            .collect();

        Ok(Self {
            ext_id: text(body, "uuid").unwrap_or_else(|| fallback_id.to_owned()),
            status,
            progress_percentage: body.get("percentage_complete").and_then(Value::as_u64),
            entities_affected,
            completion_details: Vec::new(),
            error_messages,
        })
    }

    /// Parses a v4 `/config/tasks/{extId}` body.
    ///
    pub fn from_v4(fallback_id: &str, body: &Value) -> Result<Self> {
        let task = body.get("data").unwrap_or(body);
        let status = required_status(task)?;
        let entities_affected = array(task, "entitiesAffected")
            .iter()
            .filter_map(|entity| {
                Some(EntityAffected {
                    rel: entity.get("rel").and_then(Value::as_str).unwrap_or_default().to_owned(),
                    ext_id: entity.get("extId")?.as_str()?.to_owned(),
                })
            })
            .collect();
        let completion_details = array(task, "completionDetails")
            .iter()
            .filter_map(|detail| {
                Some(CompletionDetail {
                    name: detail.get("name")?.as_str()?.to_owned(),
                    value: detail.get("value").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();
        let error_messages = array(task, "errorMessages")
            .iter()
            .filter_map(|message| message.get("message").and_then(scalar_text).or_else(|| scalar_text(message)))
            .chain(task.get("legacyErrorMessage").and_then(scalar_text))
            .collect();

        Ok(Self {
            ext_id: text(task, "extId").unwrap_or_else(|| fallback_id.to_owned()),
            status,
            progress_percentage: task.get("progressPercentage").and_then(Value::as_u64),
            entities_affected,
            completion_details,
            error_messages,
        })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn required_status(body: &Value) -> Result<String> {
    text(body, "status").ok_or_else(|| Error::Protocol(format!("task without status: {}", body)))
}

fn text(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn array<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    body.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Returns the first value published under completion detail `key`.
///
/// Values may be a single id, a comma-separated list of ids or a JSON array.
///
pub fn extract_ext_id(task: &TaskRecord, key: &str) -> Option<String> {
    let value = &task
        .completion_details
        .iter()
        .find(|detail| detail.name == key)?
        .value;
    match value {
        Value::String(ids) => ids
            .split(',')
            .map(str::trim)
            .find(|id| !id.is_empty())
            .map(str::to_owned),
        Value::Array(ids) => ids.iter().find_map(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

/// Returns the id of the first affected entity with relation `rel`.
///
pub fn entity_ext_id(task: &TaskRecord, rel: &str) -> Option<String> {
    task.entities_affected
        .iter()
        .find(|entity| entity.rel == rel)
        .map(|entity| entity.ext_id.clone())
}

// -----------------------------------------------------------------------------

/// Polls tasks until they reach a terminal status.
///
#[derive(Debug, Clone)]
pub struct TaskTracker {
    session: Session,
    poll_interval: Duration,
    deadline: Duration,
    cancel: CancellationToken,
}

impl TaskTracker {
    pub fn new(
        session: Session,
        poll_interval: Duration,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            poll_interval,
            deadline,
            cancel,
        }
    }

    /// Reads the current state of a task once.
    ///
    pub async fn fetch(&self, handle: &TaskHandle) -> Result<TaskRecord> {
        let url = self.session.url(&handle.endpoint())?;
        let response = self.session.send(ApiRequest::get(url)).await?;
        match handle {
            TaskHandle::V4Typed(id) => TaskRecord::from_v4(id, &response.body),
            TaskHandle::V3Flat(id) | TaskHandle::V3Nested(id) => {
                TaskRecord::from_v3(id, &response.body)
            }
        }
    }

    /// Polls a task until it is complete, with a deadline.
    ///
    /// The number of polls is bounded by `deadline / poll_interval + 1`
    /// regardless of what the server returns.
    ///
    /// # Returns
    ///
    /// The terminal task record on success; `TaskFailed`, `TaskTimeout` or
    /// `Cancelled` errors otherwise, each carrying the last observed record.
    ///
    #[tracing::instrument(level = "debug", target = "task", skip(self), fields(task = handle.ext_id()))]
    pub async fn wait(&self, handle: &TaskHandle) -> Result<TaskRecord> {
        let start = Instant::now();
        let interval_ms = self.poll_interval.as_millis().max(1);
        let mut retries = self.deadline.as_millis() / interval_ms;
        let mut last: Option<TaskRecord> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled(last.map(Box::new)));
            }

            let task = self.fetch(handle).await?;
            let status = task.state();
            if status.is_terminal() {
                if status.is_failure() {
                    tracing::warn!(target: "task", status = %task.status, errors = ?task.error_messages, "Task failed");
                    return Err(Error::TaskFailed(Box::new(task)));
                }
                tracing::info!(target: "task", status = %task.status, "Task finished");
                return Ok(task);
            }

            if retries == 0 {
                return Err(Error::TaskTimeout {
                    task: Box::new(task),
                    elapsed_secs: start.elapsed().as_secs(),
                });
            }
            retries -= 1;
            tracing::debug!(target: "task", status = %task.status, progress = ?task.progress_percentage, "Task in progress");

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled(Some(Box::new(task)))),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            last = Some(task);
        }
    }
}
