use crate::task::TaskRecord;
use derive_more::Display;
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Defines the crate's custom error types.
///
/// Every variant belongs to exactly one [`ErrorKind`], which is what ends up
/// in the `error` field of an operation result.
///
#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Authentication error: status {0}, body: {1}")]
    Auth(StatusCode, String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: status 412 Precondition Failed, body: {0}")]
    Conflict(String),
    #[error("Nutanix API error: status {0}, body: {1}")]
    Upstream(StatusCode, String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Timeout after {elapsed_secs} seconds waiting for task {}: last status {}, progress {}%",
        .task.ext_id, .task.status, .task.progress_percentage.unwrap_or_default())]
    TaskTimeout { task: Box<TaskRecord>, elapsed_secs: u64 },
    #[error("Task {} failed with status {}: {}", .0.ext_id, .0.status, .0.error_messages.join("; "))]
    TaskFailed(Box<TaskRecord>),
    #[error("cancelled")]
    Cancelled(Option<Box<TaskRecord>>),
    #[error("Local IO error: {0}")]
    LocalIo(#[from] std::io::Error),

    #[error("Environment error: {0}")]
    Environment(#[from] dotenv::Error),
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("Url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("Header convert error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to set logger: {0}")]
    Logger(#[from] tracing_log::log::SetLoggerError),
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tracing::dispatcher::SetGlobalDefaultError),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    /// Classifies the error into the taxonomy reported to callers.
    ///
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_)
            | Error::Environment(_)
            | Error::Settings(_)
            | Error::Url(_)
            | Error::Header(_)
            | Error::Logger(_)
            | Error::Telemetry(_) => ErrorKind::Config,
            Error::Auth(..) => ErrorKind::Auth,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Upstream(..) => ErrorKind::Upstream,
            Error::Protocol(_) | Error::Json(_) => ErrorKind::Protocol,
            Error::Timeout(_) | Error::TaskTimeout { .. } => ErrorKind::Timeout,
            Error::TaskFailed(_) => ErrorKind::TaskFailed,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::LocalIo(_) => ErrorKind::LocalIo,
            Error::Reqwest(error) if error.is_timeout() => ErrorKind::Timeout,
            Error::Reqwest(error) if error.is_decode() => ErrorKind::Protocol,
            Error::Reqwest(error) if error.is_builder() => ErrorKind::Config,
            Error::Reqwest(_) => ErrorKind::Upstream,
        }
    }

    /// Task record attached to task-related failures, if any.
    ///
    pub fn task(&self) -> Option<&TaskRecord> {
        match self {
            Error::TaskTimeout { task, .. } | Error::TaskFailed(task) => Some(task.as_ref()),
            Error::Cancelled(task) => task.as_deref(),
            _ => None,
        }
    }
}

/// Error taxonomy exposed in operation results.
///
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("ConfigError")]
    Config,
    #[display("AuthError")]
    Auth,
    #[display("NotFoundError")]
    NotFound,
    #[display("ConflictError")]
    Conflict,
    #[display("UpstreamError")]
    Upstream,
    #[display("ProtocolError")]
    Protocol,
    #[display("TimeoutError")]
    Timeout,
    #[display("LocalIoError")]
    LocalIo,
    #[display("TaskFailed")]
    TaskFailed,
    #[display("Cancelled")]
    Cancelled,
}
