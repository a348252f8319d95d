pub mod intent;
pub mod typed;

// -----------------------------------------------------------------------------

use crate::config::TaskSettings;
use crate::list::{LIST_KEYS, ListQuery};
use crate::prelude::{Error, Result, Session};
use crate::task::{TaskHandle, TaskRecord, TaskTracker};
use async_trait::async_trait;
use derive_more::Display;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const NOTHING_TO_CHANGE: &str = "Nothing to change.";

/// Desired state of the entity addressed by an invocation.
///
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum State {
    #[display("present")]
    Present,
    #[display("absent")]
    Absent,
    /// Read-only invocation of an info module.
    #[display("info")]
    Info,
}

/// Action selected for an invocation.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    Update(String),
    Delete(String),
    List,
    Read(String),
}

impl Action {
    /// Routes `(state, ext_id)` to an action.
    ///
    pub fn route(state: State, ext_id: Option<&str>) -> Result<Action> {
        match (state, ext_id) {
            (State::Present, None) => Ok(Action::Create),
            (State::Present, Some(id)) => Ok(Action::Update(id.to_owned())),
            (State::Absent, Some(id)) => Ok(Action::Delete(id.to_owned())),
            (State::Absent, None) => Err(Error::Config(
                "an entity identifier is required when state is absent".to_owned(),
            )),
            (State::Info, None) => Ok(Action::List),
            (State::Info, Some(id)) => Ok(Action::Read(id.to_owned())),
        }
    }
}

// -----------------------------------------------------------------------------

/// Module arguments split into the operation-level options and the entity
/// parameters left for the builder table.
///
/// # Fields
///
/// * `ext_id`: Entity identifier, read from the module's id parameter or
///   `ext_id`.
/// * `wait`: Whether to wait for the server task, `true` by default.
/// * `timeout`: Overrides the configured task deadline.
/// * `list`: Listing options, info modules only.
/// * `params`: Remaining entity parameters, in the order given.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub state: State,
    pub ext_id: Option<String>,
    pub wait: bool,
    pub timeout: Option<Duration>,
    pub list: ListQuery,
    pub params: Map<String, Value>,
}

impl Invocation {
    pub fn parse(info: bool, id_param: &str, mut params: Map<String, Value>) -> Result<Self> {
        let state = match params.shift_remove("state") {
            _ if info => State::Info,
            None | Some(Value::Null) => State::Present,
            Some(Value::String(state)) => match state.as_str() {
                "present" => State::Present,
                "absent" => State::Absent,
                _ => return Err(Error::Config(format!("unsupported state '{}'", state))),
            },
            Some(state) => return Err(Error::Config(format!("unsupported state '{}'", state))),
        };

        let mut ext_id = None;
        for key in [id_param, "ext_id"] {
            match params.shift_remove(key) {
                None | Some(Value::Null) => {}
                Some(Value::String(id)) if !id.is_empty() => {
                    ext_id.get_or_insert(id);
                }
                Some(_) => return Err(Error::Config(format!("'{}' must be a non-empty string", key))),
            }
        }

        let wait = match params.shift_remove("wait") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(wait)) => wait,
            Some(_) => return Err(Error::Config("'wait' must be a boolean".to_owned())),
        };
        let timeout = match params.shift_remove("timeout") {
            None | Some(Value::Null) => None,
            Some(value) => Some(Duration::from_secs(value.as_u64().ok_or_else(|| {
                Error::Config("'timeout' must be a number of seconds".to_owned())
            })?)),
        };

        let list = if info {
            let list = ListQuery::from_params(&params)?;
            params.retain(|key, _| !LIST_KEYS.contains(&key.as_str()));
            list
        } else {
            ListQuery::default()
        };

        Ok(Self {
            state,
            ext_id,
            wait,
            timeout,
            list,
            params,
        })
    }
}

// -----------------------------------------------------------------------------

/// Result document of one invocation.
///
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationResult {
    pub changed: bool,
    pub skipped: bool,
    pub failed: bool,
    pub response: Value,
    pub task_ext_id: Option<String>,
    pub ext_id: Option<String>,
    pub error: Option<String>,
    pub msg: Option<String>,
}

impl OperationResult {
    /// Records an idempotent no-op.
    ///
    pub fn skip(&mut self, current: Value) {
        self.skipped = true;
        self.changed = false;
        self.response = current;
        self.msg = Some(NOTHING_TO_CHANGE.to_owned());
    }

    /// Folds an error into the result. A task attached to the error becomes
    /// the response.
    ///
    pub fn fail(&mut self, error: Error) {
        self.failed = true;
        self.skipped = false;
        self.error = Some(error.kind().to_string());
        self.msg = Some(error.to_string());
        if let Some(task) = error.task() {
            self.task_ext_id.get_or_insert_with(|| task.ext_id.clone());
            self.response = task.to_json();
        }
    }
}

// -----------------------------------------------------------------------------

/// What a module needs to run.
///
#[derive(Debug, Clone)]
pub struct Context {
    pub session: Session,
    pub tasks: TaskSettings,
    pub cancel: CancellationToken,
    pub check_mode: bool,
}

impl Context {
    pub fn new(session: Session, tasks: TaskSettings, cancel: CancellationToken) -> Self {
        Self {
            session,
            tasks,
            cancel,
            check_mode: false,
        }
    }

    pub fn check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Task tracker honoring the invocation's deadline override.
    ///
    pub fn tracker(&self, deadline: Option<Duration>) -> TaskTracker {
        TaskTracker::new(
            self.session.clone(),
            self.tasks.poll_interval(),
            deadline.unwrap_or(self.tasks.overall_deadline()),
            self.cancel.clone(),
        )
    }

    /// Records the task of an accepted mutation and waits for it when asked.
    ///
    /// # Returns
    ///
    /// The terminal task, or `None` when `wait` is off; the task descriptor is
    /// then the response.
    ///
    pub async fn follow(
        &self,
        invocation: &Invocation,
        handle: &TaskHandle,
        out: &mut OperationResult,
    ) -> Result<Option<TaskRecord>> {
        out.task_ext_id = Some(handle.ext_id().to_owned());
        if !invocation.wait {
            out.response = handle.to_json();
            return Ok(None);
        }
        let task = self.tracker(invocation.timeout).wait(handle).await?;
        Ok(Some(task))
    }
}

/// One automation module, e.g. `vpc`. The same module serves its `_info`
/// counterpart through `list` and `read`.
///
/// Actions a module does not support are configuration errors.
///
#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    /// Parameter holding the entity identifier besides `ext_id`.
    ///
    fn id_param(&self) -> &'static str {
        "ext_id"
    }

    fn route(&self, state: State, ext_id: Option<&str>) -> Result<Action> {
        Action::route(state, ext_id)
    }

    async fn create(&self, _ctx: &Context, _inv: &Invocation, _out: &mut OperationResult) -> Result<()> {
        Err(unsupported(self.name(), "create"))
    }

    async fn update(
        &self,
        _ctx: &Context,
        _inv: &Invocation,
        _ext_id: &str,
        _out: &mut OperationResult,
    ) -> Result<()> {
        Err(unsupported(self.name(), "update"))
    }

    async fn delete(
        &self,
        _ctx: &Context,
        _inv: &Invocation,
        _ext_id: &str,
        _out: &mut OperationResult,
    ) -> Result<()> {
        Err(unsupported(self.name(), "delete"))
    }

    async fn read(
        &self,
        _ctx: &Context,
        _inv: &Invocation,
        _ext_id: &str,
        _out: &mut OperationResult,
    ) -> Result<()> {
        Err(unsupported(self.name(), "read"))
    }

    async fn list(&self, _ctx: &Context, _inv: &Invocation, _out: &mut OperationResult) -> Result<()> {
        Err(unsupported(self.name(), "list"))
    }
}

fn unsupported(module: &str, action: &str) -> Error {
    Error::Config(format!("module '{}' does not support {}", module, action))
}

/// Runs one invocation of `module` and folds every outcome into a result.
///
/// # Arguments
///
/// * `info`: Whether the module was invoked as its `_info` variant.
/// * `params`: Module arguments in the order given by the caller.
///
#[tracing::instrument(level = "info", target = "ops", skip_all, fields(module = module.name(), info = info))]
pub async fn dispatch(
    module: &dyn Module,
    ctx: &Context,
    info: bool,
    params: Map<String, Value>,
) -> OperationResult {
    let mut out = OperationResult::default();
    if let Err(error) = run(module, ctx, info, params, &mut out).await {
        tracing::error!(target: "ops", error = %error, kind = %error.kind(), "Invocation failed");
        out.fail(error);
    }
    out
}

async fn run(
    module: &dyn Module,
    ctx: &Context,
    info: bool,
    params: Map<String, Value>,
    out: &mut OperationResult,
) -> Result<()> {
    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled(None));
    }
    let invocation = Invocation::parse(info, module.id_param(), params)?;
    let action = module.route(invocation.state, invocation.ext_id.as_deref())?;
    tracing::info!(target: "ops", ?action, check_mode = ctx.check_mode, wait = invocation.wait, "Action selected");

    match &action {
        Action::Create => module.create(ctx, &invocation, out).await,
        Action::Update(id) => module.update(ctx, &invocation, id, out).await,
        Action::Delete(id) => {
            if ctx.check_mode {
                out.ext_id = Some(id.clone());
                out.response = json!({ "ext_id": id, "state": State::Absent.to_string() });
                return Ok(());
            }
            module.delete(ctx, &invocation, id, out).await
        }
        Action::List => module.list(ctx, &invocation, out).await,
        Action::Read(id) => match module.read(ctx, &invocation, id, out).await {
            Err(Error::NotFound(message)) => {
                tracing::info!(target: "ops", %message, "Entity not found");
                out.ext_id = Some(id.clone());
                out.response = json!({});
                Ok(())
            }
            result => result,
        },
    }
}
