use crate::client::transport::NutanixClient;
use crate::config::Settings;
use crate::ops::{Context, OperationResult, dispatch};
use crate::prelude::{Error, Module, Result, Session};
use crate::resources::{self, MODULES};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, clap::Parser)]
#[command(
    name = "ntnx",
    version = "0.1.0",
    about = "Converges one Nutanix resource towards its desired state"
)]
pub struct Cli {
    #[arg(help = "Module to run, e.g. `vpc` or `vpc_info`")]
    pub module: String,
    #[arg(
        short,
        long,
        help = "Configuration file with connection and task settings",
        env = "NUTANIX_CONFIG"
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short,
        long,
        help = "JSON file with the module arguments, `-` reads stdin",
        env = "NUTANIX_PARAMS"
    )]
    pub params: Option<PathBuf>,
    #[arg(long, help = "Build the request without sending any mutation")]
    pub check: bool,
}

impl Cli {
    /// Reads the module arguments named by `--params`.
    ///
    pub fn read_params(&self) -> Result<Map<String, Value>> {
        let text = match self.params.as_deref() {
            None => return Ok(Map::new()),
            Some(path) if path.as_os_str() == "-" => std::io::read_to_string(std::io::stdin())?,
            Some(path) => std::fs::read_to_string(path)?,
        };
        parse_params(&text)
    }
}

/// Parses module arguments; blank input means no arguments.
///
pub fn parse_params(text: &str) -> Result<Map<String, Value>> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(text) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(_) => Err(Error::Config("module arguments must be a JSON object".to_owned())),
        Err(error) => Err(Error::Config(format!("invalid module arguments: {}", error))),
    }
}

/// Runs the invocation described by `cli`. Every failure, including bad
/// settings, ends up in the returned result.
///
pub async fn run(cli: &Cli, cancel: CancellationToken) -> OperationResult {
    match prepare(cli, cancel) {
        Ok((module, info, ctx, params)) => dispatch(module, &ctx, info, params).await,
        Err(error) => {
            tracing::error!(target: "cli", %error, "Invocation could not start");
            let mut out = OperationResult::default();
            out.fail(error);
            out
        }
    }
}

type Prepared = (&'static dyn Module, bool, Context, Map<String, Value>);

fn prepare(cli: &Cli, cancel: CancellationToken) -> Result<Prepared> {
    let (module, info) = resources::lookup(&cli.module).ok_or_else(|| {
        Error::Config(format!(
            "unknown module '{}', expected one of {} (optionally with an _info suffix)",
            cli.module,
            MODULES.join(", ")
        ))
    })?;
    let params = cli.read_params()?;
    let settings = Settings::load(cli.config.as_deref())?;

    let client = NutanixClient::new(&settings.connection);
    let session = Session::new(Arc::new(client), Arc::new(settings.connection));
    tracing::info!(target: "cli", module = module.name(), info, ?session, "Session ready.");

    let ctx = Context::new(session, settings.tasks, cancel).check_mode(cli.check);
    Ok((module, info, ctx, params))
}
