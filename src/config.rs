use crate::prelude::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Represents the invocation's configuration.
///
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub connection: Connection,
    pub tasks: TaskSettings,
}

impl Settings {
    /// Loads the settings from defaults, an optional file and environment
    /// variables, in that order of precedence.
    ///
    /// # Arguments
    ///
    /// * `file`: Optional path to a configuration file. Its format is taken
    ///   from the extension (`yaml`, `json`, `toml`, ...).
    ///
    pub fn load(file: Option<&Path>) -> Result<Self> {
        match dotenv::dotenv() {
            Ok(path) => tracing::info!(target: "config", ?path, ".env loaded."),
            Err(dotenv::Error::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "config", ".env not found, skipped.")
            }
            Err(error) => return Err(error.into()),
        }

        let mut builder = config::Config::builder()
            .set_default("connection.verify_tls", true)?
            .set_default("connection.request_timeout_seconds", 30)?
            .set_default("connection.upload_timeout_seconds", 600)?
            .set_default("tasks.poll_interval_seconds", 5)?
            .set_default("tasks.overall_deadline_seconds", 3600)?;
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("NUTANIX").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.connection.validate()?;
        tracing::info!(target: "config", ?settings, "Configuration loaded.");

        Ok(settings)
    }
}

// -----------------------------------------------------------------------------

/// URL scheme used to reach a product surface.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// All settings required to talk to a Nutanix control plane.
///
/// # Fields
///
/// * `host`: Host name or address, optionally with an explicit `:port`.
/// * `port`: Explicit port; falls back to the surface's default port.
/// * `scheme`: Explicit scheme; falls back to the surface's default scheme.
/// * `verify_tls`: Whether server certificates are validated.
///
#[derive(Debug, Clone, Deserialize)]
pub struct Connection {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub scheme: Option<Scheme>,
    pub username: String,
    pub password: SecretString,
    pub verify_tls: bool,
    pub request_timeout_seconds: u64,
    pub upload_timeout_seconds: u64,
}

impl Connection {
    /// Creates a connection with default timeouts and TLS verification on.
    ///
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_owned(),
            port: None,
            scheme: None,
            username: username.to_owned(),
            password: password.into(),
            verify_tls: true,
            request_timeout_seconds: 30,
            upload_timeout_seconds: 600,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_seconds)
    }

    /// Rejects connection settings that can never produce a usable URL.
    ///
    pub fn validate(&self) -> Result<()> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(Error::Config("connection host is required".to_owned()));
        }
        if host.contains("://") || host.contains('/') {
            return Err(Error::Config(format!(
                "connection host must be a bare host name, got '{}'",
                self.host
            )));
        }
        if self.username.is_empty() {
            return Err(Error::Config("connection username is required".to_owned()));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------

/// Settings of the asynchronous task tracker.
///
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TaskSettings {
    pub poll_interval_seconds: u64,
    pub overall_deadline_seconds: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            overall_deadline_seconds: 3600,
        }
    }
}

impl TaskSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_secs(self.overall_deadline_seconds)
    }
}
