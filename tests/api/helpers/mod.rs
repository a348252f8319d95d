pub mod payload;

// -------------------------------------------------------------------------

use nutanix_ops::client::transport::NutanixClient;
use nutanix_ops::config::{Connection, Scheme, TaskSettings};
use nutanix_ops::ops::dispatch;
use nutanix_ops::prelude::{Context, OperationResult, Session};
use nutanix_ops::resources;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

/// Test helper that runs a mock Nutanix control plane and a context whose
/// session points at it.
///
pub struct TestApp {
    pub server: MockServer,
    pub ctx: Context,
}

impl TestApp {
    /// Creates a new `TestApp` polling tasks every second.
    ///
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let address = server.address();
        let connection = Connection::new(&address.ip().to_string(), "admin", "secret")
            .with_port(address.port())
            .with_scheme(Scheme::Http);
        let client = NutanixClient::new(&connection);
        let session = Session::new(Arc::new(client), Arc::new(connection));
        let tasks = TaskSettings {
            poll_interval_seconds: 1,
            overall_deadline_seconds: 30,
        };

        TestApp {
            server,
            ctx: Context::new(session, tasks, CancellationToken::new()),
        }
    }

    /// Runs module `name` (optionally `_info`) with the given arguments.
    ///
    pub async fn run(&self, name: &str, params: Value) -> OperationResult {
        let (module, info) = resources::lookup(name).unwrap();
        dispatch(module, &self.ctx, info, params.as_object().cloned().unwrap()).await
    }
}
