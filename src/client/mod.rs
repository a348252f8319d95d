pub mod endpoint;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

// -----------------------------------------------------------------------------

use crate::client::endpoint::Endpoint;
use crate::client::types::{ApiRequest, ApiResponse};
use crate::config::Connection;
use crate::prelude::Result;
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use url::Url;

/// Transport seam of the crate: sends one request to a Nutanix surface and
/// returns the classified, decoded response.
///
/// Any status outside 200-299 comes back as an error, so callers only ever see
/// successful responses.
///
#[async_trait]
pub trait NutanixApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Everything needed to reach the control plane during one invocation.
///
#[derive(Clone)]
pub struct Session {
    pub api: Arc<dyn NutanixApi + Send + Sync>,
    pub connection: Arc<Connection>,
}

impl Session {
    pub fn new(api: Arc<dyn NutanixApi + Send + Sync>, connection: Arc<Connection>) -> Self {
        Self { api, connection }
    }

    /// Builds and validates the URL of `endpoint` on this session's host.
    ///
    pub fn url(&self, endpoint: &Endpoint) -> Result<Url> {
        endpoint.build(&self.connection)
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.api.send(request).await
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("Api", &"Arc<dyn NutanixApi>")
            .field("Connection", &self.connection)
            .finish()
    }
}
