use crate::client::NutanixApi;
use crate::client::types::{ApiRequest, ApiResponse, Payload};
use crate::config::Connection;
use crate::prelude::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Attempts made for a replay-safe request whose successful body is cut short.
const MAX_READ_ATTEMPTS: u32 = 3;

/// Concrete implementation of the `NutanixApi` trait using `reqwest` crate.
///
/// Sends every request with `Accept: application/json` and HTTP basic
/// authentication, classifies non-2xx statuses into crate errors and decodes
/// JSON bodies.
///
pub struct NutanixClient {
    client: OnceCell<Client>,
    auth_header: SecretString,
    verify_tls: bool,
    request_timeout: Duration,
}

impl NutanixClient {
    /// Creates a new instance of the Nutanix client.
    ///
    /// # Arguments
    ///
    /// * `connection`: Connection settings providing credentials, TLS
    ///   verification and the default request timeout.
    ///
    pub fn new(connection: &Connection) -> Self {
        let credentials = format!(
            "{}:{}",
            connection.username,
            connection.password.expose_secret()
        );
        let auth_header = format!("Basic {}", STANDARD.encode(credentials));

        Self {
            client: OnceCell::new(),
            auth_header: auth_header.into(),
            verify_tls: connection.verify_tls,
            request_timeout: connection.request_timeout(),
        }
    }

    /// Lazily initializes and returns a reference to the `reqwest::Client`.
    ///
    /// If the client has not been initialized yet, it will be built on the
    /// first call with default headers (including Authorization). Subsequent
    /// calls will return the existing client.
    ///
    async fn get_client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                let mut auth_header = HeaderValue::from_str(self.auth_header.expose_secret())?;
                auth_header.set_sensitive(true);

                let mut headers = HeaderMap::new();
                headers.insert(AUTHORIZATION, auth_header);
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

                Client::builder()
                    .default_headers(headers)
                    .danger_accept_invalid_certs(!self.verify_tls)
                    .use_rustls_tls()
                    .build()
                    .map_err(Error::from)
            })
            .await
    }

    /// Sends a single attempt of the request.
    ///
    /// # Returns
    ///
    /// `Attempt::Truncated` when the status was successful but reading the
    /// body failed midway, `Attempt::Complete` otherwise.
    ///
    async fn attempt(&self, request: ApiRequest) -> Result<Attempt> {
        let client = self.get_client().await?;
        let ApiRequest {
            method,
            url,
            headers,
            payload,
            timeout,
            ..
        } = request;
        tracing::debug!(target: "client", %method, %url, "Sending request");

        let mut builder = client
            .request(method.clone(), url.clone())
            .headers(headers)
            .timeout(timeout.unwrap_or(self.request_timeout));
        builder = match payload {
            Payload::Empty => builder,
            Payload::Json(body) => {
                tracing::trace!(target: "client", %body, "Request body");
                builder.json(&body)
            }
            Payload::Form(pairs) => builder.form(&pairs),
            Payload::Upload(reader) => builder
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_LENGTH, reader.total_len())
                .body(reqwest::Body::wrap_stream(reader.into_stream())),
        };

        let response = builder.send().await.map_err(|error| {
            if error.is_timeout() {
                Error::Timeout(format!("{} {} timed out", method, url))
            } else {
                Error::from(error)
            }
        })?;
        let status = response.status();
        let headers = response.headers().clone();

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(error) if status.is_success() && !error.is_timeout() => {
                return Ok(Attempt::Truncated(error));
            }
            Err(error) => return Err(error.into()),
        };
        tracing::debug!(target: "client", %method, %url, %status, "Received response");

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            tracing::trace!(target: "client", body = %text, "Error body");
            return Err(classify(status, &url, text));
        }

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|error| {
                Error::Protocol(format!("invalid JSON from {} {}: {}", method, url, error))
            })?
        };
        tracing::trace!(target: "client", %body, "Response body");

        Ok(Attempt::Complete(ApiResponse {
            status,
            headers,
            body,
        }))
    }
}

enum Attempt {
    Complete(ApiResponse),
    Truncated(reqwest::Error),
}

/// Maps a non-2xx status to the crate's error taxonomy.
///
fn classify(status: StatusCode, url: &url::Url, body: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(status, body),
        StatusCode::NOT_FOUND => Error::NotFound(format!("{} ({})", url.path(), body)),
        StatusCode::PRECONDITION_FAILED => Error::Conflict(body),
        _ => Error::Upstream(status, body),
    }
}

#[async_trait]
impl NutanixApi for NutanixClient {
    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 1;
        loop {
            let replay = request.try_replay();
            match self.attempt(request).await? {
                Attempt::Complete(response) => return Ok(response),
                Attempt::Truncated(error) => match replay {
                    Some(next) if attempt < MAX_READ_ATTEMPTS => {
                        tracing::warn!(target: "client", %error, attempt, "Truncated response body, retrying");
                        attempt += 1;
                        request = next;
                    }
                    _ => return Err(error.into()),
                },
            }
        }
    }
}
