use crate::prelude::Result;
use crate::upload::ChunkReader;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, IF_MATCH};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use url::Url;

/// Header carrying the client-generated id that lets v4 surfaces
/// de-duplicate retried mutations.
pub const REQUEST_ID: HeaderName = HeaderName::from_static("ntnx-request-id");

/// Body of an outgoing request.
///
pub enum Payload {
    Empty,
    /// Sent as `application/json`.
    Json(Value),
    /// Sent as `application/x-www-form-urlencoded`, used by legacy Foundation
    /// endpoints.
    Form(Vec<(String, String)>),
    /// Streamed as `application/octet-stream` with a computed length.
    Upload(ChunkReader),
}

impl Payload {
    /// Copies the payload, unless it is a stream that can only be consumed
    /// once.
    ///
    pub fn try_clone(&self) -> Option<Payload> {
        match self {
            Payload::Empty => Some(Payload::Empty),
            Payload::Json(body) => Some(Payload::Json(body.clone())),
            Payload::Form(pairs) => Some(Payload::Form(pairs.clone())),
            Payload::Upload(_) => None,
        }
    }
}

impl Debug for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Json(body) => f.debug_tuple("Json").field(body).finish(),
            Payload::Form(pairs) => f.debug_tuple("Form").field(pairs).finish(),
            Payload::Upload(reader) => f
                .debug_struct("Upload")
                .field("total_len", &reader.total_len())
                .finish(),
        }
    }
}

// -----------------------------------------------------------------------------

/// One request to a Nutanix surface.
///
/// # Fields
///
/// * `timeout`: Per-request timeout; `None` uses the connection default.
/// * `replay_safe`: Whether the transport may re-send the request when a
///   successful response body is cut short.
///
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub payload: Payload,
    pub timeout: Option<Duration>,
    pub replay_safe: bool,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        let replay_safe = method == Method::GET;
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            payload: Payload::Empty,
            timeout: None,
            replay_safe,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.payload = Payload::Json(body);
        self
    }

    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.payload = Payload::Form(pairs);
        self
    }

    pub fn upload(mut self, reader: ChunkReader) -> Self {
        self.payload = Payload::Upload(reader);
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }

    /// Attaches the ETag obtained from the preceding read.
    ///
    pub fn if_match(self, etag: &str) -> Result<Self> {
        self.header(IF_MATCH, etag)
    }

    /// Attaches a fresh `NTNX-Request-Id`.
    ///
    pub fn request_id(mut self) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            self.headers.insert(REQUEST_ID, value);
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks a non-GET request (such as a list POST) as safe to re-send.
    ///
    pub fn replay_safe(mut self) -> Self {
        self.replay_safe = true;
        self
    }

    /// Copies the request for a re-send, if it is replay safe.
    ///
    pub fn try_replay(&self) -> Option<Self> {
        if !self.replay_safe {
            return None;
        }
        Some(Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            payload: self.payload.try_clone()?,
            timeout: self.timeout,
            replay_safe: true,
        })
    }
}

/// Successful, decoded response.
///
/// # Fields
///
/// * `body`: Decoded JSON body, `Value::Null` for an empty body.
///
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }
}
