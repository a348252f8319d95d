use crate::client::NutanixApi;
use crate::client::types::{ApiRequest, ApiResponse, Payload};
use crate::config::Connection;
use crate::prelude::{Result, Session};
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use url::Url;

/// What the mock saw for one request. Upload payloads are drained and the
/// length of every read is recorded, including the final empty one.
///
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub reads: Vec<usize>,
}

type Responder = Box<dyn Fn(&RecordedRequest) -> Result<ApiResponse> + Send + Sync>;

/// Scripted in-memory `NutanixApi` for unit tests.
///
pub struct MockApi {
    responder: Responder,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockApi {
    /// Answers every request with the given closure.
    ///
    pub fn with<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&RecordedRequest) -> Result<ApiResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answers requests with the queued responses, in order.
    ///
    pub fn sequence(responses: Vec<Result<ApiResponse>>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::with(move |request| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request: {} {}", request.method, request.url))
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn session(self: &Arc<Self>) -> Session {
        let connection = Connection::new("pc.example.com", "admin", "secret");
        Session::new(self.clone(), Arc::new(connection))
    }
}

#[async_trait]
impl NutanixApi for MockApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut recorded = RecordedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body: None,
            reads: Vec::new(),
        };
        match request.payload {
            Payload::Empty => {}
            Payload::Json(body) => recorded.body = Some(body),
            Payload::Form(pairs) => {
                recorded.body = Some(pairs.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
            Payload::Upload(mut reader) => loop {
                let chunk = reader.read_chunk().await?;
                recorded.reads.push(chunk.len());
                if chunk.is_empty() {
                    break;
                }
            },
        }

        let response = (self.responder)(&recorded);
        self.requests.lock().unwrap().push(recorded);
        response
    }
}
