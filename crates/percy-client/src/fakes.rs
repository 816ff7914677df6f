//! In-memory transport for exercising the client without a server (testing only)
//!
//! `RecordingTransport` answers each URL from a script and records every
//! request it sees. Clones share state, so a test can hand one clone to a
//! client and inspect the other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::connection::Transport;
use crate::error::{PercyError, Result};

/// One request seen by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    /// JSON body; `Null` for GET.
    pub body: Value,
}

#[derive(Debug, Clone)]
enum Scripted {
    Json(Value),
    Status { status: u16, body: String },
}

#[derive(Debug, Default)]
struct State {
    responses: HashMap<String, Scripted>,
    requests: Vec<RecordedRequest>,
}

/// Scripted [`Transport`]. Unscripted URLs answer `{}`.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<State>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `url` with `response`.
    pub fn respond(&self, url: &str, response: Value) {
        self.lock()
            .responses
            .insert(url.to_string(), Scripted::Json(response));
    }

    /// Answer requests to `url` with an API error.
    pub fn fail(&self, url: &str, status: u16, body: &str) {
        self.lock().responses.insert(
            url.to_string(),
            Scripted::Status {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Every request so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.lock().requests.last().cloned()
    }

    /// Requests whose URL ends with `suffix`.
    pub fn requests_to(&self, suffix: &str) -> Vec<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.url.ends_with(suffix))
            .cloned()
            .collect()
    }

    fn record(&self, method: &'static str, url: &str, body: Value) -> Result<Value> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method,
            url: url.to_string(),
            body,
        });
        match state.responses.get(url) {
            Some(Scripted::Json(value)) => Ok(value.clone()),
            Some(Scripted::Status { status, body }) => Err(PercyError::Api {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(Value::Object(Default::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for RecordingTransport {
    fn get(&self, url: &str) -> Result<Value> {
        self.record("GET", url, Value::Null)
    }

    fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.record("POST", url, body.clone())
    }
}
