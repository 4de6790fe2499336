//! Scripted transport and sleeper for exercising reconcilers without a
//! network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

use super::rest::Sleeper;
use super::transport::{Method, RawResponse, Request, Transport};

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Recorded {
    /// Certificate issuance rides on a GET verb but mutates remote state.
    pub fn is_mutating(&self) -> bool {
        self.method != Method::Get || self.path == "/pullzone/loadFreeCertificate"
    }
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<HashMap<(Method, String), Vec<RawResponse>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `(method, path)`. The last queued response for a
    /// key is replayed once the queue ahead of it is drained.
    pub fn on(&self, method: Method, path: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push(RawResponse {
                status,
                body: body.to_string(),
            });
    }

    pub fn on_json(&self, method: Method, path: &str, status: u16, body: Value) {
        self.on(method, path, status, &body.to_string());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn mutating_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(Recorded::is_mutating)
            .collect()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(Recorded {
            method: request.method,
            path: request.path.clone(),
            query: request.query.clone(),
            body: request.body.clone(),
        });

        let mut responses = self.responses.lock().unwrap();
        let response = match responses.get_mut(&(request.method, request.path.clone())) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) => queue[0].clone(),
            None => RawResponse {
                status: 404,
                body: format!(
                    "no scripted response for {} {}",
                    request.method.as_str(),
                    request.path
                ),
            },
        };
        Ok(response)
    }
}

#[derive(Default)]
pub(crate) struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
