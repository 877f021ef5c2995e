// In-memory transport for tests.
// Serves canned bodies or errors per path and records every call.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{FoodDashError, Result};

use super::client::Transport;

#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
enum Canned {
    Body(Value),
    Error { status: u16, message: String },
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<String, Canned>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Canned::Body(body));
    }

    pub fn fail(&self, path: &str, status: u16, message: &str) {
        self.responses.lock().unwrap().insert(
            path.to_string(),
            Canned::Error {
                status,
                message: message.to_string(),
            },
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.path == path)
            .count()
    }

    fn answer(&self, method: &'static str, path: &str, body: Option<Value>) -> Result<Value> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            body,
        });

        match self.responses.lock().unwrap().get(path).cloned() {
            Some(Canned::Body(body)) => Ok(body),
            Some(Canned::Error { status, message }) => Err(FoodDashError::Http { status, message }),
            None => Err(FoodDashError::NotFound(path.to_string())),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str) -> Result<Value> {
        self.answer("GET", path, None)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.answer("POST", path, Some(body))
    }
}
