// Service functions for the food ordering API.
// One typed call per business operation; transport errors pass through unchanged.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::Result;

use super::client::Transport;
use super::endpoints;
use super::types::{AuthResponse, FoodsResponse, LoginRequest, RegisterRequest, VerifyOtpRequest};

/// Typed API surface over a shared transport.
#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
}

impl Api {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.transport.post(path, body).await?;
        decode(response)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.transport.get(path).await?;
        decode(response)
    }

    /// Exchange email and password for an auth token.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse> {
        self.post(endpoints::LOGIN, credentials).await
    }

    /// Create an account; the server usually follows up with an OTP.
    pub async fn register(&self, user: &RegisterRequest) -> Result<AuthResponse> {
        self.post(endpoints::REGISTER, user).await
    }

    /// Confirm the one-time password sent after registration.
    pub async fn verify_otp(&self, otp: &VerifyOtpRequest) -> Result<AuthResponse> {
        self.post(endpoints::VERIFY_OTP, otp).await
    }

    /// List the menu.
    pub async fn get_foods(&self) -> Result<FoodsResponse> {
        self.get(endpoints::GET_FOODS).await
    }
}

/// Decode a response body. An empty body reads as an empty object, so
/// responses whose fields all have defaults still decode.
fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
    let body = match body {
        Value::Null => Value::Object(Map::new()),
        body => body,
    };
    Ok(serde_json::from_value(body)?)
}
