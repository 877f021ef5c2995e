// API request and response types.
// Defines the JSON bodies exchanged with the food ordering backend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// Authenticated user as returned alongside auth responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Response to login, register and OTP verification.
///
/// `token` is only present once the account is fully verified; registration
/// typically answers with a message asking for the OTP instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// A menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Response wrapper for the foods list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodsResponse {
    #[serde(alias = "data", default)]
    pub foods: Vec<Food>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_response_without_token() {
        let resp: AuthResponse =
            serde_json::from_value(json!({ "message": "OTP sent" })).unwrap();
        assert_eq!(resp.token, None);
        assert_eq!(resp.message.as_deref(), Some("OTP sent"));
    }

    #[test]
    fn test_foods_response_accepts_data_field() {
        let body = json!({
            "data": [
                { "id": "1", "name": "Pancakes", "category": "Breakfast", "price": 4.5 }
            ]
        });
        let resp: FoodsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.foods.len(), 1);
        assert_eq!(resp.foods[0].description, None);
    }
}
