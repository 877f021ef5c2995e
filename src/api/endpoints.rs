// API endpoint paths.
// Static mapping from logical operation to URL path, relative to the configured base URL.

pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";
pub const VERIFY_OTP: &str = "/verify-otp";

pub const GET_FOODS: &str = "/foods";

/// Authentication endpoints.
pub const AUTH: &[&str] = &[LOGIN, REGISTER, VERIFY_OTP];

/// Food endpoints.
pub const FOOD: &[&str] = &[GET_FOODS];

/// Every endpoint the client talks to.
pub const ALL: &[&str] = &[LOGIN, REGISTER, VERIFY_OTP, GET_FOODS];
