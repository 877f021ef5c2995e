// Food ordering API module.
// Endpoint registry, HTTP transport and typed service functions.

pub mod client;
pub mod endpoints;
pub mod services;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{HttpClient, Transport};
pub use services::Api;
pub use types::*;
