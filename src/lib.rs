// fooddash client core.
// API services, a client-side query cache, stored credentials and route guards for the food dashboard.

pub mod api;
pub mod config;
pub mod error;
pub mod forms;
pub mod hooks;
pub mod logging;
pub mod query;
pub mod routes;
pub mod storage;

pub use error::{FoodDashError, Result};
