// Durable storage module.
// Local key/value persistence and the auth credential kept in it.

pub mod credentials;
pub mod paths;
pub mod store;

pub use credentials::{AUTH_TOKEN_KEY, Credentials};
pub use paths::{data_dir, storage_path};
pub use store::{LocalStorage, StoredItem};
