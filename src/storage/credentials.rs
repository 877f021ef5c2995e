// Stored credential handling.
// The auth token lives in durable storage, independent of the query cache.

use tracing::warn;

use crate::error::Result;

use super::store::LocalStorage;

/// Storage key of the auth token.
pub const AUTH_TOKEN_KEY: &str = "authToken";

#[derive(Debug, Clone)]
pub struct Credentials {
    storage: LocalStorage,
}

impl Credentials {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Current token, if one is stored.
    pub fn token(&self) -> Result<Option<String>> {
        self.storage.get_item(AUTH_TOKEN_KEY)
    }

    pub fn store_token(&self, token: &str) -> Result<()> {
        self.storage.set_item(AUTH_TOKEN_KEY, token)
    }

    /// Forget the token. Returns whether one was stored.
    pub fn clear(&self) -> Result<bool> {
        self.storage.remove_item(AUTH_TOKEN_KEY)
    }

    /// Whether a non-empty token is stored. Unreadable storage counts as signed out.
    pub fn is_authenticated(&self) -> bool {
        match self.token() {
            Ok(token) => token.is_some_and(|t| !t.is_empty()),
            Err(err) => {
                warn!(error = %err, "could not read stored credential");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_token_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let creds = Credentials::new(LocalStorage::at(temp_dir.path().join("s.json")));

        assert!(!creds.is_authenticated());
        creds.store_token("abc123").unwrap();
        assert!(creds.is_authenticated());
        assert_eq!(
            creds.storage().get_item("authToken").unwrap().as_deref(),
            Some("abc123")
        );

        assert!(creds.clear().unwrap());
        assert!(!creds.is_authenticated());
        assert!(!creds.clear().unwrap());
    }

    #[test]
    fn test_empty_token_is_signed_out() {
        let temp_dir = TempDir::new().unwrap();
        let creds = Credentials::new(LocalStorage::at(temp_dir.path().join("s.json")));
        creds.store_token("").unwrap();
        assert!(!creds.is_authenticated());
    }

    #[test]
    fn test_unreadable_storage_is_signed_out() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("s.json");
        std::fs::write(&path, "garbage").unwrap();
        assert!(!Credentials::new(LocalStorage::at(path)).is_authenticated());
    }
}
