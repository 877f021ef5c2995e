// Query and mutation bindings.
// Ties the service layer, the query cache and stored credentials together for views.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::api::{Api, AuthResponse, FoodsResponse, HttpClient, LoginRequest, RegisterRequest, VerifyOtpRequest};
use crate::config::Config;
use crate::error::Result;
use crate::query::{QueryCache, QueryKey, QueryOptions, QuerySnapshot, Subscription};
use crate::storage::{Credentials, LocalStorage};

/// Cache keys used by the dashboard.
pub mod keys {
    use crate::query::QueryKey;

    pub fn foods() -> QueryKey {
        QueryKey::of("foods")
    }

    pub fn user() -> QueryKey {
        QueryKey::of("user")
    }
}

/// The menu is served from cache for 5 minutes and kept 10 minutes after the last view.
pub const FOODS_OPTIONS: QueryOptions =
    QueryOptions::new(Duration::from_secs(5 * 60), Duration::from_secs(10 * 60));

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// A mounted read binding: one subscription plus the fetcher used to refresh it.
///
/// Dropping the binding unsubscribes. An in-flight fetch keeps running and
/// still lands in the cache.
pub struct QueryBinding<T> {
    subscription: Subscription,
    cache: QueryCache,
    fetcher: Fetcher<T>,
    options: QueryOptions,
}

impl<T: Any + Send + Sync> QueryBinding<T> {
    pub fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    /// Current state of the query; starts a refetch when it is stale.
    pub fn snapshot(&self) -> QuerySnapshot<T> {
        let fetcher = Arc::clone(&self.fetcher);
        self.cache.read(self.key(), move || fetcher(), self.options)
    }

    /// The value, fetching or waiting on the running fetch when needed.
    pub async fn data(&self) -> Result<Arc<T>> {
        let fetcher = Arc::clone(&self.fetcher);
        self.cache.fetch(self.key(), move || fetcher(), self.options).await
    }

    /// Wait for the next change to this query. Returns `false` once the cache is gone.
    pub async fn changed(&mut self) -> bool {
        self.subscription.changed().await
    }
}

/// Bindings shared by every view of the dashboard.
#[derive(Clone)]
pub struct Hooks {
    cache: QueryCache,
    api: Api,
    credentials: Credentials,
}

impl Hooks {
    pub fn new(cache: QueryCache, api: Api, credentials: Credentials) -> Self {
        Self {
            cache,
            api,
            credentials,
        }
    }

    /// Build the full stack: storage, authenticated HTTP client, services and cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = Credentials::new(LocalStorage::at(config.storage_path.clone()));
        let client = HttpClient::from_config(config)?.with_credentials(credentials.clone());
        let cache = QueryCache::new().with_defaults(config.query_defaults);
        Ok(Self::new(cache, Api::new(Arc::new(client)), credentials))
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_authenticated()
    }

    /// The menu list.
    pub fn use_foods(&self) -> QueryBinding<FoodsResponse> {
        let api = self.api.clone();
        self.bind(
            keys::foods(),
            move || {
                let api = api.clone();
                async move { api.get_foods().await }
            },
            FOODS_OPTIONS,
        )
    }

    /// Bind an arbitrary query using the cache-wide freshness defaults.
    pub fn use_query<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryBinding<T>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.bind(key, fetcher, self.cache.defaults())
    }

    fn bind<T, F, Fut>(&self, key: QueryKey, fetcher: F, options: QueryOptions) -> QueryBinding<T>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let subscription = self.cache.subscribe(&key);
        let binding = QueryBinding {
            subscription,
            cache: self.cache.clone(),
            fetcher: Arc::new(move || fetcher().boxed()),
            options,
        };
        // Mounting reads once, which starts the first fetch.
        binding.snapshot();
        binding
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        let response = self.api.login(request).await?;
        self.accept(&response)?;
        Ok(response)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        let response = self.api.register(request).await?;
        self.accept(&response)?;
        Ok(response)
    }

    pub async fn verify_otp(&self, request: &VerifyOtpRequest) -> Result<AuthResponse> {
        let response = self.api.verify_otp(request).await?;
        self.accept(&response)?;
        Ok(response)
    }

    /// Persist a returned token and mark the user query stale.
    fn accept(&self, response: &AuthResponse) -> Result<()> {
        let Some(token) = response.token.as_deref().filter(|token| !token.is_empty()) else {
            return Ok(());
        };
        self.credentials.store_token(token)?;
        let invalidated = self.cache.invalidate(&keys::user());
        info!(invalidated, "credential stored");
        Ok(())
    }

    /// Forget the credential and drop every cached query.
    ///
    /// The cache is cleared even when the credential cannot be removed; the
    /// storage error is returned afterwards.
    pub fn logout(&self) -> Result<()> {
        let removed = self.credentials.clear();
        self.cache.clear();
        match removed {
            Ok(had_token) => {
                info!(had_token, "signed out");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "cache cleared but credential could not be removed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::endpoints;
    use crate::api::testing::FakeTransport;
    use crate::error::FoodDashError;
    use crate::query::ManualClock;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup_at(storage: LocalStorage) -> (Hooks, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        let cache = QueryCache::with_clock(ManualClock::default()).with_defaults(QueryOptions::new(
            Duration::from_secs(300),
            Duration::from_secs(600),
        ));
        let hooks = Hooks::new(cache, Api::new(transport.clone()), Credentials::new(storage));
        (hooks, transport)
    }

    fn setup() -> (Hooks, Arc<FakeTransport>, TempDir) {
        let dir = TempDir::new().unwrap();
        let (hooks, transport) = setup_at(LocalStorage::at(dir.path().join("storage.json")));
        (hooks, transport, dir)
    }

    fn login_request() -> LoginRequest {
        LoginRequest {
            email: "ada@example.com".into(),
            password: "hunter2".into(),
        }
    }

    async fn current_user() -> Result<String> {
        Ok("ada".to_string())
    }

    fn menu() -> serde_json::Value {
        json!({ "data": [{ "id": "1", "name": "Pancakes", "category": "Breakfast", "price": 6.5 }] })
    }

    #[tokio::test]
    async fn test_login_stores_token_and_invalidates_user() {
        let (hooks, transport, _dir) = setup();
        transport.respond(endpoints::LOGIN, json!({ "token": "abc123" }));

        let user = hooks.use_query(keys::user(), current_user);
        user.data().await.unwrap();
        assert!(!user.snapshot().is_stale);

        hooks.login(&login_request()).await.unwrap();

        assert_eq!(hooks.credentials().token().unwrap().as_deref(), Some("abc123"));
        let snapshot = hooks.cache().peek::<String>(&keys::user()).unwrap();
        assert!(snapshot.is_stale);
        assert_eq!(snapshot.data().map(String::as_str), Some("ada"));
    }

    #[tokio::test]
    async fn test_failed_login_leaves_cache_untouched() {
        let (hooks, transport, _dir) = setup();
        transport.fail(endpoints::LOGIN, 401, "Invalid credentials");

        let user = hooks.use_query(keys::user(), current_user);
        user.data().await.unwrap();

        let err = hooks.login(&login_request()).await.unwrap_err();
        assert!(matches!(err, FoodDashError::Http { status: 401, .. }));
        assert_eq!(hooks.credentials().token().unwrap(), None);
        assert!(!hooks.cache().peek::<String>(&keys::user()).unwrap().is_stale);
    }

    #[tokio::test]
    async fn test_register_without_token_does_not_authenticate() {
        let (hooks, transport, _dir) = setup();
        transport.respond(endpoints::REGISTER, json!({ "message": "OTP sent" }));
        transport.respond(endpoints::VERIFY_OTP, json!({ "token": "t-1" }));

        let response = hooks
            .register(&RegisterRequest {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password: "hunter2".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.message.as_deref(), Some("OTP sent"));
        assert!(!hooks.is_authenticated());

        hooks
            .verify_otp(&VerifyOtpRequest {
                email: "ada@example.com".into(),
                otp: "123456".into(),
            })
            .await
            .unwrap();
        assert!(hooks.is_authenticated());
    }

    #[tokio::test]
    async fn test_foods_reads_are_deduplicated() {
        let (hooks, transport, _dir) = setup();
        transport.respond(endpoints::GET_FOODS, menu());

        let list = hooks.use_foods();
        let badge = hooks.use_foods();
        let (first, second) = tokio::join!(list.data(), badge.data());
        let (first, second) = (first.unwrap(), second.unwrap());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.foods[0].name, "Pancakes");
        assert_eq!(transport.calls_to(endpoints::GET_FOODS), 1);
        assert_eq!(hooks.cache().subscriber_count(&keys::foods()), 2);

        drop(badge);
        assert_eq!(hooks.cache().subscriber_count(&keys::foods()), 1);
        assert_eq!(list.options(), FOODS_OPTIONS);
    }

    #[tokio::test]
    async fn test_logout_clears_storage_and_cache() {
        let (hooks, transport, _dir) = setup();
        transport.respond(endpoints::GET_FOODS, menu());
        hooks.credentials().store_token("abc123").unwrap();

        let foods = hooks.use_foods();
        foods.data().await.unwrap();
        assert_eq!(transport.calls_to(endpoints::GET_FOODS), 1);

        hooks.logout().unwrap();
        assert_eq!(hooks.credentials().token().unwrap(), None);
        assert!(hooks.cache().is_empty());

        foods.data().await.unwrap();
        assert_eq!(transport.calls_to(endpoints::GET_FOODS), 2);
    }

    #[tokio::test]
    async fn test_logout_clears_cache_when_storage_fails() {
        let dir = TempDir::new().unwrap();
        // A directory where the storage file should be makes every read fail.
        let (hooks, transport) = setup_at(LocalStorage::at(dir.path()));
        transport.respond(endpoints::GET_FOODS, menu());

        let foods = hooks.use_foods();
        foods.data().await.unwrap();

        assert!(matches!(hooks.logout(), Err(FoodDashError::Io(_))));
        assert!(hooks.cache().is_empty());
    }

    #[tokio::test]
    async fn test_binding_sees_invalidation() {
        let (hooks, _transport, _dir) = setup();
        let mut user = hooks.use_query(keys::user(), current_user);
        user.data().await.unwrap();

        // Consume the notices from mounting and the first fetch.
        assert!(user.changed().await);
        assert!(!user.subscription.has_changed());

        hooks.cache().invalidate(&keys::user());
        assert!(user.subscription.has_changed());
        assert!(user.changed().await);
        assert!(user.snapshot().is_stale);
    }

    #[tokio::test]
    async fn test_foods_gc_window_ignores_cache_default() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::default();
        let transport = Arc::new(FakeTransport::new());
        transport.respond(endpoints::GET_FOODS, menu());
        let cache = QueryCache::with_clock(clock.clone())
            .with_defaults(QueryOptions::new(Duration::ZERO, Duration::from_secs(3600)));
        let hooks = Hooks::new(
            cache,
            Api::new(transport.clone()),
            Credentials::new(LocalStorage::at(dir.path().join("storage.json"))),
        );

        let foods = hooks.use_foods();
        foods.data().await.unwrap();
        drop(foods);

        clock.advance(Duration::from_secs(601));
        assert!(!hooks.cache().contains(&keys::foods()));
    }
}
