//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum router,
//! plus utilities for user creation, catalog entries, memberships and JWT generation.
//!
//! ## Pools
//!
//! Every test gets its own pool from [`test_pool()`]. A pool's connections
//! belong to the runtime that opened them, and each `#[tokio::test]` runs on
//! its own runtime, so pools are never shared between tests. Database tests
//! use the multi-threaded flavor so [`CleanupGuard`] can block on drop.
//!
//! ## Cleanup Guards
//!
//! Use [`CleanupGuard`] for RAII-based cleanup that runs even if a test panics.
#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use unicorn_server::api::{create_router, AppState};
use unicorn_server::auth::jwt;
use unicorn_server::auth::password::hash_password;
use unicorn_server::config::Config;
use unicorn_server::db::{self, MembershipStatus, NewUser};
use uuid::Uuid;

/// Password given to every user created by [`create_test_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

// ============================================================================
// Shared resources
// ============================================================================

/// Shared config across all tests in the same binary.
static SHARED_CONFIG: OnceCell<Config> = OnceCell::const_new();

/// Open a pool for the current test and apply migrations.
pub async fn test_pool() -> PgPool {
    let config = shared_config().await;
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to test DB");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Get or create a shared config.
pub async fn shared_config() -> &'static Config {
    SHARED_CONFIG
        .get_or_init(|| async { Config::default_for_test() })
        .await
}

// ============================================================================
// Cleanup Guard
// ============================================================================

/// Async cleanup action type.
type CleanupAction = Box<dyn FnOnce(PgPool) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// RAII guard that runs cleanup actions on drop, even if the test panics.
pub struct CleanupGuard {
    pool: PgPool,
    actions: Vec<CleanupAction>,
}

impl CleanupGuard {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            actions: Vec::new(),
        }
    }

    /// Register a generic async cleanup action.
    pub fn add<F, Fut>(&mut self, action: F)
    where
        F: FnOnce(PgPool) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.actions
            .push(Box::new(move |pool| Box::pin(action(pool))));
    }

    /// Delete a user (cascades to tokens, grants and memberships).
    pub fn delete_user(&mut self, user_id: Uuid) {
        self.delete_row("users", user_id);
    }

    /// Delete a squad (cascades to memberships and chatboard grants).
    pub fn delete_squad(&mut self, squad_id: Uuid) {
        self.delete_row("squads", squad_id);
    }

    /// Delete a country.
    pub fn delete_country(&mut self, country_id: Uuid) {
        self.delete_row("countries", country_id);
    }

    /// Delete a chatboard (cascades to its access specification).
    pub fn delete_chatboard(&mut self, chatboard_id: Uuid) {
        self.delete_row("chatboards", chatboard_id);
    }

    fn delete_row(&mut self, table: &'static str, id: Uuid) {
        self.add(move |pool| async move {
            let _ = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
                .bind(id)
                .execute(&pool)
                .await;
        });
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let actions = std::mem::take(&mut self.actions);
        if actions.is_empty() {
            return;
        }

        let pool = self.pool.clone();
        let handle = tokio::runtime::Handle::current();

        // Spawn a blocking thread to run async cleanup.
        // This works regardless of tokio runtime flavor.
        std::thread::spawn(move || {
            handle.block_on(async move {
                for action in actions {
                    action(pool.clone()).await;
                }
            });
        })
        .join()
        .expect("Cleanup thread panicked");
    }
}

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a new test app over a fresh pool.
    pub async fn new() -> Self {
        let pool = test_pool().await;
        let config = shared_config().await.clone();
        Self::build(pool, config)
    }

    /// Build a test app over any pool, including a lazy one that never connects.
    pub fn build(pool: PgPool, config: Config) -> Self {
        let state = AppState::new(pool.clone(), config.clone());
        Self {
            router: create_router(state),
            pool,
            config: Arc::new(config),
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a JSON request, optionally authenticated with `token`.
    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Self::request(method, uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.oneshot(request).await
    }

    /// Create a [`CleanupGuard`] for this app's pool.
    pub fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard::new(self.pool.clone())
    }

    /// Access token for `user_id` signed with this app's secret.
    pub fn token_for(&self, user_id: Uuid) -> String {
        generate_access_token(&self.config, user_id)
    }
}

// ============================================================================
// User & Auth helpers
// ============================================================================

/// Unique lowercase email for one test user.
pub fn unique_email() -> String {
    format!("test_{}@example.com", &Uuid::new_v4().simple().to_string()[..12])
}

/// Create a test user with [`TEST_PASSWORD`] and return `(user_id, email)`.
pub async fn create_test_user(pool: &PgPool) -> (Uuid, String) {
    let email = unique_email();
    let password_hash = hash_password(TEST_PASSWORD).expect("Failed to hash password");
    let user = db::create_user(
        pool,
        &NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name: "Test",
            last_name: "User",
            birthday: None,
        },
    )
    .await
    .expect("Failed to create test user");

    (user.id, email)
}

/// Generate an access token for the given user.
pub fn generate_access_token(config: &Config, user_id: Uuid) -> String {
    jwt::create_access_token(user_id, &config.jwt_secret, config.jwt_access_expiry)
        .expect("Failed to create access token")
}

/// Look up a seeded role by name.
pub async fn role_id(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("Seeded role {name} missing: {e}"))
}

/// Grant a global role by name.
pub async fn grant_role(pool: &PgPool, user_id: Uuid, role: &str) {
    let role_id = role_id(pool, role).await;
    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await
        .expect("Failed to grant role");
}

/// Create a squad with a unique name.
pub async fn create_squad(pool: &PgPool, prefix: &str) -> Uuid {
    let name = format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..8]);
    db::create_squad(pool, &name)
        .await
        .expect("Failed to create squad")
        .id
}

/// Create a country with a unique name.
pub async fn create_country(pool: &PgPool, prefix: &str) -> Uuid {
    let name = format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..8]);
    db::create_country(pool, &name)
        .await
        .expect("Failed to create country")
        .id
}

/// Insert or overwrite a squad membership.
pub async fn set_membership(pool: &PgPool, user_id: Uuid, squad_id: Uuid, status: MembershipStatus) {
    sqlx::query(
        r"
        INSERT INTO user_squads (user_id, squad_id, status) VALUES ($1, $2, $3)
        ON CONFLICT (user_id, squad_id) DO UPDATE SET status = EXCLUDED.status
        ",
    )
    .bind(user_id)
    .bind(squad_id)
    .bind(status)
    .execute(pool)
    .await
    .expect("Failed to set membership");
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
