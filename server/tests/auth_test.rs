//! Authentication integration tests.
//!
//! Tests for the session lifecycle:
//! - Registration and login
//! - Refresh token rotation
//! - Logout ownership checks
//! - Profile reads and updates
//!
//! Run with: `cargo test --test auth_test`
//! Run ignored (integration) tests: `cargo test --test auth_test -- --ignored`

mod helpers;

use axum::http::{Method, StatusCode};
use helpers::{body_to_json, create_test_user, unique_email, TestApp, TEST_PASSWORD};
use serde_json::json;
use unicorn_server::auth::password::{hash_password, verify_password};
use uuid::Uuid;

// ============================================================================
// Password Hashing Tests (Unit tests - no database required)
// ============================================================================

#[test]
fn test_password_hash_and_verify_success() {
    let password = "secure_password_123!";
    let hash = hash_password(password).expect("Hashing should succeed");

    assert_ne!(hash, password);
    assert!(hash.starts_with("$argon2"));

    let verified = verify_password(password, &hash).expect("Verification should succeed");
    assert!(verified, "Correct password should verify");
}

#[test]
fn test_password_verify_wrong_password() {
    let hash = hash_password("correct_password").expect("Hashing should succeed");

    let verified = verify_password("wrong_password", &hash).expect("Verification should succeed");
    assert!(!verified, "Wrong password should not verify");
}

#[test]
fn test_password_hash_produces_unique_hashes() {
    let password = "same_password";

    let hash1 = hash_password(password).expect("Hashing should succeed");
    let hash2 = hash_password(password).expect("Hashing should succeed");

    assert_ne!(hash1, hash2, "Argon2 should produce unique hashes with different salts");
    assert!(verify_password(password, &hash1).unwrap());
    assert!(verify_password(password, &hash2).unwrap());
}

#[test]
fn test_password_hash_handles_unicode() {
    let unicode_password = "密码🔐パスワード";

    let hash = hash_password(unicode_password).expect("Hashing unicode should succeed");
    assert!(verify_password(unicode_password, &hash).unwrap());
}

#[test]
fn test_password_verify_rejects_malformed_hash() {
    assert!(verify_password("anything", "not-a-phc-string").is_err());
}

// ============================================================================
// Integration Tests (require PostgreSQL)
// ============================================================================

async fn register(app: &TestApp, email: &str) -> serde_json::Value {
    let resp = app
        .send_json(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": email,
                "password": TEST_PASSWORD,
                "birthday": "1815-12-10"
            })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    body_to_json(resp).await
}

fn user_id_of(body: &serde_json::Value) -> Uuid {
    body["user_id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("response carries user_id")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
async fn test_register_then_login() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let email = unique_email();

    let registered = register(&app, &email).await;
    guard.delete_user(user_id_of(&registered));

    assert_eq!(registered["token_type"], "Bearer");
    assert_eq!(registered["expires_in"], app.config.jwt_access_expiry);
    assert_eq!(registered["email"], email);
    assert!(registered["profile"]["username"].is_null());
    assert_eq!(registered["profile"]["squads"], json!([]));

    // Email lookup is case-insensitive
    let resp = app
        .send_json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email.to_uppercase(), "password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_to_json(resp).await;
    assert_eq!(body["user_id"], registered["user_id"]);
    assert_ne!(body["refresh_token"], registered["refresh_token"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (user_id, email) = create_test_user(&app.pool).await;
    guard.delete_user(user_id);

    let resp = app
        .send_json(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "first_name": "Other",
                "last_name": "Person",
                "email": email,
                "password": TEST_PASSWORD
            })),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_to_json(resp).await["error"], "USER_EXISTS");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (user_id, email) = create_test_user(&app.pool).await;
    guard.delete_user(user_id);

    let wrong_password = app
        .send_json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": "not-the-password" })),
        )
        .await;
    let unknown_email = app
        .send_json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": unique_email(), "password": TEST_PASSWORD })),
        )
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_to_json(wrong_password).await,
        body_to_json(unknown_email).await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
async fn test_refresh_rotates_token() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let registered = register(&app, &unique_email()).await;
    guard.delete_user(user_id_of(&registered));
    let first = registered["refresh_token"].clone();

    let resp = app
        .send_json(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": first })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated = body_to_json(resp).await;
    assert_ne!(rotated["refresh_token"], first);

    // The exchanged token is single-use
    let resp = app
        .send_json(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": first })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_to_json(resp).await["error"], "INVALID_REFRESH_TOKEN");

    let resp = app
        .send_json(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": rotated["refresh_token"] })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
async fn test_refresh_rejects_expired_token() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let registered = register(&app, &unique_email()).await;
    guard.delete_user(user_id_of(&registered));

    sqlx::query("UPDATE refresh_tokens SET expires_at = NOW() - INTERVAL '1 second' WHERE user_id = $1")
        .bind(user_id_of(&registered))
        .execute(&app.pool)
        .await
        .unwrap();

    let resp = app
        .send_json(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": registered["refresh_token"] })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
async fn test_logout_checks_ownership() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let alice = register(&app, &unique_email()).await;
    let bob = register(&app, &unique_email()).await;
    guard.delete_user(user_id_of(&alice));
    guard.delete_user(user_id_of(&bob));

    let alice_access = alice["access_token"].as_str().unwrap();

    // Bob's token stays valid when Alice tries to revoke it
    let resp = app
        .send_json(
            Method::POST,
            "/auth/logout",
            Some(alice_access),
            Some(json!({ "refresh_token": bob["refresh_token"] })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .send_json(
            Method::POST,
            "/auth/logout",
            Some(alice_access),
            Some(json!({ "refresh_token": "never-issued" })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .send_json(
            Method::POST,
            "/auth/logout",
            Some(alice_access),
            Some(json!({ "refresh_token": alice["refresh_token"] })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["message"], "Successfully logged out");

    let resp = app
        .send_json(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": alice["refresh_token"] })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .send_json(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": bob["refresh_token"] })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
async fn test_update_username() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (user_id, _) = create_test_user(&app.pool).await;
    guard.delete_user(user_id);
    let token = app.token_for(user_id);

    let resp = app
        .send_json(
            Method::PUT,
            "/auth/me",
            Some(&token),
            Some(json!({ "username": "  stardust  " })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["username"], "stardust");

    let resp = app.send_json(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let profile = body_to_json(resp).await;
    assert_eq!(profile["username"], "stardust");
    assert_eq!(profile["roles"], json!([]));
}
