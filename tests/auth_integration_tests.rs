use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use news_portal::auth::{Claims, SessionManager};
use news_portal::config::AppConfig;
use news_portal::error::CoreError;
use news_portal::models::{RegisterUserRequest, SessionRecord, User};
use news_portal::repository::{MemoryRepository, Repository, RepositoryState};
use news_portal::telemetry;
use std::sync::Arc;
use uuid::Uuid;

// --- Helpers ---

fn setup() -> (SessionManager, RepositoryState, AppConfig) {
    let config = AppConfig::default();
    telemetry::init(&config.env);
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let manager = SessionManager::new(repo.clone(), config.clone());
    (manager, repo, config)
}

async fn register(manager: &SessionManager, email: &str, password: &str) -> User {
    manager
        .register(RegisterUserRequest {
            name: "Test User".to_string(),
            email: email.to_string(),
            about: "about".to_string(),
            password: password.to_string(),
        })
        .await
        .expect("registration should succeed")
}

/// Signs a token with the given secret and an arbitrary expiry offset, mirroring what
/// `start_session` would mint. Negative offsets produce already-expired tokens.
fn craft_token(secret: &str, user_id: Uuid, jti: Uuid, exp_offset_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: (now - 7200).max(0) as usize,
        exp: (now + exp_offset_secs).max(0) as usize,
        jti,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn decode_claims(secret: &str, token: &str) -> Claims {
    let mut validation = Validation::default();
    validation.leeway = 0;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .unwrap()
    .claims
}

// --- Authentication ---

#[tokio::test]
async fn register_then_authenticate_round_trip() {
    let (manager, _repo, _config) = setup();
    let user = register(&manager, "a@x.com", "password-a").await;

    let authenticated = manager.authenticate("a@x.com", "password-a").await.unwrap();
    assert_eq!(authenticated.map(|u| u.id), Some(user.id));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let (manager, _repo, _config) = setup();
    register(&manager, "a@x.com", "password-a").await;

    // Both mismatch cases come back as the same None, not distinct shapes.
    let wrong_password = manager.authenticate("a@x.com", "nope").await.unwrap();
    let unknown_email = manager.authenticate("ghost@x.com", "nope").await.unwrap();
    assert!(wrong_password.is_none());
    assert!(unknown_email.is_none());
}

#[tokio::test]
async fn login_merges_failures_into_invalid_credentials() {
    let (manager, _repo, _config) = setup();
    register(&manager, "a@x.com", "password-a").await;

    let err = manager.login("a@x.com", "nope", false).await.unwrap_err();
    assert_eq!(err, CoreError::InvalidCredentials);
    let err = manager.login("ghost@x.com", "nope", false).await.unwrap_err();
    assert_eq!(err, CoreError::InvalidCredentials);

    let (user, token) = manager.login("a@x.com", "password-a", false).await.unwrap();
    let resolved = manager.resolve_current_identity(&token).await.unwrap();
    assert_eq!(resolved.map(|u| u.id), Some(user.id));
}

// --- Session lifecycle ---

#[tokio::test]
async fn session_round_trip_resolves_the_user() {
    let (manager, _repo, _config) = setup();
    let user = register(&manager, "a@x.com", "password-a").await;

    let token = manager.start_session(&user, false).await.unwrap();
    let resolved = manager.resolve_current_identity(&token).await.unwrap();
    assert_eq!(resolved.map(|u| u.id), Some(user.id));
}

#[tokio::test]
async fn remember_flag_controls_session_lifetime_and_persistence() {
    let (manager, repo, config) = setup();
    let user = register(&manager, "a@x.com", "password-a").await;

    let short_token = manager.start_session(&user, false).await.unwrap();
    let long_token = manager.start_session(&user, true).await.unwrap();

    let short = repo
        .find_session(decode_claims(&config.jwt_secret, &short_token).jti)
        .await
        .unwrap()
        .expect("short session row should exist");
    let long = repo
        .find_session(decode_claims(&config.jwt_secret, &long_token).jti)
        .await
        .unwrap()
        .expect("remember-me session row should exist");

    assert!(!short.persistent);
    assert!(long.persistent);
    assert_eq!(short.expires_at - short.issued_at, config.session_lifetime);
    assert_eq!(long.expires_at - long.issued_at, config.remember_lifetime);
}

#[tokio::test]
async fn expired_token_resolves_to_no_identity() {
    let (manager, repo, config) = setup();
    let user = register(&manager, "a@x.com", "password-a").await;

    // A session that was live once but whose token expired an hour ago.
    let jti = Uuid::new_v4();
    let now = Utc::now();
    repo.create_session(SessionRecord {
        id: jti,
        user_id: user.id,
        persistent: false,
        issued_at: now - Duration::hours(2),
        expires_at: now - Duration::hours(1),
    })
    .await
    .unwrap();

    let token = craft_token(&config.jwt_secret, user.id, jti, -3600);
    let resolved = manager.resolve_current_identity(&token).await.unwrap();
    assert!(resolved.is_none(), "expired tokens must not resolve");
}

#[tokio::test]
async fn tampered_token_resolves_to_no_identity() {
    let (manager, repo, _config) = setup();
    let user = register(&manager, "a@x.com", "password-a").await;

    let jti = Uuid::new_v4();
    let now = Utc::now();
    repo.create_session(SessionRecord {
        id: jti,
        user_id: user.id,
        persistent: false,
        issued_at: now,
        expires_at: now + Duration::hours(1),
    })
    .await
    .unwrap();

    // Valid shape, wrong signing key.
    let forged = craft_token("some-other-secret-entirely", user.id, jti, 3600);
    let resolved = manager.resolve_current_identity(&forged).await.unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn malformed_token_resolves_to_no_identity() {
    let (manager, _repo, _config) = setup();
    let resolved = manager
        .resolve_current_identity("not.a.token")
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn end_session_invalidates_the_token_and_is_idempotent() {
    let (manager, _repo, _config) = setup();
    let user = register(&manager, "a@x.com", "password-a").await;
    let token = manager.start_session(&user, true).await.unwrap();

    manager.end_session(&token).await.unwrap();
    let resolved = manager.resolve_current_identity(&token).await.unwrap();
    assert!(resolved.is_none(), "ended sessions must not resolve");

    // Ending again, or ending garbage, is still success.
    manager.end_session(&token).await.unwrap();
    manager.end_session("not.a.token").await.unwrap();
}

#[tokio::test]
async fn deleted_user_does_not_keep_a_usable_session() {
    let (manager, repo, _config) = setup();
    let user = register(&manager, "a@x.com", "password-a").await;
    let token = manager.start_session(&user, true).await.unwrap();

    assert!(repo.delete_user(user.id).await.unwrap());

    let resolved = manager.resolve_current_identity(&token).await.unwrap();
    assert!(resolved.is_none());
}
