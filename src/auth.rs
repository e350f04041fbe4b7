use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::credential;
use crate::error::CoreError;
use crate::models::{NewUser, RegisterUserRequest, SessionRecord, User};
use crate::repository::RepositoryState;

/// SessionToken
///
/// An opaque (to callers) signed artifact proving a successful prior authentication.
/// Concretely an HS256 JWT, so remember-me sessions remain verifiable across process
/// restarts without any in-memory state.
pub type SessionToken = String;

/// Claims
///
/// The payload signed into every session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id. Rehydrated from storage on every request.
    pub sub: Uuid,
    /// Expiration Time (exp): timestamp after which the token must not be accepted.
    pub exp: usize,
    /// Issued At (iat): timestamp when the token was issued.
    pub iat: usize,
    /// Token id (jti): keys the persisted session row, so logout can invalidate this
    /// specific token before its expiry.
    pub jti: Uuid,
}

/// SessionManager
///
/// Establishes, resolves, and tears down authenticated sessions. This is the only
/// component that touches credentials or mints tokens; every protected operation
/// resolves its viewer through `resolve_current_identity` and nothing else.
///
/// Session state machine: Anonymous → (authenticate success + start_session) →
/// Authenticated(user_id) → (end_session | expiry) → Anonymous. No other states.
pub struct SessionManager {
    repo: RepositoryState,
    config: AppConfig,
}

impl SessionManager {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self { repo, config }
    }

    /// register
    ///
    /// Hashes the password and creates the identity record. The plaintext never
    /// reaches the repository layer. `DuplicateEmail` surfaces unchanged for the
    /// caller to render.
    pub async fn register(&self, req: RegisterUserRequest) -> Result<User, CoreError> {
        let credential = credential::set_credential(&req.password)?;
        self.repo
            .create_user(NewUser {
                name: req.name,
                email: req.email,
                about: req.about,
                credential,
            })
            .await
    }

    /// authenticate
    ///
    /// Looks up the identity and verifies the credential. Returns `None` on any
    /// mismatch: a missing account and a wrong password are indistinguishable to the
    /// caller, and the missing-account path burns an equivalent hash verification so
    /// the two are not separable by timing either.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, CoreError> {
        match self.repo.find_user_by_email(email).await? {
            Some(user) if credential::verify(&user.hashed_password, password) => Ok(Some(user)),
            Some(_) => Ok(None),
            None => {
                credential::verify_dummy(password);
                Ok(None)
            }
        }
    }

    /// login
    ///
    /// The full login flow the presentation layer calls: authenticate, then start a
    /// session. Any mismatch is the single merged `InvalidCredentials` error, suitable
    /// for rendering as one message.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<(User, SessionToken), CoreError> {
        let Some(user) = self.authenticate(email, password).await? else {
            return Err(CoreError::InvalidCredentials);
        };
        let token = self.start_session(&user, remember).await?;
        Ok((user, token))
    }

    /// start_session
    ///
    /// Mints a signed token bound to the user's id and persists the matching session
    /// row. With `remember`, the token lives for the configured long lifetime
    /// (default 365 days) and, being self-contained, survives process restarts;
    /// otherwise it gets the short lifetime.
    pub async fn start_session(
        &self,
        user: &User,
        remember: bool,
    ) -> Result<SessionToken, CoreError> {
        let now = Utc::now();
        let lifetime = if remember {
            self.config.remember_lifetime
        } else {
            self.config.session_lifetime
        };
        let expires_at = now + lifetime;
        let jti = Uuid::new_v4();

        let claims = Claims {
            sub: user.id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!("session token signing failed: {:?}", e);
            CoreError::Storage
        })?;

        self.repo
            .create_session(SessionRecord {
                id: jti,
                user_id: user.id,
                persistent: remember,
                issued_at: now,
                expires_at,
            })
            .await?;

        tracing::debug!(user = %user.id, session = %jti, remember, "session started");
        Ok(token)
    }

    /// resolve_current_identity
    ///
    /// The single entry point every protected operation must call. Resolves to `None`
    /// when the token is absent in shape (malformed), tampered, expired, logged out
    /// (no session row), or when it no longer maps to an existing user; deleted users
    /// must not keep usable sessions.
    pub async fn resolve_current_identity(
        &self,
        token: &str,
    ) -> Result<Option<User>, CoreError> {
        let Some(claims) = self.decode_claims(token, true) else {
            return Ok(None);
        };

        let Some(session) = self.repo.find_session(claims.jti).await? else {
            // Signed and unexpired, but the session was ended.
            return Ok(None);
        };
        if session.user_id != claims.sub {
            tracing::warn!(session = %claims.jti, "session row does not match token subject");
            return Ok(None);
        }

        self.repo.find_user_by_id(claims.sub).await
    }

    /// end_session
    ///
    /// Invalidates the token by removing its session row. Idempotent: ending an
    /// already-ended, expired, or malformed token is success. The signature is still
    /// required, so only a genuinely issued token can name a session to end.
    pub async fn end_session(&self, token: &str) -> Result<(), CoreError> {
        if let Some(claims) = self.decode_claims(token, false) {
            self.repo.delete_session(claims.jti).await?;
            tracing::debug!(session = %claims.jti, "session ended");
        }
        Ok(())
    }

    /// decode_claims
    ///
    /// Signature validation is unconditional. Expiry validation runs with zero leeway
    /// when requested: the session boundary is exact. Any failure is `None`; the
    /// reason is not surfaced.
    fn decode_claims(&self, token: &str, check_expiry: bool) -> Option<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.validate_exp = check_expiry;

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(_) => None,
        }
    }
}
