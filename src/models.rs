use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// StoredCredential
///
/// The stored form of a password credential: a PHC-formatted Argon2id hash string
/// carrying its own salt and parameters. The plaintext it was derived from is never
/// persisted, logged, or serialized anywhere in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct StoredCredential(String);

impl StoredCredential {
    /// Wraps an already-encoded PHC string. Only the credential module produces these
    /// in normal flow; this constructor exists for hydration from storage.
    pub fn from_phc(phc: String) -> Self {
        Self(phc)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// User
///
/// The canonical identity record. `id` and `created_date` are assigned at creation and
/// never change; `email` is the login identifier and unique across all users
/// (exact, case-sensitive match).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub about: String,
    pub email: String,
    /// Never serialized outward; the hash still must not leave the trust boundary.
    #[serde(skip_serializing)]
    pub hashed_password: StoredCredential,
    pub created_date: DateTime<Utc>,
}

/// News
///
/// A short content record owned by exactly one user. `user_id` is set at creation and
/// immutable; ownership never transfers. `is_private` restricts readers to the owner
/// but has no effect on who may mutate (always the owner, only the owner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct News {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub is_private: bool,
    pub user_id: Uuid,
    pub created_date: DateTime<Utc>,
}

/// SessionRecord
///
/// One row per live session, keyed by the token's `jti`. The signed token carries the
/// authoritative expiry; this row exists so logout sticks (deleting it invalidates the
/// token early) and so remember-me sessions survive process restarts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// True for remember-me sessions (long lifetime), false for short-lived ones.
    pub persistent: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for registration. The presentation layer has already validated
/// required-ness; the password field is consumed by the credential store and is never
/// persisted or logged in this form.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub about: String,
    pub password: String,
}

/// NewUser
///
/// The identity-repository insert payload: display fields plus the already-hashed
/// credential. Separating this from `RegisterUserRequest` keeps plaintext out of the
/// repository layer entirely.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub about: String,
    pub credential: StoredCredential,
}

/// NewsDraft
///
/// Input payload for creating a news item. `is_private` defaults to false.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
}

/// NewsUpdate
///
/// Owner edit payload. Uses `Option<T>` per field so only provided fields change;
/// passing all three replaces the record's editable content wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

/// UserUpdate
///
/// The administrative field allow-list, expressed structurally: only these three user
/// fields are assignable out of band, and anything else is unrepresentable. `id` and
/// the credential are deliberately absent. Every applied update also re-stamps the
/// record's `created_date` (long-standing fix-up behaviour of the admin tool).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,

    /// Email writes still pass through uniqueness enforcement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserUpdate {
    /// True when no field is set. An empty update still stamps `created_date`.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.about.is_none() && self.email.is_none()
    }
}
