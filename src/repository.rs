use crate::error::CoreError;
use crate::models::{News, NewsDraft, NewsUpdate, NewUser, SessionRecord, User, UserUpdate};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for the storage engine collaborator: every durable read and
/// write of users, news, and sessions goes through here, and each method is a single
/// atomic operation (no cross-call locking by callers). This keeps the identity,
/// session, and access-control logic testable against an in-memory implementation and
/// deployable against Postgres without changing a line of it.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---

    /// Creates a user. Fails with `DuplicateEmail` if another user already holds the
    /// exact same email; never silently overwrites.
    async fn create_user(&self, new_user: NewUser) -> Result<User, CoreError>;

    /// Looks up the unique user with this email (exact, case-sensitive match). A
    /// second match is a data-integrity error, not a "first wins".
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;

    /// Rehydrates an identity by id. Called on every protected request.
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, CoreError>;

    /// All users in insertion order. Administrative use only.
    async fn list_users(&self) -> Result<Vec<User>, CoreError>;

    /// Applies the allow-listed field updates to one user and re-stamps its
    /// `created_date`. Administrative use only; email writes still enforce uniqueness.
    async fn update_user_fields(&self, id: Uuid, update: &UserUpdate) -> Result<(), CoreError>;

    /// Deletes a user together with their news and sessions. Administrative use only;
    /// the normal flow never deletes users. Returns false if no such user existed.
    async fn delete_user(&self, id: Uuid) -> Result<bool, CoreError>;

    // --- News ---

    async fn create_news(&self, owner: Uuid, draft: NewsDraft) -> Result<News, CoreError>;

    /// Scoped lookup: `None` covers both "does not exist" and "belongs to someone
    /// else", indistinguishably, so callers cannot probe for other users' records.
    async fn find_news(&self, id: Uuid, owner: Uuid) -> Result<Option<News>, CoreError>;

    /// Owner-only update. `NotFound` covers nonexistent and cross-owner alike.
    async fn update_news(
        &self,
        id: Uuid,
        owner: Uuid,
        update: &NewsUpdate,
    ) -> Result<(), CoreError>;

    /// Owner-only delete. Same `NotFound` merging as `update_news`.
    async fn delete_news(&self, id: Uuid, owner: Uuid) -> Result<(), CoreError>;

    /// Every news record the viewer may read: public ones, plus the viewer's own when
    /// a viewer is present (`user_id = viewer OR is_private = false`). Insertion order
    /// of the underlying store; each call is a fresh consistent snapshot.
    async fn list_news_visible_to(&self, viewer: Option<Uuid>) -> Result<Vec<News>, CoreError>;

    // --- Sessions ---

    async fn create_session(&self, session: SessionRecord) -> Result<(), CoreError>;
    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, CoreError>;

    /// Idempotent: deleting an already-absent session is success.
    async fn delete_session(&self, id: Uuid) -> Result<(), CoreError>;
}

/// RepositoryState
///
/// The concrete type used to share storage access across services.
pub type RepositoryState = Arc<dyn Repository>;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

const USER_COLUMNS: &str = "id, name, about, email, hashed_password, created_date";
const NEWS_COLUMNS: &str = "id, title, content, is_private, user_id, created_date";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL. All
/// statements use explicit parameter binds; database errors are logged here with full
/// detail and surfaced to the caller only as `CoreError::Storage`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Relies on the unique index over `email` for atomic duplicate detection: a
    /// concurrent pre-check would race, the constraint cannot.
    async fn create_user(&self, new_user: NewUser) -> Result<User, CoreError> {
        let sql = format!(
            "INSERT INTO users (id, name, about, email, hashed_password, created_date) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {USER_COLUMNS}"
        );
        match sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.name)
            .bind(&new_user.about)
            .bind(&new_user.email)
            .bind(&new_user.credential)
            .fetch_one(&self.pool)
            .await
        {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(CoreError::DuplicateEmail),
            Err(e) => {
                tracing::error!("create_user error: {:?}", e);
                Err(CoreError::Storage)
            }
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("find_user_by_email error: {:?}", e);
                CoreError::Storage
            })
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, CoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("find_user_by_id error: {:?}", e);
                CoreError::Storage
            })
    }

    async fn list_users(&self) -> Result<Vec<User>, CoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_date ASC, id ASC");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("list_users error: {:?}", e);
                CoreError::Storage
            })
    }

    /// update_user_fields
    ///
    /// COALESCE handles the `Option<T>` fields, so only provided fields change.
    /// `created_date` is always re-stamped on an applied update.
    async fn update_user_fields(&self, id: Uuid, update: &UserUpdate) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE users \
             SET name = COALESCE($2, name), \
                 about = COALESCE($3, about), \
                 email = COALESCE($4, email), \
                 created_date = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.about)
        .bind(&update.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => Ok(()),
            Ok(_) => Err(CoreError::NotFound),
            Err(e) if is_unique_violation(&e) => Err(CoreError::DuplicateEmail),
            Err(e) => {
                tracing::error!("update_user_fields error: {:?}", e);
                Err(CoreError::Storage)
            }
        }
    }

    /// delete_user
    ///
    /// The schema cascades to the user's news and sessions, upholding the "no orphaned
    /// news, no sessions for deleted users" invariants in one statement.
    async fn delete_user(&self, id: Uuid) -> Result<bool, CoreError> {
        match sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => Ok(res.rows_affected() > 0),
            Err(e) => {
                tracing::error!("delete_user error: {:?}", e);
                Err(CoreError::Storage)
            }
        }
    }

    async fn create_news(&self, owner: Uuid, draft: NewsDraft) -> Result<News, CoreError> {
        let sql = format!(
            "INSERT INTO news (id, title, content, is_private, user_id, created_date) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {NEWS_COLUMNS}"
        );
        sqlx::query_as::<_, News>(&sql)
            .bind(Uuid::new_v4())
            .bind(&draft.title)
            .bind(&draft.content)
            .bind(draft.is_private)
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // A foreign-key violation here means the owner does not exist; news
                // records must never be created without one.
                tracing::error!("create_news error: {:?}", e);
                CoreError::Storage
            })
    }

    /// find_news
    ///
    /// The owner is part of the WHERE clause, so a record belonging to someone else
    /// yields the same empty result as one that never existed.
    async fn find_news(&self, id: Uuid, owner: Uuid) -> Result<Option<News>, CoreError> {
        let sql = format!("SELECT {NEWS_COLUMNS} FROM news WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, News>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("find_news error: {:?}", e);
                CoreError::Storage
            })
    }

    async fn update_news(
        &self,
        id: Uuid,
        owner: Uuid,
        update: &NewsUpdate,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE news \
             SET title = COALESCE($3, title), \
                 content = COALESCE($4, content), \
                 is_private = COALESCE($5, is_private) \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(owner)
        .bind(&update.title)
        .bind(&update.content)
        .bind(update.is_private)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => Ok(()),
            Ok(_) => Err(CoreError::NotFound),
            Err(e) => {
                tracing::error!("update_news error: {:?}", e);
                Err(CoreError::Storage)
            }
        }
    }

    async fn delete_news(&self, id: Uuid, owner: Uuid) -> Result<(), CoreError> {
        match sqlx::query("DELETE FROM news WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
        {
            Ok(res) if res.rows_affected() > 0 => Ok(()),
            Ok(_) => Err(CoreError::NotFound),
            Err(e) => {
                tracing::error!("delete_news error: {:?}", e);
                Err(CoreError::Storage)
            }
        }
    }

    /// list_news_visible_to
    ///
    /// Pushes the visibility filter into the store: public records, or the viewer's
    /// own. Ordered by insertion (creation time), never re-sorted.
    async fn list_news_visible_to(&self, viewer: Option<Uuid>) -> Result<Vec<News>, CoreError> {
        let result = match viewer {
            Some(user_id) => {
                let sql = format!(
                    "SELECT {NEWS_COLUMNS} FROM news \
                     WHERE is_private = false OR user_id = $1 \
                     ORDER BY created_date ASC, id ASC"
                );
                sqlx::query_as::<_, News>(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {NEWS_COLUMNS} FROM news \
                     WHERE is_private = false \
                     ORDER BY created_date ASC, id ASC"
                );
                sqlx::query_as::<_, News>(&sql).fetch_all(&self.pool).await
            }
        };

        result.map_err(|e| {
            tracing::error!("list_news_visible_to error: {:?}", e);
            CoreError::Storage
        })
    }

    async fn create_session(&self, session: SessionRecord) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, persistent, issued_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.persistent)
        .bind(session.issued_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|e| {
            tracing::error!("create_session error: {:?}", e);
            CoreError::Storage
        })
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, CoreError> {
        sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, persistent, issued_at, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("find_session error: {:?}", e);
            CoreError::Storage
        })
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::error!("delete_session error: {:?}", e);
                CoreError::Storage
            })
    }
}

// --- In-Memory Implementation (Tests and Embedded Use) ---

#[derive(Default)]
struct MemoryStore {
    // Vecs keep insertion order, which is the contractual listing order.
    users: Vec<User>,
    news: Vec<News>,
    sessions: HashMap<Uuid, SessionRecord>,
}

/// MemoryRepository
///
/// An in-process implementation of `Repository`, used by the test suites and usable as
/// a lightweight embedded store. A single `RwLock` serializes conflicting writes,
/// making each trait call atomic, which is the same discipline the Postgres
/// implementation gets from per-statement transactions.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // Lock poisoning only happens if a writer panicked mid-operation; the store data
    // itself is still coherent for these whole-value reads and writes.
    fn read(&self) -> RwLockReadGuard<'_, MemoryStore> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryStore> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User, CoreError> {
        let mut store = self.write();
        if store.users.iter().any(|u| u.email == new_user.email) {
            return Err(CoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            about: new_user.about,
            email: new_user.email,
            hashed_password: new_user.credential,
            created_date: Utc::now(),
        };
        store.users.push(user.clone());
        Ok(user)
    }

    /// find_user_by_email
    ///
    /// Emails are unique by contract; finding two matches means the store has been
    /// corrupted, and that is reported as a storage failure rather than by silently
    /// returning whichever record happens to come first.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        let store = self.read();
        let mut matches = store.users.iter().filter(|u| u.email == email);
        let first = matches.next().cloned();
        if matches.next().is_some() {
            tracing::error!("data integrity violation: multiple users share an email");
            return Err(CoreError::Storage);
        }
        Ok(first)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, CoreError> {
        Ok(self.read().users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, CoreError> {
        Ok(self.read().users.clone())
    }

    async fn update_user_fields(&self, id: Uuid, update: &UserUpdate) -> Result<(), CoreError> {
        let mut store = self.write();
        if !store.users.iter().any(|u| u.id == id) {
            return Err(CoreError::NotFound);
        }
        if let Some(email) = &update.email {
            if store.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(CoreError::DuplicateEmail);
            }
        }
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Err(CoreError::NotFound);
        };
        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(about) = &update.about {
            user.about = about.clone();
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        user.created_date = Utc::now();
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, CoreError> {
        let mut store = self.write();
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        let removed = store.users.len() < before;
        if removed {
            // Mirror the Postgres cascade: no orphaned news, no usable sessions.
            store.news.retain(|n| n.user_id != id);
            store.sessions.retain(|_, s| s.user_id != id);
        }
        Ok(removed)
    }

    async fn create_news(&self, owner: Uuid, draft: NewsDraft) -> Result<News, CoreError> {
        let mut store = self.write();
        if !store.users.iter().any(|u| u.id == owner) {
            tracing::error!("create_news rejected: owner does not exist");
            return Err(CoreError::Storage);
        }
        let news = News {
            id: Uuid::new_v4(),
            title: draft.title,
            content: draft.content,
            is_private: draft.is_private,
            user_id: owner,
            created_date: Utc::now(),
        };
        store.news.push(news.clone());
        Ok(news)
    }

    async fn find_news(&self, id: Uuid, owner: Uuid) -> Result<Option<News>, CoreError> {
        Ok(self
            .read()
            .news
            .iter()
            .find(|n| n.id == id && n.user_id == owner)
            .cloned())
    }

    async fn update_news(
        &self,
        id: Uuid,
        owner: Uuid,
        update: &NewsUpdate,
    ) -> Result<(), CoreError> {
        let mut store = self.write();
        let Some(news) = store
            .news
            .iter_mut()
            .find(|n| n.id == id && n.user_id == owner)
        else {
            return Err(CoreError::NotFound);
        };
        if let Some(title) = &update.title {
            news.title = title.clone();
        }
        if let Some(content) = &update.content {
            news.content = content.clone();
        }
        if let Some(is_private) = update.is_private {
            news.is_private = is_private;
        }
        Ok(())
    }

    async fn delete_news(&self, id: Uuid, owner: Uuid) -> Result<(), CoreError> {
        let mut store = self.write();
        let before = store.news.len();
        store.news.retain(|n| !(n.id == id && n.user_id == owner));
        if store.news.len() < before {
            Ok(())
        } else {
            Err(CoreError::NotFound)
        }
    }

    async fn list_news_visible_to(&self, viewer: Option<Uuid>) -> Result<Vec<News>, CoreError> {
        Ok(self
            .read()
            .news
            .iter()
            .filter(|n| !n.is_private || viewer.is_some_and(|v| n.user_id == v))
            .cloned()
            .collect())
    }

    async fn create_session(&self, session: SessionRecord) -> Result<(), CoreError> {
        self.write().sessions.insert(session.id, session);
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, CoreError> {
        Ok(self.read().sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), CoreError> {
        self.write().sessions.remove(&id);
        Ok(())
    }
}
