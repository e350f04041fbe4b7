//! Identity, session, and ownership-scoped access control for a small
//! content-publishing backend.
//!
//! Users register and authenticate; each news record belongs to exactly one user and
//! is either public or private to its owner. The presentation layer (routing,
//! templating) and the persistence engine are external collaborators: the former
//! calls into [`auth::SessionManager`] and [`access`], the latter sits behind the
//! [`repository::Repository`] trait.

// --- Module Structure ---

// Core application services and components.
pub mod access;
pub mod admin;
pub mod auth;
pub mod config;
pub mod credential;
pub mod error;
pub mod models;
pub mod repository;
pub mod telemetry;

// --- Public Re-exports ---

// Makes core state types easily accessible to the embedding application.
pub use auth::{Claims, SessionManager, SessionToken};
pub use config::{AppConfig, Env};
pub use error::CoreError;
pub use repository::{MemoryRepository, PostgresRepository, Repository, RepositoryState};
