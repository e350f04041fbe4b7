use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{User, UserUpdate};
use crate::repository::RepositoryState;

/// Administrative record fix-up utility.
///
/// Selects user records by predicate and bulk-deletes them, or applies field updates
/// to the first match. The predicate language is closed: a fixed field enum, a fixed
/// comparator enum, and typed literals, composed with And/Or. There is no dynamic code
/// path, and the writable fields are exactly those representable in `UserUpdate`.
/// The utility is an operator capability: it is constructed explicitly from a
/// repository handle by the composition root and is never reachable from a
/// session-authenticated request path.

/// UserField
///
/// The user fields a predicate may inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    Name,
    Email,
    About,
    CreatedDate,
}

/// Comparator
///
/// The comparisons a predicate may apply. `Lt`/`Gt` are lexicographic on text fields
/// and chronological on `CreatedDate`; ids have no meaningful order and accept only
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Gt,
}

/// Literal
///
/// A typed comparison operand. The literal's type must match the field it is compared
/// against; mismatches are rejected up front as `CapabilityViolation`.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Uuid(Uuid),
    Str(String),
    Time(DateTime<Utc>),
}

impl From<Uuid> for Literal {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

/// Predicate
///
/// The closed selection language: `field comparator literal` triples joined by
/// And/Or. Nothing else is expressible.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Cmp {
        field: UserField,
        op: Comparator,
        value: Literal,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn cmp(field: UserField, op: Comparator, value: impl Into<Literal>) -> Self {
        Self::Cmp {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// validate
    ///
    /// Checks the whole tree against the allowed field/comparator/literal
    /// combinations before anything is evaluated, so an ill-typed predicate is
    /// rejected outright instead of matching some records and erroring on others.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::And(a, b) | Self::Or(a, b) => {
                a.validate()?;
                b.validate()
            }
            Self::Cmp { field, op, value } => match (field, value) {
                (UserField::Id, Literal::Uuid(_)) => match op {
                    Comparator::Eq | Comparator::Ne => Ok(()),
                    Comparator::Lt | Comparator::Gt => Err(CoreError::CapabilityViolation(
                        "ids are not ordered; only equality applies".to_string(),
                    )),
                },
                (UserField::Name | UserField::Email | UserField::About, Literal::Str(_)) => Ok(()),
                (UserField::CreatedDate, Literal::Time(_)) => Ok(()),
                (field, value) => Err(CoreError::CapabilityViolation(format!(
                    "literal {value:?} does not match field {field:?}"
                ))),
            },
        }
    }

    // Assumes `validate` passed; an unexpected combination matches nothing.
    fn matches(&self, user: &User) -> bool {
        match self {
            Self::And(a, b) => a.matches(user) && b.matches(user),
            Self::Or(a, b) => a.matches(user) || b.matches(user),
            Self::Cmp { field, op, value } => match (field, value) {
                (UserField::Id, Literal::Uuid(v)) => match op {
                    Comparator::Eq => user.id == *v,
                    Comparator::Ne => user.id != *v,
                    _ => false,
                },
                (UserField::Name, Literal::Str(v)) => compare_str(op, &user.name, v),
                (UserField::Email, Literal::Str(v)) => compare_str(op, &user.email, v),
                (UserField::About, Literal::Str(v)) => compare_str(op, &user.about, v),
                (UserField::CreatedDate, Literal::Time(v)) => match op {
                    Comparator::Eq => user.created_date == *v,
                    Comparator::Ne => user.created_date != *v,
                    Comparator::Lt => user.created_date < *v,
                    Comparator::Gt => user.created_date > *v,
                },
                _ => false,
            },
        }
    }
}

fn compare_str(op: &Comparator, lhs: &str, rhs: &str) -> bool {
    match op {
        Comparator::Eq => lhs == rhs,
        Comparator::Ne => lhs != rhs,
        Comparator::Lt => lhs < rhs,
        Comparator::Gt => lhs > rhs,
    }
}

/// MutationUtility
///
/// The out-of-band edit tool built over the predicate language. Selection happens
/// over a materialized snapshot of the user set in insertion order, so "first match"
/// is deterministic.
pub struct MutationUtility {
    repo: RepositoryState,
}

impl MutationUtility {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    async fn matching(&self, predicate: &Predicate) -> Result<Vec<User>, CoreError> {
        predicate.validate()?;
        let users = self.repo.list_users().await?;
        Ok(users.into_iter().filter(|u| predicate.matches(u)).collect())
    }

    /// delete_matching
    ///
    /// Bulk-deletes every user the predicate selects, with their news and sessions.
    /// Returns the number of users removed.
    pub async fn delete_matching(&self, predicate: &Predicate) -> Result<u64, CoreError> {
        let selected = self.matching(predicate).await?;
        let mut removed = 0u64;
        for user in selected {
            if self.repo.delete_user(user.id).await? {
                removed += 1;
            }
        }
        tracing::info!(removed, "administrative bulk delete applied");
        Ok(removed)
    }

    /// delete_first
    ///
    /// Deletes only the first match in insertion order. `NotFound` when the predicate
    /// selects nothing.
    pub async fn delete_first(&self, predicate: &Predicate) -> Result<(), CoreError> {
        let selected = self.matching(predicate).await?;
        let Some(user) = selected.into_iter().next() else {
            return Err(CoreError::NotFound);
        };
        self.repo.delete_user(user.id).await?;
        tracing::info!(user = %user.id, "administrative delete applied");
        Ok(())
    }

    /// update_first
    ///
    /// Applies the allow-listed updates to the first match in insertion order. The
    /// record's `created_date` is re-stamped to now whether or not any field is set;
    /// email writes still go through uniqueness enforcement.
    pub async fn update_first(
        &self,
        predicate: &Predicate,
        update: &UserUpdate,
    ) -> Result<(), CoreError> {
        let selected = self.matching(predicate).await?;
        let Some(user) = selected.into_iter().next() else {
            return Err(CoreError::NotFound);
        };
        self.repo.update_user_fields(user.id, update).await?;
        tracing::info!(user = %user.id, "administrative update applied");
        Ok(())
    }
}
