use thiserror::Error;

/// CoreError
///
/// The structured error taxonomy surfaced by every fallible operation in this crate.
///
/// Authorization failures are deliberately coarse: a cross-owner lookup and a genuinely
/// missing record both surface as `NotFound`, so callers cannot learn whether another
/// user's private record exists. Storage failures never carry query text or driver
/// detail outward; the detail is logged at the call site and the caller only sees the
/// opaque variant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Registration: another account already holds this exact email.
    #[error("an account with this email already exists")]
    DuplicateEmail,

    /// Login: merged case for wrong password and unknown email.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// News lookup/edit/delete outside ownership, or a nonexistent id.
    #[error("not found")]
    NotFound,

    /// Mutation attempted by a viewer who is not the owner.
    #[error("unauthorized")]
    Unauthorized,

    /// Administrative utility given a predicate or field combination outside its
    /// closed language.
    #[error("administrative request outside the allowed predicate language: {0}")]
    CapabilityViolation(String),

    /// Password hashing failed. Carries no detail; the credential material is never
    /// part of any error.
    #[error("credential processing failed")]
    Credential,

    /// The storage engine failed. Detail goes to the log, not the caller.
    #[error("storage failure")]
    Storage,
}
