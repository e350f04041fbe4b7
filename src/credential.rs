use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use std::sync::LazyLock;

use crate::error::CoreError;
use crate::models::StoredCredential;

/// set_credential
///
/// Derives the stored form of a plaintext password: a fresh random 16-byte salt and an
/// Argon2id hash, PHC-encoded so the salt and parameters travel with the hash. Argon2id
/// is deliberately slow and memory-hard; this is the one intentionally CPU-expensive
/// operation in the crate.
pub fn set_credential(plaintext: &str) -> Result<StoredCredential, CoreError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| {
        tracing::error!("salt generation failed: {:?}", e);
        CoreError::Credential
    })?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| {
        tracing::error!("salt encoding failed: {:?}", e);
        CoreError::Credential
    })?;

    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("password hashing failed: {:?}", e);
            CoreError::Credential
        })?
        .to_string();

    Ok(StoredCredential::from_phc(phc))
}

/// verify
///
/// Recomputes the hash with the salt embedded in the stored form and compares in
/// constant time (the argon2 crate performs the comparison). A malformed stored hash
/// verifies as false rather than erroring; the caller never learns why a credential
/// failed.
pub fn verify(stored: &StoredCredential, candidate: &str) -> bool {
    match PasswordHash::new(stored.as_str()) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// A fixed credential hashed once at first use. Verifying candidates against it keeps
// the unknown-account path doing the same hash work as the wrong-password path.
static DUMMY_CREDENTIAL: LazyLock<StoredCredential> = LazyLock::new(|| {
    set_credential("dummy-credential-for-timing-parity")
        .unwrap_or_else(|_| StoredCredential::from_phc(String::new()))
});

/// verify_dummy
///
/// Burns one credential verification against a fixed hash and always reports failure.
/// Called on the unknown-email login path so its cost matches a real verification.
pub fn verify_dummy(candidate: &str) -> bool {
    verify(&DUMMY_CREDENTIAL, candidate);
    false
}
