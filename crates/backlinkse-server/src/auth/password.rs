use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Shortest password accepted at registration and on password change.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Argon2id with a fresh random salt. Returns a PHC string.
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow!("hash password: {e}"))
}

/// False on mismatch or on a stored hash that does not parse.
pub fn verify(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Burn one verification when the account does not exist, so an unknown
/// email costs about as long as a wrong password.
pub fn verify_dummy(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    if let Some(stored) = DUMMY.get_or_init(|| hash("not-a-real-password").ok()) {
        let _ = verify(password, stored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_matches_only_the_right_password() {
        let stored = hash("secret1").unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(verify("secret1", &stored));
        assert!(!verify("secret2", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash("same-pass").unwrap(), hash("same-pass").unwrap());
    }

    #[test]
    fn unparseable_hash_never_verifies() {
        assert!(!verify("anything", "plain-text"));
    }
}
