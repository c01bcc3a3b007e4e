use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use rand_core::{OsRng, RngCore};
use tunevault_core::Validator;

pub const MIN_PASSWORD_BYTES: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Hashes a plaintext password into an Argon2id PHC string. The salt is
/// fresh per call, so equal passwords never share a hash.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0_u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::from_b64(&STANDARD_NO_PAD.encode(salt_bytes)).map_err(PasswordError::Hash)?;

    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(PasswordError::Hash)?;
    Ok(hash.to_string())
}

/// Constant-time verification against a stored PHC string. An unparsable
/// stored hash verifies as false rather than erroring; the caller cannot
/// do anything useful with the distinction.
#[must_use]
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

pub fn validate_password_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "password", "must be provided");
    v.check(
        plaintext.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        plaintext.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use tunevault_core::Validator;

    use super::{hash_password, validate_password_plaintext, verify_password};

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("pa55word1234").expect("hash password");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("pa55word1234", &hash));
        assert!(!verify_password("pa55word1235", &hash));
    }

    #[test]
    fn equal_passwords_get_distinct_hashes() {
        let first = hash_password("pa55word1234").expect("hash");
        let second = hash_password("pa55word1234").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn unparsable_stored_hash_never_verifies() {
        assert!(!verify_password("pa55word1234", "not-a-phc-string"));
        assert!(!verify_password("pa55word1234", ""));
    }

    #[test]
    fn plaintext_validation_bounds() {
        let mut v = Validator::new();
        validate_password_plaintext(&mut v, "");
        assert_eq!(
            v.errors().get("password").map(String::as_str),
            Some("must be provided")
        );

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, "short");
        assert_eq!(
            v.errors().get("password").map(String::as_str),
            Some("must be at least 8 bytes long")
        );

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, &"x".repeat(73));
        assert_eq!(
            v.errors().get("password").map(String::as_str),
            Some("must not be more than 72 bytes long")
        );

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, "pa55word1234");
        assert!(v.valid());
    }
}
