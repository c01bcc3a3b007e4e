use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tunevault_core::Validator;

/// 16 random bytes, base64-url without padding.
pub const TOKEN_PLAINTEXT_LENGTH: usize = 22;

pub const ACTIVATION_TOKEN_TTL: Duration = Duration::days(3);
pub const AUTHENTICATION_TOKEN_TTL: Duration = Duration::days(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl TokenScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown token scope {0:?}")]
pub struct ParseScopeError(String);

impl FromStr for TokenScope {
    type Err = ParseScopeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "activation" => Ok(Self::Activation),
            "authentication" => Ok(Self::Authentication),
            _ => Err(ParseScopeError(value.to_owned())),
        }
    }
}

/// A freshly issued token. The plaintext exists only here, at generation
/// time; the store keeps the SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub plaintext: String,
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub expiry: OffsetDateTime,
    pub scope: TokenScope,
}

#[must_use]
pub fn generate_token(user_id: i64, ttl: Duration, scope: TokenScope) -> Token {
    let mut entropy = [0_u8; 16];
    OsRng.fill_bytes(&mut entropy);
    let plaintext = URL_SAFE_NO_PAD.encode(entropy);
    let hash = hash_token(&plaintext);
    Token {
        plaintext,
        hash,
        user_id,
        expiry: OffsetDateTime::now_utc() + ttl,
        scope,
    }
}

#[must_use]
pub fn hash_token(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LENGTH,
        "token",
        "must be 22 bytes long",
    );
}
