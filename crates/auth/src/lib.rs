#![forbid(unsafe_code)]

pub mod password;
pub mod permission;
pub mod token;

pub use password::{hash_password, validate_password_plaintext, verify_password, PasswordError};
pub use permission::{Permissions, SONGS_READ, SONGS_WRITE};
pub use token::{
    generate_token, hash_token, validate_token_plaintext, ParseScopeError, Token, TokenScope,
    TOKEN_PLAINTEXT_LENGTH,
};
