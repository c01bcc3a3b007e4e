#![forbid(unsafe_code)]

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tunevault_auth::{Permissions, Token, TokenScope};
use tunevault_core::{Filters, Metadata, Song, SongDraft};

pub mod postgres;

pub use postgres::PostgresStorage;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("record not found")]
    RecordNotFound,
    /// A conditional write matched zero rows: another writer committed
    /// between the caller's read and this write. Re-read and retry.
    #[error("edit conflict")]
    EditConflict,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("unsafe sort parameter: {0}")]
    UnsafeSortParameter(String),
    /// The operation exceeded its time bound. The underlying write may
    /// still have committed; treat the outcome as unknown, not as failed.
    #[error("storage operation timed out")]
    Timeout,
    #[error("database error: {0}")]
    Database(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// A registered account. `version` is an optimistic-concurrency token with
/// the same CAS semantics as `Song::version`; neither it nor the password
/// hash is ever serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    #[serde(skip_serializing)]
    pub version: i32,
}

/// Registration input. Accounts start deactivated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Domain-specific storage traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SongStorage: Send + Sync {
    /// Inserts a draft; the store assigns `id`, `added_at`, and version 1.
    async fn insert(&self, draft: &SongDraft) -> Result<Song, StorageError>;
    async fn get(&self, id: i64) -> Result<Song, StorageError>;
    /// Compare-and-swap on `(id, expected_version)`. `EditConflict` means a
    /// concurrent writer won; the caller re-reads and reconciles.
    async fn update(
        &self,
        id: i64,
        expected_version: i32,
        draft: &SongDraft,
    ) -> Result<Song, StorageError>;
    async fn delete(&self, id: i64) -> Result<(), StorageError>;
    /// Filtered, sorted, paged listing. The window count rides the same
    /// query pass as the page rows.
    async fn list(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Song>, Metadata), StorageError>;
}

#[async_trait]
pub trait UserStorage: Send + Sync {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StorageError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, StorageError>;
    /// CAS on `(id, version)`, like `SongStorage::update`.
    async fn update_user(&self, user: &User) -> Result<User, StorageError>;
    /// Resolves a token digest to its user, honoring scope and expiry.
    async fn get_user_for_token(
        &self,
        scope: TokenScope,
        token_hash: &[u8],
    ) -> Result<User, StorageError>;
}

#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn insert_token(&self, token: &Token) -> Result<(), StorageError>;
    /// Idempotent; deleting for a user with no tokens is a no-op.
    async fn delete_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait PermissionStorage: Send + Sync {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, StorageError>;
    /// Granting an already-held code is a no-op.
    async fn grant_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StorageError>;
}

/// Unified supertrait for code that needs access to all storage domains.
pub trait Storage: SongStorage + UserStorage + TokenStorage + PermissionStorage {}

impl<T> Storage for T where T: SongStorage + UserStorage + TokenStorage + PermissionStorage {}

// ---------------------------------------------------------------------------
// Migration helpers
// ---------------------------------------------------------------------------

pub async fn migrate() -> Result<(), StorageError> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| StorageError::MissingDatabaseUrl)?;
    let pool = sqlx::PgPool::connect(&database_url)
        .await
        .map_err(|error| StorageError::Database(error.to_string()))?;
    migrate_with_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_with_pool(pool: &sqlx::PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|error| StorageError::Migration(error.to_string()))?;
    Ok(())
}
