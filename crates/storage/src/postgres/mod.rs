#![forbid(unsafe_code)]

mod permissions;
mod songs;
mod tokens;
mod users;

#[cfg(test)]
mod test_support;

use sqlx::PgPool;

use crate::StorageError;

#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|error| StorageError::Database(error.to_string()))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

// ---------------------------------------------------------------------------
// Shared helpers used across the domain modules
// ---------------------------------------------------------------------------

use std::future::Future;
use std::time::Duration;

use time::OffsetDateTime;

/// Every storage operation races this bound. Expiry surfaces as
/// `StorageError::Timeout`, never as not-found.
pub(crate) const OPERATION_TIMEOUT: Duration = Duration::from_secs(3);

pub(crate) async fn bounded<T, F>(operation: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(OPERATION_TIMEOUT, operation).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout),
    }
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_error) if db_error.code().as_deref() == Some("23505")
    )
}

pub(crate) fn unix_micros_to_offset_datetime(value: i64) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(value) * 1_000)
        .map_err(|_| StorageError::Database("timestamp out of range".to_owned()))
}

pub(crate) fn offset_datetime_to_unix_micros(value: OffsetDateTime) -> Result<i64, StorageError> {
    i64::try_from(value.unix_timestamp_nanos() / 1_000)
        .map_err(|_| StorageError::Database("timestamp out of range".to_owned()))
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::{offset_datetime_to_unix_micros, unix_micros_to_offset_datetime};

    #[test]
    fn micros_round_trip() {
        let now = OffsetDateTime::now_utc();
        let micros = offset_datetime_to_unix_micros(now).expect("to micros");
        let back = unix_micros_to_offset_datetime(micros).expect("from micros");
        assert_eq!(micros, offset_datetime_to_unix_micros(back).expect("again"));
    }

    #[test]
    fn negative_micros_map_before_epoch() {
        let before = unix_micros_to_offset_datetime(-1_000_000).expect("from micros");
        assert_eq!(before.unix_timestamp(), -1);
    }
}
