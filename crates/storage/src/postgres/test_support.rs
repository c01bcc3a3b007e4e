use sqlx::postgres::PgPoolOptions;
use tunevault_core::{Duration, Filters, SongDraft};

use super::PostgresStorage;
use crate::NewUser;

// Re-export the domain traits so test modules can `use super::super::
// test_support::*` and have every trait method available on PostgresStorage.
#[allow(unused_imports)]
pub(super) use crate::{
    PermissionStorage, SongStorage, Storage, StorageError, TokenStorage, UserStorage,
};

pub(super) const SONG_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "duration", "-id", "-title", "-year", "-duration",
];

/// Connects to `DATABASE_URL` or skips the test when it is unset. Each test
/// gets its own schema for full isolation when running in parallel; `public`
/// stays on the search path so extension types (citext) resolve.
pub(super) async fn test_storage() -> Option<PostgresStorage> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(value) => value,
        Err(_) => return None,
    };

    let schema = format!("test_{}", uuid::Uuid::new_v4().simple());
    let search_path = format!("{schema},public");
    let mut opts: sqlx::postgres::PgConnectOptions =
        database_url.parse().expect("parse DATABASE_URL");
    opts = opts.options([("search_path", search_path.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(opts)
        .await
        .expect("connect test database");
    sqlx::query(&format!("CREATE SCHEMA \"{schema}\""))
        .execute(&pool)
        .await
        .expect("create test schema");

    crate::migrate_with_pool(&pool)
        .await
        .expect("apply migrations");
    Some(PostgresStorage::from_pool(pool))
}

pub(super) fn song_draft(title: &str, year: i32, seconds: i32, genres: &[&str]) -> SongDraft {
    SongDraft {
        title: title.to_owned(),
        year,
        duration: Duration::from_seconds(seconds),
        genres: genres.iter().map(ToString::to_string).collect(),
    }
}

pub(super) fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
    Filters {
        page,
        page_size,
        sort: sort.to_owned(),
        sort_safelist: SONG_SORT_SAFELIST,
    }
}

pub(super) fn new_user(name: &str, email: &str) -> NewUser {
    NewUser {
        name: name.to_owned(),
        email: email.to_owned(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$placeholder".to_owned(),
    }
}
