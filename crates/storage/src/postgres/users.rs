use async_trait::async_trait;
use tunevault_auth::TokenScope;

use super::{bounded, is_unique_violation, PostgresStorage};
use crate::{NewUser, StorageError, User, UserStorage};

const USER_COLUMNS: &str = r#"
    id,
    (EXTRACT(EPOCH FROM created_at) * 1000000)::BIGINT AS created_at_us,
    name,
    email,
    password_hash,
    activated,
    version
"#;

#[async_trait]
impl UserStorage for PostgresStorage {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StorageError> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, activated)
            VALUES ($1, $2, $3, FALSE)
            RETURNING {USER_COLUMNS}
            "#
        );
        bounded(async {
            let row = sqlx::query_as::<_, UserRow>(&query)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| {
                    if is_unique_violation(&error) {
                        StorageError::DuplicateEmail
                    } else {
                        StorageError::Database(error.to_string())
                    }
                })?;
            User::try_from(row)
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StorageError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        bounded(async {
            let row = sqlx::query_as::<_, UserRow>(&query)
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| match error {
                    sqlx::Error::RowNotFound => StorageError::RecordNotFound,
                    _ => StorageError::Database(error.to_string()),
                })?;
            User::try_from(row)
        })
        .await
    }

    async fn update_user(&self, user: &User) -> Result<User, StorageError> {
        let query = format!(
            r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING {USER_COLUMNS}
            "#
        );
        bounded(async {
            let row = sqlx::query_as::<_, UserRow>(&query)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.activated)
                .bind(user.id)
                .bind(user.version)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| {
                    if is_unique_violation(&error) {
                        StorageError::DuplicateEmail
                    } else {
                        match error {
                            sqlx::Error::RowNotFound => StorageError::EditConflict,
                            _ => StorageError::Database(error.to_string()),
                        }
                    }
                })?;
            User::try_from(row)
        })
        .await
    }

    async fn get_user_for_token(
        &self,
        scope: TokenScope,
        token_hash: &[u8],
    ) -> Result<User, StorageError> {
        const QUERY: &str = r#"
            SELECT
                users.id,
                (EXTRACT(EPOCH FROM users.created_at) * 1000000)::BIGINT AS created_at_us,
                users.name,
                users.email,
                users.password_hash,
                users.activated,
                users.version
            FROM users
            INNER JOIN tokens ON tokens.user_id = users.id
            WHERE tokens.hash = $1
              AND tokens.scope = $2
              AND tokens.expiry > NOW()
        "#;
        bounded(async {
            let row = sqlx::query_as::<_, UserRow>(QUERY)
                .bind(token_hash)
                .bind(scope.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|error| match error {
                    sqlx::Error::RowNotFound => StorageError::RecordNotFound,
                    _ => StorageError::Database(error.to_string()),
                })?;
            User::try_from(row)
        })
        .await
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    created_at_us: i64,
    name: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl TryFrom<UserRow> for User {
    type Error = StorageError;

    fn try_from(value: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            created_at: super::unix_micros_to_offset_datetime(value.created_at_us)?,
            name: value.name,
            email: value.email,
            password_hash: value.password_hash,
            activated: value.activated,
            version: value.version,
        })
    }
}
