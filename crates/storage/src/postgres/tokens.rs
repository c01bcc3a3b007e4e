use async_trait::async_trait;
use tunevault_auth::{Token, TokenScope};

use super::{bounded, offset_datetime_to_unix_micros, PostgresStorage};
use crate::{StorageError, TokenStorage};

#[async_trait]
impl TokenStorage for PostgresStorage {
    async fn insert_token(&self, token: &Token) -> Result<(), StorageError> {
        let expiry_micros = offset_datetime_to_unix_micros(token.expiry)?;
        bounded(async {
            sqlx::query(
                r#"
                INSERT INTO tokens (hash, user_id, expiry, scope)
                VALUES ($1, $2, to_timestamp(($3::double precision) / 1000000.0), $4)
                "#,
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(expiry_micros)
            .bind(token.scope.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| StorageError::Database(error.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn delete_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<(), StorageError> {
        bounded(async {
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|error| StorageError::Database(error.to_string()))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use tunevault_auth::{generate_token, TokenScope};

    use super::super::test_support::*;
    use crate::{StorageError, TokenStorage, UserStorage};

    #[tokio::test]
    async fn delete_tokens_is_scoped_and_idempotent() {
        let Some(storage) = test_storage().await else {
            return;
        };

        let user = storage
            .insert_user(&new_user("Ada", "ada@example.com"))
            .await
            .expect("insert user");

        let auth = generate_token(
            user.id,
            time::Duration::days(1),
            TokenScope::Authentication,
        );
        let activation =
            generate_token(user.id, time::Duration::days(3), TokenScope::Activation);
        storage.insert_token(&auth).await.expect("insert auth");
        storage
            .insert_token(&activation)
            .await
            .expect("insert activation");

        storage
            .delete_tokens_for_user(TokenScope::Activation, user.id)
            .await
            .expect("delete activation tokens");

        // The authentication token survives the scoped delete.
        let resolved = storage
            .get_user_for_token(TokenScope::Authentication, &auth.hash)
            .await
            .expect("auth token still resolves");
        assert_eq!(resolved.id, user.id);

        let gone = storage
            .get_user_for_token(TokenScope::Activation, &activation.hash)
            .await
            .expect_err("activation token should be gone");
        assert_eq!(gone, StorageError::RecordNotFound);

        // Deleting again is a no-op.
        storage
            .delete_tokens_for_user(TokenScope::Activation, user.id)
            .await
            .expect("second delete");
    }
}
