use async_trait::async_trait;
use tunevault_auth::Permissions;

use super::{bounded, PostgresStorage};
use crate::{PermissionStorage, StorageError};

#[async_trait]
impl PermissionStorage for PostgresStorage {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, StorageError> {
        bounded(async {
            let codes: Vec<String> = sqlx::query_scalar(
                r#"
                SELECT permissions.code
                FROM permissions
                INNER JOIN users_permissions
                    ON users_permissions.permission_id = permissions.id
                WHERE users_permissions.user_id = $1
                ORDER BY permissions.code
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| StorageError::Database(error.to_string()))?;
            Ok(Permissions::new(codes))
        })
        .await
    }

    async fn grant_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StorageError> {
        let codes: Vec<String> = codes.iter().map(ToString::to_string).collect();
        bounded(async {
            sqlx::query(
                r#"
                INSERT INTO users_permissions (user_id, permission_id)
                SELECT $1, permissions.id
                FROM permissions
                WHERE permissions.code = ANY($2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(codes.as_slice())
            .execute(&self.pool)
            .await
            .map_err(|error| StorageError::Database(error.to_string()))?;
            Ok(())
        })
        .await
    }
}
