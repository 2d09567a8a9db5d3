use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{FavoritesRepo, RepoError};
use crate::domain::entities::FavoriteEntry;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct FavoriteRow {
    id: Uuid,
    property_id: Uuid,
    created_at: OffsetDateTime,
}

#[async_trait::async_trait]
impl FavoritesRepo for PostgresRepositories {
    async fn add_favorite(&self, user_id: Uuid, property_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO favorites (id, user_id, property_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, property_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(property_id)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND property_id = $2")
            .bind(user_id)
            .bind(property_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<FavoriteEntry>, RepoError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT id, property_id, created_at
            FROM favorites
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.property_id).collect();
        let mut properties = self.properties_by_ids(&ids).await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let property = properties
                    .remove(&row.property_id)
                    .ok_or_else(|| RepoError::Integrity {
                        message: format!("favorite `{}` points at a missing listing", row.id),
                    })?;
                Ok(FavoriteEntry {
                    id: row.id,
                    property,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, RepoError>>()?;

        Ok(Page::new(items, Self::convert_count(total)?))
    }
}
