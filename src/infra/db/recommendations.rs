use std::collections::HashMap;

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{CreateRecommendationParams, RecommendationsRepo, RepoError};
use crate::domain::entities::{RecommendationEntry, RecommendationRecord, UserRecord, UserSummary};

use super::users::UserRow;
use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct RecommendationRow {
    id: Uuid,
    from_user_id: Uuid,
    to_user_id: Uuid,
    property_id: Uuid,
    message: Option<String>,
    created_at: OffsetDateTime,
}

impl From<RecommendationRow> for RecommendationRecord {
    fn from(row: RecommendationRow) -> Self {
        Self {
            id: row.id,
            from_user_id: row.from_user_id,
            to_user_id: row.to_user_id,
            property_id: row.property_id,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

const RECOMMENDATION_COLUMNS: &str =
    "id, from_user_id, to_user_id, property_id, message, created_at";

#[async_trait::async_trait]
impl RecommendationsRepo for PostgresRepositories {
    async fn create_recommendation(
        &self,
        params: CreateRecommendationParams,
    ) -> Result<RecommendationRecord, RepoError> {
        let sql = format!(
            "INSERT INTO recommendations ({RECOMMENDATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RECOMMENDATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RecommendationRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.from_user_id)
            .bind(params.to_user_id)
            .bind(params.property_id)
            .bind(params.message)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_recommendation(
        &self,
        id: Uuid,
    ) -> Result<Option<RecommendationRecord>, RepoError> {
        let sql = format!("SELECT {RECOMMENDATION_COLUMNS} FROM recommendations WHERE id = $1");
        let row = sqlx::query_as::<_, RecommendationRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(RecommendationRecord::from))
    }

    async fn list_received(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RecommendationEntry>, RepoError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM recommendations WHERE to_user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        let sql = format!(
            "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations WHERE to_user_id = $1 \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, RecommendationRow>(&sql)
            .bind(user_id)
            .bind(i64::from(page.limit))
            .bind(page.offset() as i64)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let property_ids: Vec<Uuid> = rows.iter().map(|row| row.property_id).collect();
        let properties = self.properties_by_ids(&property_ids).await?;

        let sender_ids: Vec<Uuid> = rows.iter().map(|row| row.from_user_id).collect();
        let senders: HashMap<Uuid, UserRecord> = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, created_at FROM users WHERE id = ANY($1)",
        )
        .bind(&sender_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|row| {
            let user = UserRecord::from(row);
            (user.id, user)
        })
        .collect();

        let items = rows
            .into_iter()
            .map(|row| {
                let missing = |what: &str| RepoError::Integrity {
                    message: format!("recommendation `{}` points at a missing {what}", row.id),
                };
                let property = properties
                    .get(&row.property_id)
                    .cloned()
                    .ok_or_else(|| missing("listing"))?;
                let sender = senders
                    .get(&row.from_user_id)
                    .ok_or_else(|| missing("sender"))?;
                Ok(RecommendationEntry {
                    id: row.id,
                    property,
                    from: UserSummary::from(sender),
                    message: row.message,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, RepoError>>()?;

        Ok(Page::new(items, Self::convert_count(total)?))
    }

    async fn delete_recommendation(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM recommendations WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
