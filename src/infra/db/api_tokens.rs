use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ApiTokensRepo, CreateApiTokenParams, RepoError};
use crate::domain::entities::ApiTokenRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct ApiTokenRow {
    id: Uuid,
    user_id: Uuid,
    prefix: String,
    hashed_secret: Vec<u8>,
    created_at: OffsetDateTime,
    revoked_at: Option<OffsetDateTime>,
}

impl From<ApiTokenRow> for ApiTokenRecord {
    fn from(row: ApiTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        }
    }
}

#[async_trait::async_trait]
impl ApiTokensRepo for PostgresRepositories {
    async fn create_token(
        &self,
        params: CreateApiTokenParams,
    ) -> Result<ApiTokenRecord, RepoError> {
        let row = sqlx::query_as::<_, ApiTokenRow>(
            r#"
            INSERT INTO api_tokens (id, user_id, prefix, hashed_secret, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, prefix, hashed_secret, created_at, revoked_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.prefix)
        .bind(params.hashed_secret)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiTokenRecord>, RepoError> {
        let row = sqlx::query_as::<_, ApiTokenRow>(
            r#"
            SELECT id, user_id, prefix, hashed_secret, created_at, revoked_at
            FROM api_tokens
            WHERE prefix = $1
            "#,
        )
        .bind(prefix)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(ApiTokenRecord::from))
    }
}
