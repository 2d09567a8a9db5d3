use std::collections::HashMap;

use sqlx::{FromRow, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::filter::PropertyQuery;
use crate::application::pagination::Page;
use crate::application::repos::{
    CreatePropertyParams, PropertiesRepo, PropertyFields, RepoError, UpdatePropertyParams,
};
use crate::domain::entities::PropertyRecord;

use super::{PROPERTY_COLUMNS, PostgresRepositories, map_sqlx_error, text_query};

#[derive(Debug, FromRow)]
struct PropertyRow {
    id: Uuid,
    property_code: String,
    title: String,
    property_type: String,
    price: f64,
    state: String,
    city: String,
    area_sq_ft: f64,
    bedrooms: i32,
    bathrooms: i32,
    amenities: Vec<String>,
    furnished: String,
    available_from: Date,
    listed_by: String,
    tags: Vec<String>,
    color_theme: Option<String>,
    rating: Option<f64>,
    is_verified: bool,
    listing_type: String,
    created_by: Uuid,
    images: Vec<String>,
    description: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<PropertyRow> for PropertyRecord {
    type Error = RepoError;

    fn try_from(row: PropertyRow) -> Result<Self, Self::Error> {
        let integrity = |err: listings_api_types::UnknownVariant| RepoError::Integrity {
            message: err.to_string(),
        };
        Ok(PropertyRecord {
            id: row.id,
            property_code: row.property_code,
            title: row.title,
            property_type: row.property_type.parse().map_err(integrity)?,
            price: row.price,
            state: row.state,
            city: row.city,
            area_sq_ft: row.area_sq_ft,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            amenities: row.amenities,
            furnished: row.furnished.parse().map_err(integrity)?,
            available_from: row.available_from,
            listed_by: row.listed_by.parse().map_err(integrity)?,
            tags: row.tags,
            color_theme: row.color_theme,
            rating: row.rating,
            is_verified: row.is_verified,
            listing_type: row.listing_type.parse().map_err(integrity)?,
            created_by: row.created_by,
            images: row.images,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CountRow {
    total: i64,
}

fn push_field_values<'q>(qb: &mut QueryBuilder<'q, Postgres>, fields: &'q PropertyFields) {
    let mut values = qb.separated(", ");
    values
        .push_bind(&fields.property_code)
        .push_bind(&fields.title)
        .push_bind(fields.property_type.as_str())
        .push_bind(fields.price)
        .push_bind(&fields.state)
        .push_bind(&fields.city)
        .push_bind(fields.area_sq_ft)
        .push_bind(fields.bedrooms)
        .push_bind(fields.bathrooms)
        .push_bind(&fields.amenities)
        .push_bind(fields.furnished.as_str())
        .push_bind(fields.available_from)
        .push_bind(fields.listed_by.as_str())
        .push_bind(&fields.tags)
        .push_bind(&fields.color_theme)
        .push_bind(fields.rating)
        .push_bind(fields.is_verified)
        .push_bind(fields.listing_type.as_str())
        .push_bind(&fields.images)
        .push_bind(&fields.description);
}

const FIELD_COLUMNS: &str = "property_code, title, property_type, price, state, city, \
    area_sq_ft, bedrooms, bathrooms, amenities, furnished, available_from, listed_by, tags, \
    color_theme, rating, is_verified, listing_type, images, description";

fn returning_columns() -> String {
    PROPERTY_COLUMNS.replace("p.", "")
}

impl PostgresRepositories {
    /// Loads listings by id for joining onto favorites and recommendations.
    pub(super) async fn properties_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, PropertyRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties p WHERE p.id = ANY($1)");
        let rows = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter()
            .map(|row| PropertyRecord::try_from(row).map(|record| (record.id, record)))
            .collect()
    }
}

#[async_trait::async_trait]
impl PropertiesRepo for PostgresRepositories {
    async fn list_properties(
        &self,
        query: &PropertyQuery,
    ) -> Result<Page<PropertyRecord>, RepoError> {
        let tsquery = text_query(query);

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) AS total FROM properties p WHERE TRUE");
        Self::apply_property_filter(&mut count_qb, &query.filter);
        Self::apply_text_match(&mut count_qb, tsquery.as_deref());
        let count = count_qb
            .build_query_as::<CountRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(PROPERTY_COLUMNS)
            .push(" FROM properties p WHERE TRUE");
        Self::apply_property_filter(&mut qb, &query.filter);
        Self::apply_text_match(&mut qb, tsquery.as_deref());
        Self::apply_order(&mut qb, query, tsquery.as_deref());
        qb.push(" LIMIT ")
            .push_bind(i64::from(query.page.limit))
            .push(" OFFSET ")
            .push_bind(query.page.offset() as i64);

        let rows = qb
            .build_query_as::<PropertyRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let items = rows
            .into_iter()
            .map(PropertyRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, Self::convert_count(count.total)?))
    }

    async fn find_property(&self, id: Uuid) -> Result<Option<PropertyRecord>, RepoError> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties p WHERE p.id = $1");
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(PropertyRecord::try_from)
            .transpose()
    }

    async fn create_property(
        &self,
        params: CreatePropertyParams,
    ) -> Result<PropertyRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut qb = QueryBuilder::new("INSERT INTO properties (id, created_by, created_at, updated_at, ");
        qb.push(FIELD_COLUMNS).push(") VALUES (");
        qb.separated(", ")
            .push_bind(Uuid::new_v4())
            .push_bind(params.created_by)
            .push_bind(now)
            .push_bind(now);
        qb.push(", ");
        push_field_values(&mut qb, &params.fields);
        qb.push(") RETURNING ").push(returning_columns());

        let row = qb
            .build_query_as::<PropertyRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        PropertyRecord::try_from(row)
    }

    async fn update_property(
        &self,
        params: UpdatePropertyParams,
    ) -> Result<PropertyRecord, RepoError> {
        let mut qb = QueryBuilder::new("UPDATE properties SET (");
        qb.push(FIELD_COLUMNS).push(", updated_at) = (");
        push_field_values(&mut qb, &params.fields);
        qb.push(", ")
            .push_bind(OffsetDateTime::now_utc())
            .push(") WHERE id = ")
            .push_bind(params.id)
            .push(" RETURNING ")
            .push(returning_columns());

        let row = qb
            .build_query_as::<PropertyRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;
        PropertyRecord::try_from(row)
    }

    async fn delete_property(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
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
