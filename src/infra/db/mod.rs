//! Postgres-backed repository implementations.

mod api_tokens;
mod favorites;
mod properties;
mod recommendations;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::filter::{CountFilter, PropertyFilter, PropertyQuery, SortOrder};
use crate::application::repos::RepoError;

const PROPERTY_COLUMNS: &str = "p.id, p.property_code, p.title, p.property_type, p.price, \
    p.state, p.city, p.area_sq_ft, p.bedrooms, p.bathrooms, p.amenities, p.furnished, \
    p.available_from, p.listed_by, p.tags, p.color_theme, p.rating, p.is_verified, \
    p.listing_type, p.created_by, p.images, p.description, p.created_at, p.updated_at";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        u64::try_from(value).map_err(|_| RepoError::Integrity {
            message: format!("negative row count `{value}`"),
        })
    }

    /// Appends `AND ...` clauses for every populated filter field.
    fn apply_property_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PropertyFilter) {
        if let Some(min) = filter.min_price {
            qb.push(" AND p.price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND p.price <= ").push_bind(max);
        }
        if !filter.property_types.is_empty() {
            qb.push(" AND p.property_type = ANY(")
                .push_bind(labels(&filter.property_types))
                .push(")");
        }
        if let Some(state) = filter.state.as_deref() {
            qb.push(" AND p.state ILIKE ").push_bind(contains_pattern(state));
        }
        if let Some(city) = filter.city.as_deref() {
            qb.push(" AND p.city ILIKE ").push_bind(contains_pattern(city));
        }
        if let Some(min) = filter.min_area {
            qb.push(" AND p.area_sq_ft >= ").push_bind(min);
        }
        if let Some(max) = filter.max_area {
            qb.push(" AND p.area_sq_ft <= ").push_bind(max);
        }
        if let Some(count) = filter.bedrooms {
            push_count(qb, "p.bedrooms", count);
        }
        if let Some(count) = filter.bathrooms {
            push_count(qb, "p.bathrooms", count);
        }
        if !filter.amenities.is_empty() {
            qb.push(" AND p.amenities @> ").push_bind(&filter.amenities);
        }
        if !filter.furnished.is_empty() {
            qb.push(" AND p.furnished = ANY(")
                .push_bind(labels(&filter.furnished))
                .push(")");
        }
        if let Some(date) = filter.available_by {
            qb.push(" AND p.available_from <= ").push_bind(date);
        }
        if !filter.listed_by.is_empty() {
            qb.push(" AND p.listed_by = ANY(")
                .push_bind(labels(&filter.listed_by))
                .push(")");
        }
        if !filter.tags.is_empty() {
            qb.push(" AND p.tags && ").push_bind(&filter.tags);
        }
        if let Some(min) = filter.min_rating {
            qb.push(" AND p.rating >= ").push_bind(min);
        }
        if let Some(verified) = filter.is_verified {
            qb.push(" AND p.is_verified = ").push_bind(verified);
        }
        if let Some(listing_type) = filter.listing_type {
            qb.push(" AND p.listing_type = ")
                .push_bind(listing_type.as_str());
        }
        if let Some(owner) = filter.created_by {
            qb.push(" AND p.created_by = ").push_bind(owner);
        }
        if let Some(after) = filter.created_after {
            qb.push(" AND p.created_at >= ").push_bind(after);
        }
        if let Some(before) = filter.created_before {
            qb.push(" AND p.created_at <= ").push_bind(before);
        }
    }

    fn apply_text_match(qb: &mut QueryBuilder<'_, Postgres>, tsquery: Option<&str>) {
        if let Some(tsquery) = tsquery {
            qb.push(" AND p.search_vector @@ to_tsquery('simple', ")
                .push_bind(tsquery.to_string())
                .push(")");
        }
    }

    fn apply_order(qb: &mut QueryBuilder<'_, Postgres>, query: &PropertyQuery, tsquery: Option<&str>) {
        qb.push(" ORDER BY ");
        match (query.sort, tsquery) {
            (SortOrder::Relevance, Some(tsquery)) => {
                qb.push("ts_rank(p.search_vector, to_tsquery('simple', ")
                    .push_bind(tsquery.to_string())
                    .push(")) DESC, p.created_at DESC");
            }
            (SortOrder::PriceAsc, _) => {
                qb.push("p.price ASC, p.created_at DESC");
            }
            (SortOrder::PriceDesc, _) => {
                qb.push("p.price DESC, p.created_at DESC");
            }
            (SortOrder::AreaAsc, _) => {
                qb.push("p.area_sq_ft ASC, p.created_at DESC");
            }
            (SortOrder::AreaDesc, _) => {
                qb.push("p.area_sq_ft DESC, p.created_at DESC");
            }
            (SortOrder::RatingDesc, _) => {
                qb.push("p.rating DESC NULLS LAST, p.created_at DESC");
            }
            (SortOrder::DateAsc, _) => {
                qb.push("p.created_at ASC");
            }
            (SortOrder::DateDesc | SortOrder::Relevance, _) => {
                qb.push("p.created_at DESC");
            }
        }
        qb.push(", p.id DESC");
    }
}

/// OR-query over the alphanumeric query terms; `None` when nothing usable remains.
fn text_query(query: &PropertyQuery) -> Option<String> {
    let terms: Vec<String> = query
        .text_terms()
        .into_iter()
        .map(|term| term.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|term| !term.is_empty())
        .collect();
    (!terms.is_empty()).then(|| terms.join(" | "))
}

fn push_count(qb: &mut QueryBuilder<'_, Postgres>, column: &str, count: CountFilter) {
    qb.push(" AND ").push(column);
    match count {
        CountFilter::Exactly(expected) => qb.push(" = ").push_bind(expected),
        CountFilter::AtLeast(minimum) => qb.push(" >= ").push_bind(minimum),
    };
}

fn labels<T: ToString>(values: &[T]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
