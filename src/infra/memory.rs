//! In-process repository implementations.
//!
//! Used when no database URL is configured and by the test suites. Every
//! collection is a [`DashMap`]; uniqueness constraints are enforced through
//! index maps updated with the entry API.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use time::OffsetDateTime;
use time::macros::date;
use uuid::Uuid;

use crate::application::filter::{PropertyQuery, SortOrder};
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{
    ApiTokensRepo, CreateApiTokenParams, CreatePropertyParams, CreateRecommendationParams,
    CreateUserParams, FavoritesRepo, PropertiesRepo, RecommendationsRepo, RepoError,
    UpdatePropertyParams, UsersRepo,
};
use crate::domain::entities::{
    ApiTokenRecord, FavoriteEntry, FavoriteRecord, PropertyRecord, RecommendationEntry,
    RecommendationRecord, UserRecord, UserSummary,
};
use crate::domain::types::{Furnished, ListedBy, ListingType, PropertyType};

#[derive(Default)]
pub struct MemoryRepositories {
    properties: DashMap<Uuid, PropertyRecord>,
    property_codes: DashMap<String, Uuid>,
    users: DashMap<Uuid, UserRecord>,
    user_emails: DashMap<String, Uuid>,
    favorites: DashMap<(Uuid, Uuid), FavoriteRecord>,
    recommendations: DashMap<Uuid, RecommendationRecord>,
    tokens: DashMap<String, ApiTokenRecord>,
    /// Number of catalog list queries served.
    pub property_queries: AtomicUsize,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Inserts a listing with fixed placeholder attributes, skipping
    /// validation. Meant for tests and local demos.
    pub fn seed_property(&self, code: &str, city: &str, owner: Uuid) -> PropertyRecord {
        let now = OffsetDateTime::now_utc();
        let record = PropertyRecord {
            id: Uuid::new_v4(),
            property_code: code.to_string(),
            title: format!("Listing {code}"),
            property_type: PropertyType::Apartment,
            price: 1_000_000.0,
            state: "Maharashtra".into(),
            city: city.to_string(),
            area_sq_ft: 1000.0,
            bedrooms: 2,
            bathrooms: 1,
            amenities: Vec::new(),
            furnished: Furnished::Unfurnished,
            available_from: date!(2025 - 01 - 01),
            listed_by: ListedBy::Owner,
            tags: Vec::new(),
            color_theme: None,
            rating: None,
            is_verified: false,
            listing_type: ListingType::Sale,
            created_by: owner,
            images: Vec::new(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        self.property_codes.insert(record.property_code.clone(), record.id);
        self.properties.insert(record.id, record.clone());
        record
    }

    fn property(&self, id: Uuid) -> Option<PropertyRecord> {
        self.properties.get(&id).map(|entry| entry.value().clone())
    }

    fn integrity(what: &str, id: Uuid) -> RepoError {
        RepoError::Integrity {
            message: format!("{what} `{id}` is referenced but missing"),
        }
    }
}

/// Occurrences of any query term in the text-indexed fields.
fn text_score(record: &PropertyRecord, terms: &[String]) -> usize {
    let words = [
        Some(record.title.as_str()),
        record.description.as_deref(),
        Some(record.city.as_str()),
        Some(record.state.as_str()),
    ];
    words
        .into_iter()
        .flatten()
        .flat_map(str::split_whitespace)
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| terms.contains(word))
        .count()
}

fn compare(sort: SortOrder, a: &(usize, PropertyRecord), b: &(usize, PropertyRecord)) -> CmpOrdering {
    let (score_a, a) = a;
    let (score_b, b) = b;
    let newest = || b.created_at.cmp(&a.created_at);
    let by_f64 = |x: f64, y: f64| x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal);
    match sort {
        SortOrder::PriceAsc => by_f64(a.price, b.price).then_with(newest),
        SortOrder::PriceDesc => by_f64(b.price, a.price).then_with(newest),
        SortOrder::AreaAsc => by_f64(a.area_sq_ft, b.area_sq_ft).then_with(newest),
        SortOrder::AreaDesc => by_f64(b.area_sq_ft, a.area_sq_ft).then_with(newest),
        SortOrder::RatingDesc => by_f64(b.rating.unwrap_or(-1.0), a.rating.unwrap_or(-1.0))
            .then_with(newest),
        SortOrder::DateAsc => a.created_at.cmp(&b.created_at),
        SortOrder::DateDesc => newest(),
        SortOrder::Relevance => score_b.cmp(score_a).then_with(newest),
    }
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Page::new(items, total)
}

#[async_trait]
impl PropertiesRepo for MemoryRepositories {
    async fn list_properties(
        &self,
        query: &PropertyQuery,
    ) -> Result<Page<PropertyRecord>, RepoError> {
        self.property_queries.fetch_add(1, Ordering::SeqCst);

        let terms = query.text_terms();
        let mut matched: Vec<(usize, PropertyRecord)> = self
            .properties
            .iter()
            .filter(|entry| query.filter.matches(entry.value()))
            .filter_map(|entry| {
                let score = text_score(entry.value(), &terms);
                (terms.is_empty() || score > 0).then(|| (score, entry.value().clone()))
            })
            .collect();
        matched.sort_by(|a, b| compare(query.sort, a, b));

        let records = matched.into_iter().map(|(_, record)| record).collect();
        Ok(paginate(records, query.page))
    }

    async fn find_property(&self, id: Uuid) -> Result<Option<PropertyRecord>, RepoError> {
        Ok(self.property(id))
    }

    async fn create_property(
        &self,
        params: CreatePropertyParams,
    ) -> Result<PropertyRecord, RepoError> {
        let id = Uuid::new_v4();
        match self.property_codes.entry(params.fields.property_code.clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::Duplicate {
                    constraint: "properties_property_code_key".into(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = OffsetDateTime::now_utc();
        let record = params.fields.into_record(id, params.created_by, now, now);
        self.properties.insert(id, record.clone());
        Ok(record)
    }

    async fn update_property(
        &self,
        params: UpdatePropertyParams,
    ) -> Result<PropertyRecord, RepoError> {
        let Some(mut entry) = self.properties.get_mut(&params.id) else {
            return Err(RepoError::NotFound);
        };
        let record = entry.value_mut();

        if record.property_code != params.fields.property_code {
            match self.property_codes.entry(params.fields.property_code.clone()) {
                Entry::Occupied(_) => {
                    return Err(RepoError::Duplicate {
                        constraint: "properties_property_code_key".into(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(record.id);
                }
            }
            self.property_codes.remove(&record.property_code);
        }

        *record = params.fields.into_record(
            record.id,
            record.created_by,
            record.created_at,
            OffsetDateTime::now_utc(),
        );
        Ok(record.clone())
    }

    async fn delete_property(&self, id: Uuid) -> Result<(), RepoError> {
        let Some((_, record)) = self.properties.remove(&id) else {
            return Err(RepoError::NotFound);
        };
        self.property_codes.remove(&record.property_code);
        self.favorites.retain(|(_, property_id), _| *property_id != id);
        self.recommendations
            .retain(|_, recommendation| recommendation.property_id != id);
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let Some(id) = self.user_emails.get(&email.to_lowercase()).map(|entry| *entry) else {
            return Ok(None);
        };
        self.find_user(id).await
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: params.email.to_lowercase(),
            name: params.name,
            created_at: OffsetDateTime::now_utc(),
        };
        match self.user_emails.entry(record.email.clone()) {
            Entry::Occupied(_) => Err(RepoError::Duplicate {
                constraint: "users_email_key".into(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.id);
                self.users.insert(record.id, record.clone());
                Ok(record)
            }
        }
    }
}

#[async_trait]
impl FavoritesRepo for MemoryRepositories {
    async fn add_favorite(&self, user_id: Uuid, property_id: Uuid) -> Result<bool, RepoError> {
        if !self.properties.contains_key(&property_id) {
            return Err(RepoError::NotFound);
        }
        match self.favorites.entry((user_id, property_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(FavoriteRecord {
                    id: Uuid::new_v4(),
                    user_id,
                    property_id,
                    created_at: OffsetDateTime::now_utc(),
                });
                Ok(true)
            }
        }
    }

    async fn remove_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<bool, RepoError> {
        Ok(self.favorites.remove(&(user_id, property_id)).is_some())
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<FavoriteEntry>, RepoError> {
        let mut owned: Vec<FavoriteRecord> = self
            .favorites
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let page = paginate(owned, page);
        let items = page
            .items
            .into_iter()
            .map(|favorite| {
                let property = self
                    .property(favorite.property_id)
                    .ok_or_else(|| Self::integrity("property", favorite.property_id))?;
                Ok(FavoriteEntry {
                    id: favorite.id,
                    property,
                    created_at: favorite.created_at,
                })
            })
            .collect::<Result<Vec<_>, RepoError>>()?;
        Ok(Page::new(items, page.total))
    }
}

#[async_trait]
impl RecommendationsRepo for MemoryRepositories {
    async fn create_recommendation(
        &self,
        params: CreateRecommendationParams,
    ) -> Result<RecommendationRecord, RepoError> {
        if !self.properties.contains_key(&params.property_id) {
            return Err(RepoError::NotFound);
        }
        let record = RecommendationRecord {
            id: Uuid::new_v4(),
            from_user_id: params.from_user_id,
            to_user_id: params.to_user_id,
            property_id: params.property_id,
            message: params.message,
            created_at: OffsetDateTime::now_utc(),
        };
        self.recommendations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_recommendation(
        &self,
        id: Uuid,
    ) -> Result<Option<RecommendationRecord>, RepoError> {
        Ok(self.recommendations.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_received(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RecommendationEntry>, RepoError> {
        let mut received: Vec<RecommendationRecord> = self
            .recommendations
            .iter()
            .filter(|entry| entry.value().to_user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        received.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let page = paginate(received, page);
        let mut items = Vec::with_capacity(page.items.len());
        for recommendation in page.items {
            let property = self
                .property(recommendation.property_id)
                .ok_or_else(|| Self::integrity("property", recommendation.property_id))?;
            let sender = self
                .find_user(recommendation.from_user_id)
                .await?
                .ok_or_else(|| Self::integrity("user", recommendation.from_user_id))?;
            items.push(RecommendationEntry {
                id: recommendation.id,
                property,
                from: UserSummary::from(&sender),
                message: recommendation.message,
                created_at: recommendation.created_at,
            });
        }
        Ok(Page::new(items, page.total))
    }

    async fn delete_recommendation(&self, id: Uuid) -> Result<(), RepoError> {
        self.recommendations
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl ApiTokensRepo for MemoryRepositories {
    async fn create_token(
        &self,
        params: CreateApiTokenParams,
    ) -> Result<ApiTokenRecord, RepoError> {
        let record = ApiTokenRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: OffsetDateTime::now_utc(),
            revoked_at: None,
        };
        match self.tokens.entry(record.prefix.clone()) {
            Entry::Occupied(_) => Err(RepoError::Duplicate {
                constraint: "api_tokens_prefix_key".into(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiTokenRecord>, RepoError> {
        Ok(self.tokens.get(prefix).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use crate::application::filter::PropertyQueryParams;
    use crate::application::repos::PropertyFields;

    use super::*;

    fn query(params: PropertyQueryParams) -> PropertyQuery {
        PropertyQuery::search(&params).expect("query")
    }

    #[tokio::test]
    async fn duplicate_property_code_is_rejected() {
        let repos = MemoryRepositories::new();
        let existing = repos.seed_property("PROP1", "Pune", Uuid::new_v4());

        let err = repos
            .create_property(CreatePropertyParams {
                fields: PropertyFields::from(&existing),
                created_by: Uuid::new_v4(),
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn text_search_orders_by_relevance() {
        let repos = MemoryRepositories::new();
        let owner = Uuid::new_v4();
        let plain = repos.seed_property("PROP1", "Pune", owner);
        let mut garden = repos.seed_property("PROP2", "Pune", owner);
        garden.title = "Garden villa with garden view".into();
        repos.properties.insert(garden.id, garden.clone());

        let page = repos
            .list_properties(&query(PropertyQueryParams {
                q: Some("garden pune".into()),
                ..Default::default()
            }))
            .await
            .expect("list");

        let ids: Vec<Uuid> = page.items.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![garden.id, plain.id]);
    }

    #[tokio::test]
    async fn delete_cascades_to_favorites() {
        let repos = MemoryRepositories::new();
        let user = Uuid::new_v4();
        let property = repos.seed_property("PROP1", "Pune", Uuid::new_v4());
        assert!(repos.add_favorite(user, property.id).await.expect("add"));

        repos.delete_property(property.id).await.expect("delete");

        let page = repos
            .list_favorites(user, PageRequest::default())
            .await
            .expect("list");
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn emails_are_unique_case_insensitively() {
        let repos = MemoryRepositories::new();
        repos
            .create_user(CreateUserParams {
                email: "a@example.com".into(),
                name: "A".into(),
            })
            .await
            .expect("first");
        let err = repos
            .create_user(CreateUserParams {
                email: "A@Example.com".into(),
                name: "A".into(),
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }
}
