//! Property catalog service.
//!
//! Reads go through the cache with keys from [`crate::cache::keys`]; writes
//! commit to the repository, then invalidate synchronously before returning.

use std::sync::Arc;

use listings_api_types::{
    AppliedFilters, PropertyCreateRequest, PropertyList, PropertySearchResults,
    PropertyUpdateRequest, SearchPagination,
};
use thiserror::Error;
use uuid::Uuid;

use crate::application::filter::{FilterError, PropertyQuery, PropertyQueryParams};
use crate::application::repos::{
    CreatePropertyParams, PropertiesRepo, PropertyFields, RepoError, UpdatePropertyParams,
};
use crate::cache::keys::{PROPERTIES, PROPERTY, collection_key, entity_key};
use crate::cache::{CacheService, Invalidator, Mutation};
use crate::domain::entities::PropertyRecord;
use crate::domain::error::DomainError;
use crate::domain::listing::{ListingFields, validate_listing};

#[derive(Debug, Error)]
pub enum PropertyServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[derive(Clone)]
pub struct PropertyService {
    repo: Arc<dyn PropertiesRepo>,
    cache: CacheService,
    invalidator: Invalidator,
}

impl PropertyService {
    pub fn new(repo: Arc<dyn PropertiesRepo>, cache: CacheService) -> Self {
        Self {
            repo,
            invalidator: Invalidator::new(cache.clone()),
            cache,
        }
    }

    /// Filtered, paged listing, newest first.
    pub async fn list(
        &self,
        params: &PropertyQueryParams,
    ) -> Result<PropertyList<PropertyRecord>, PropertyServiceError> {
        let query = PropertyQuery::listing(params)?;
        let key = collection_key(
            PROPERTIES,
            &query.filter_value(),
            query.page.page,
            query.page.limit,
            None,
        );

        self.cache
            .read_through(&key, None, || async {
                let page = self.repo.list_properties(&query).await?;
                Ok::<_, PropertyServiceError>(PropertyList {
                    properties: page.items,
                    pagination: query.page.summarize(page.total),
                })
            })
            .await
    }

    /// Listing with free text and a caller-chosen order.
    pub async fn search(
        &self,
        params: &PropertyQueryParams,
    ) -> Result<PropertySearchResults<PropertyRecord>, PropertyServiceError> {
        let query = PropertyQuery::search(params)?;
        let key = collection_key(
            PROPERTIES,
            &query.filter_value(),
            query.page.page,
            query.page.limit,
            Some(query.sort.as_str()),
        );

        self.cache
            .read_through(&key, None, || async {
                let page = self.repo.list_properties(&query).await?;
                Ok::<_, PropertyServiceError>(PropertySearchResults {
                    properties: page.items,
                    pagination: SearchPagination::from(query.page.summarize(page.total)),
                    filters: AppliedFilters {
                        applied: (!query.filter.is_empty()).then(|| query.filter.to_value()),
                        text_search: query.text.clone(),
                        sort_by: query.sort.as_str().to_string(),
                    },
                })
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<PropertyRecord, PropertyServiceError> {
        self.cache
            .read_through(&entity_key(PROPERTY, id), None, || self.load(id))
            .await
    }

    pub async fn create(
        &self,
        owner: Uuid,
        request: PropertyCreateRequest,
    ) -> Result<PropertyRecord, PropertyServiceError> {
        let fields = PropertyFields {
            property_code: request.property_id.trim().to_string(),
            title: request.title.trim().to_string(),
            property_type: request.property_type,
            price: request.price,
            state: request.state.trim().to_string(),
            city: request.city.trim().to_string(),
            area_sq_ft: request.area_sq_ft,
            bedrooms: request.bedrooms,
            bathrooms: request.bathrooms,
            amenities: request.amenities,
            furnished: request.furnished,
            available_from: request.available_from,
            listed_by: request.listed_by,
            tags: request.tags,
            color_theme: request.color_theme,
            rating: request.rating,
            is_verified: request.is_verified,
            listing_type: request.listing_type,
            images: request.images,
            description: request.description,
        };
        validate_listing(listing_fields(&fields))?;

        let record = self
            .repo
            .create_property(CreatePropertyParams {
                fields,
                created_by: owner,
            })
            .await?;

        self.invalidator.apply(Mutation::PropertyCreated).await;
        Ok(record)
    }

    /// Owner-only partial update.
    pub async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        request: PropertyUpdateRequest,
    ) -> Result<PropertyRecord, PropertyServiceError> {
        let existing = self.load(id).await?;
        if !existing.is_owned_by(caller) {
            return Err(DomainError::forbidden("update this property").into());
        }

        let fields = merge_update(PropertyFields::from(&existing), request);
        validate_listing(listing_fields(&fields))?;

        let record = self
            .repo
            .update_property(UpdatePropertyParams { id, fields })
            .await?;

        self.invalidator
            .apply(Mutation::PropertyUpdated { property_id: id })
            .await;
        Ok(record)
    }

    /// Owner-only delete.
    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), PropertyServiceError> {
        let existing = self.load(id).await?;
        if !existing.is_owned_by(caller) {
            return Err(DomainError::forbidden("delete this property").into());
        }

        self.repo.delete_property(id).await?;

        self.invalidator
            .apply(Mutation::PropertyDeleted { property_id: id })
            .await;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<PropertyRecord, PropertyServiceError> {
        self.repo
            .find_property(id)
            .await?
            .ok_or_else(|| DomainError::not_found("property").into())
    }
}

fn listing_fields(fields: &PropertyFields) -> ListingFields<'_> {
    ListingFields {
        property_code: &fields.property_code,
        title: &fields.title,
        city: &fields.city,
        state: &fields.state,
        price: fields.price,
        area_sq_ft: fields.area_sq_ft,
        bedrooms: fields.bedrooms,
        bathrooms: fields.bathrooms,
        rating: fields.rating,
    }
}

fn merge_update(mut fields: PropertyFields, update: PropertyUpdateRequest) -> PropertyFields {
    macro_rules! apply {
        ($($field:ident),+ $(,)?) => {
            $(
                if let Some(value) = update.$field {
                    fields.$field = value;
                }
            )+
        };
    }
    apply!(
        title,
        property_type,
        price,
        state,
        city,
        area_sq_ft,
        bedrooms,
        bathrooms,
        amenities,
        furnished,
        available_from,
        listed_by,
        tags,
        is_verified,
        listing_type,
        images,
    );
    if update.color_theme.is_some() {
        fields.color_theme = update.color_theme;
    }
    if update.rating.is_some() {
        fields.rating = update.rating;
    }
    if update.description.is_some() {
        fields.description = update.description;
    }
    fields
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use listings_api_types::{Furnished, ListedBy, ListingType, PropertyType};
    use time::macros::date;

    use super::*;
    use crate::infra::memory::MemoryRepositories;

    fn create_request(code: &str, city: &str) -> PropertyCreateRequest {
        PropertyCreateRequest {
            property_id: code.into(),
            title: format!("Listing {code}"),
            property_type: PropertyType::Apartment,
            price: 5_000_000.0,
            state: "Maharashtra".into(),
            city: city.into(),
            area_sq_ft: 900.0,
            bedrooms: 2,
            bathrooms: 2,
            amenities: vec!["gym".into()],
            furnished: Furnished::Semi,
            available_from: date!(2025 - 01 - 01),
            listed_by: ListedBy::Owner,
            tags: vec![],
            color_theme: None,
            rating: Some(4.0),
            is_verified: false,
            listing_type: ListingType::Sale,
            images: vec![],
            description: None,
        }
    }

    fn city(value: &str) -> PropertyQueryParams {
        PropertyQueryParams {
            city: Some(value.into()),
            ..Default::default()
        }
    }

    fn setup() -> (PropertyService, Arc<MemoryRepositories>) {
        let repos = Arc::new(MemoryRepositories::new());
        (
            PropertyService::new(repos.clone(), CacheService::in_memory()),
            repos,
        )
    }

    #[tokio::test]
    async fn repeated_list_is_served_from_cache() {
        let (service, repos) = setup();
        let owner = Uuid::new_v4();
        service
            .create(owner, create_request("P1", "Pune"))
            .await
            .expect("create");

        let before = repos.property_queries.load(Ordering::SeqCst);
        let first = service.list(&city("Pune")).await.expect("first list");
        let second = service.list(&city("Pune")).await.expect("second list");

        assert_eq!(first, second);
        assert_eq!(repos.property_queries.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn create_invalidates_cached_lists() {
        let (service, _) = setup();
        let owner = Uuid::new_v4();

        let empty = service.list(&city("Pune")).await.expect("list");
        assert!(empty.properties.is_empty());

        let created = service
            .create(owner, create_request("P1", "Pune"))
            .await
            .expect("create");

        let refreshed = service.list(&city("Pune")).await.expect("list");
        assert_eq!(refreshed.properties, vec![created]);
        assert_eq!(refreshed.pagination.total, 1);
    }

    #[tokio::test]
    async fn update_refreshes_entity_entry() {
        let (service, _) = setup();
        let owner = Uuid::new_v4();
        let created = service
            .create(owner, create_request("P1", "Pune"))
            .await
            .expect("create");
        service.get(created.id).await.expect("warm entity key");

        service
            .update(
                owner,
                created.id,
                PropertyUpdateRequest {
                    price: Some(10.0),
                    ..Default::default()
                },
            )
            .await
            .expect("update");

        assert_eq!(service.get(created.id).await.expect("get").price, 10.0);
    }

    #[tokio::test]
    async fn only_owner_may_modify() {
        let (service, _) = setup();
        let created = service
            .create(Uuid::new_v4(), create_request("P1", "Pune"))
            .await
            .expect("create");

        let stranger = Uuid::new_v4();
        let err = service
            .delete(stranger, created.id)
            .await
            .expect_err("stranger delete");
        assert!(matches!(
            err,
            PropertyServiceError::Domain(DomainError::Forbidden { .. })
        ));

        let err = service
            .update(stranger, created.id, PropertyUpdateRequest::default())
            .await
            .expect_err("stranger update");
        assert!(matches!(
            err,
            PropertyServiceError::Domain(DomainError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn missing_property_is_not_cached() {
        let (service, _) = setup();
        let id = Uuid::new_v4();
        let err = service.get(id).await.expect_err("missing");
        assert!(matches!(
            err,
            PropertyServiceError::Domain(DomainError::NotFound { .. })
        ));
        assert!(!service.cache.exists(&entity_key(PROPERTY, id)).await);
    }

    #[tokio::test]
    async fn invalid_listing_is_rejected_before_writing() {
        let (service, repos) = setup();
        let mut request = create_request("P1", "Pune");
        request.price = -5.0;

        let err = service
            .create(Uuid::new_v4(), request)
            .await
            .expect_err("invalid");
        assert!(matches!(
            err,
            PropertyServiceError::Domain(DomainError::Validation { .. })
        ));
        assert_eq!(repos.property_count(), 0);
    }

    #[tokio::test]
    async fn search_echoes_query_and_paginates() {
        let (service, _) = setup();
        let owner = Uuid::new_v4();
        for n in 0..3 {
            service
                .create(owner, create_request(&format!("P{n}"), "Goa"))
                .await
                .expect("create");
        }

        let params = PropertyQueryParams {
            city: Some("goa".into()),
            sort_by: Some("price_desc".into()),
            limit: Some("2".into()),
            ..Default::default()
        };
        let results = service.search(&params).await.expect("search");

        assert_eq!(results.properties.len(), 2);
        assert!(results.pagination.has_next_page);
        assert_eq!(results.pagination.next_page, Some(2));
        assert_eq!(results.filters.sort_by, "price_desc");
        assert_eq!(
            results.filters.applied,
            Some(serde_json::json!({ "city": "/goa/i" }))
        );
    }
}
