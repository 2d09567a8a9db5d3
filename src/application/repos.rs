//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::filter::PropertyQuery;
use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{
    ApiTokenRecord, FavoriteEntry, PropertyRecord, RecommendationEntry, RecommendationRecord,
    UserRecord,
};
use crate::domain::types::{Furnished, ListedBy, ListingType, PropertyType};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Every owner-editable listing attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFields {
    pub property_code: String,
    pub title: String,
    pub property_type: PropertyType,
    pub price: f64,
    pub state: String,
    pub city: String,
    pub area_sq_ft: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub amenities: Vec<String>,
    pub furnished: Furnished,
    pub available_from: Date,
    pub listed_by: ListedBy,
    pub tags: Vec<String>,
    pub color_theme: Option<String>,
    pub rating: Option<f64>,
    pub is_verified: bool,
    pub listing_type: ListingType,
    pub images: Vec<String>,
    pub description: Option<String>,
}

impl From<&PropertyRecord> for PropertyFields {
    fn from(record: &PropertyRecord) -> Self {
        Self {
            property_code: record.property_code.clone(),
            title: record.title.clone(),
            property_type: record.property_type,
            price: record.price,
            state: record.state.clone(),
            city: record.city.clone(),
            area_sq_ft: record.area_sq_ft,
            bedrooms: record.bedrooms,
            bathrooms: record.bathrooms,
            amenities: record.amenities.clone(),
            furnished: record.furnished,
            available_from: record.available_from,
            listed_by: record.listed_by,
            tags: record.tags.clone(),
            color_theme: record.color_theme.clone(),
            rating: record.rating,
            is_verified: record.is_verified,
            listing_type: record.listing_type,
            images: record.images.clone(),
            description: record.description.clone(),
        }
    }
}

impl PropertyFields {
    /// Attaches identity and timestamps to a full set of listing fields.
    pub fn into_record(
        self,
        id: Uuid,
        created_by: Uuid,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    ) -> PropertyRecord {
        PropertyRecord {
            id,
            property_code: self.property_code,
            title: self.title,
            property_type: self.property_type,
            price: self.price,
            state: self.state,
            city: self.city,
            area_sq_ft: self.area_sq_ft,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            amenities: self.amenities,
            furnished: self.furnished,
            available_from: self.available_from,
            listed_by: self.listed_by,
            tags: self.tags,
            color_theme: self.color_theme,
            rating: self.rating,
            is_verified: self.is_verified,
            listing_type: self.listing_type,
            created_by,
            images: self.images,
            description: self.description,
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePropertyParams {
    pub fields: PropertyFields,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpdatePropertyParams {
    pub id: Uuid,
    pub fields: PropertyFields,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CreateRecommendationParams {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub property_id: Uuid,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateApiTokenParams {
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
}

#[async_trait]
pub trait PropertiesRepo: Send + Sync {
    async fn list_properties(
        &self,
        query: &PropertyQuery,
    ) -> Result<Page<PropertyRecord>, RepoError>;

    async fn find_property(&self, id: Uuid) -> Result<Option<PropertyRecord>, RepoError>;

    async fn create_property(
        &self,
        params: CreatePropertyParams,
    ) -> Result<PropertyRecord, RepoError>;

    async fn update_property(
        &self,
        params: UpdatePropertyParams,
    ) -> Result<PropertyRecord, RepoError>;

    async fn delete_property(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
}

#[async_trait]
pub trait FavoritesRepo: Send + Sync {
    /// Returns `false` when the favorite already existed.
    async fn add_favorite(&self, user_id: Uuid, property_id: Uuid) -> Result<bool, RepoError>;

    /// Returns `false` when there was nothing to remove.
    async fn remove_favorite(&self, user_id: Uuid, property_id: Uuid)
    -> Result<bool, RepoError>;

    async fn list_favorites(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<FavoriteEntry>, RepoError>;
}

#[async_trait]
pub trait RecommendationsRepo: Send + Sync {
    async fn create_recommendation(
        &self,
        params: CreateRecommendationParams,
    ) -> Result<RecommendationRecord, RepoError>;

    async fn find_recommendation(
        &self,
        id: Uuid,
    ) -> Result<Option<RecommendationRecord>, RepoError>;

    async fn list_received(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RecommendationEntry>, RepoError>;

    async fn delete_recommendation(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ApiTokensRepo: Send + Sync {
    async fn create_token(&self, params: CreateApiTokenParams)
    -> Result<ApiTokenRecord, RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiTokenRecord>, RepoError>;
}
