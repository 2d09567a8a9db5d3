use std::sync::Arc;

use listings_api_types::FavoriteList;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{FavoritesRepo, PropertiesRepo, RepoError};
use crate::cache::keys::{UserResource, user_scoped_key};
use crate::cache::{CacheService, Invalidator, Mutation};
use crate::domain::entities::{FavoriteEntry, PropertyRecord};
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum FavoriteServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FavoriteService {
    favorites: Arc<dyn FavoritesRepo>,
    properties: Arc<dyn PropertiesRepo>,
    cache: CacheService,
    invalidator: Invalidator,
}

impl FavoriteService {
    pub fn new(
        favorites: Arc<dyn FavoritesRepo>,
        properties: Arc<dyn PropertiesRepo>,
        cache: CacheService,
    ) -> Self {
        Self {
            favorites,
            properties,
            invalidator: Invalidator::new(cache.clone()),
            cache,
        }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<FavoriteList<FavoriteEntry>, FavoriteServiceError> {
        let key = user_scoped_key(
            user_id,
            UserResource::Favorites,
            Some((page.page, page.limit)),
        );
        self.cache
            .read_through(&key, None, || async {
                let found = self.favorites.list_favorites(user_id, page).await?;
                Ok::<_, FavoriteServiceError>(FavoriteList {
                    favorites: found.items,
                    pagination: page.summarize(found.total),
                })
            })
            .await
    }

    /// Adds `property_id` to the user's favorites. Adding twice is a no-op.
    pub async fn add(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<PropertyRecord, FavoriteServiceError> {
        let property = self
            .properties
            .find_property(property_id)
            .await?
            .ok_or_else(|| DomainError::not_found("property"))?;

        if self.favorites.add_favorite(user_id, property_id).await? {
            self.invalidator
                .apply(Mutation::FavoritesChanged { user_id })
                .await;
        }
        Ok(property)
    }

    /// Returns whether a favorite was removed.
    pub async fn remove(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<bool, FavoriteServiceError> {
        let removed = self.favorites.remove_favorite(user_id, property_id).await?;
        if removed {
            self.invalidator
                .apply(Mutation::FavoritesChanged { user_id })
                .await;
        }
        Ok(removed)
    }
}
