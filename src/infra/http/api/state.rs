use std::sync::Arc;

use crate::application::auth::AuthService;
use crate::application::favorites::FavoriteService;
use crate::application::properties::PropertyService;
use crate::application::recommendations::RecommendationService;
use crate::application::repos::{
    ApiTokensRepo, FavoritesRepo, PropertiesRepo, RecommendationsRepo, UsersRepo,
};
use crate::cache::CacheService;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub auth: Arc<AuthService>,
    pub properties: Arc<PropertyService>,
    pub favorites: Arc<FavoriteService>,
    pub recommendations: Arc<RecommendationService>,
    pub cache: CacheService,
    /// `None` when running on the in-memory repositories.
    pub db: Option<Arc<PostgresRepositories>>,
}

impl ApiState {
    /// Wires every service over one repository set sharing one cache.
    pub fn from_repositories<R>(repos: Arc<R>, cache: CacheService) -> Self
    where
        R: PropertiesRepo + UsersRepo + FavoritesRepo + RecommendationsRepo + ApiTokensRepo + 'static,
    {
        Self {
            auth: Arc::new(AuthService::new(repos.clone(), repos.clone())),
            properties: Arc::new(PropertyService::new(repos.clone(), cache.clone())),
            favorites: Arc::new(FavoriteService::new(
                repos.clone(),
                repos.clone(),
                cache.clone(),
            )),
            recommendations: Arc::new(RecommendationService::new(
                repos.clone(),
                repos.clone(),
                repos,
                cache.clone(),
            )),
            cache,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<PostgresRepositories>) -> Self {
        self.db = Some(db);
        self
    }
}
