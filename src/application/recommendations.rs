use std::sync::Arc;

use listings_api_types::{RecommendationList, RecommendationRequest};
use thiserror::Error;
use uuid::Uuid;

use crate::application::auth::normalize_email;
use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CreateRecommendationParams, PropertiesRepo, RecommendationsRepo, RepoError, UsersRepo,
};
use crate::cache::{CacheService, Invalidator, Mutation};
use crate::domain::entities::{RecommendationEntry, RecommendationRecord};
use crate::domain::error::DomainError;

/// Upper bound on the free-text note attached to a recommendation.
pub const MAX_MESSAGE_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum RecommendationServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Recommendations between users.
///
/// The received list is cached at the HTTP layer by the read-through
/// middleware, so [`RecommendationService::list_received`] always hits the
/// repository. Writes still invalidate the recipient's cached pages.
#[derive(Clone)]
pub struct RecommendationService {
    recommendations: Arc<dyn RecommendationsRepo>,
    users: Arc<dyn UsersRepo>,
    properties: Arc<dyn PropertiesRepo>,
    invalidator: Invalidator,
}

impl RecommendationService {
    pub fn new(
        recommendations: Arc<dyn RecommendationsRepo>,
        users: Arc<dyn UsersRepo>,
        properties: Arc<dyn PropertiesRepo>,
        cache: CacheService,
    ) -> Self {
        Self {
            recommendations,
            users,
            properties,
            invalidator: Invalidator::new(cache),
        }
    }

    pub async fn recommend(
        &self,
        from_user_id: Uuid,
        request: RecommendationRequest,
    ) -> Result<RecommendationRecord, RecommendationServiceError> {
        let message = request
            .message
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty());
        if message
            .as_ref()
            .is_some_and(|message| message.chars().count() > MAX_MESSAGE_LEN)
        {
            return Err(DomainError::validation(format!(
                "message must be at most {MAX_MESSAGE_LEN} characters"
            ))
            .into());
        }

        let email = normalize_email(&request.recipient_email)
            .ok_or_else(|| DomainError::validation("recipientEmail must be a valid e-mail"))?;
        let recipient = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| DomainError::not_found("recipient user"))?;
        self.properties
            .find_property(request.property_id)
            .await?
            .ok_or_else(|| DomainError::not_found("property"))?;

        let record = self
            .recommendations
            .create_recommendation(CreateRecommendationParams {
                from_user_id,
                to_user_id: recipient.id,
                property_id: request.property_id,
                message,
            })
            .await?;

        self.invalidator
            .apply(Mutation::RecommendationsChanged {
                user_id: recipient.id,
            })
            .await;
        Ok(record)
    }

    pub async fn list_received(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<RecommendationList<RecommendationEntry>, RecommendationServiceError> {
        let found = self.recommendations.list_received(user_id, page).await?;
        Ok(RecommendationList {
            recommendations: found.items,
            pagination: page.summarize(found.total),
        })
    }

    /// Deletes a recommendation the caller received. Anyone else's
    /// recommendation reads as missing.
    pub async fn delete(
        &self,
        user_id: Uuid,
        recommendation_id: Uuid,
    ) -> Result<(), RecommendationServiceError> {
        let record = self
            .recommendations
            .find_recommendation(recommendation_id)
            .await?
            .filter(|record| record.to_user_id == user_id)
            .ok_or_else(|| DomainError::not_found("recommendation"))?;

        self.recommendations.delete_recommendation(record.id).await?;

        self.invalidator
            .apply(Mutation::RecommendationsChanged { user_id })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::application::repos::CreateUserParams;
    use crate::cache::keys::{UserResource, user_scoped_key};
    use crate::domain::entities::UserRecord;
    use crate::infra::memory::MemoryRepositories;

    use super::*;

    struct Fixture {
        service: RecommendationService,
        repos: Arc<MemoryRepositories>,
        cache: CacheService,
    }

    fn fixture() -> Fixture {
        let repos = Arc::new(MemoryRepositories::new());
        let cache = CacheService::in_memory();
        let service =
            RecommendationService::new(repos.clone(), repos.clone(), repos.clone(), cache.clone());
        Fixture {
            service,
            repos,
            cache,
        }
    }

    async fn user(repos: &MemoryRepositories, email: &str) -> UserRecord {
        repos
            .create_user(CreateUserParams {
                email: email.into(),
                name: email.into(),
            })
            .await
            .expect("user")
    }

    fn request(property_id: Uuid, email: &str) -> RecommendationRequest {
        RecommendationRequest {
            property_id,
            recipient_email: email.into(),
            message: Some("  have a look  ".into()),
        }
    }

    #[tokio::test]
    async fn recommend_clears_recipient_pages() {
        let Fixture {
            service,
            repos,
            cache,
        } = fixture();
        let sender = user(&repos, "a@example.com").await;
        let recipient = user(&repos, "b@example.com").await;
        let property = repos.seed_property("PROP1", "Pune", sender.id);

        let page_key = user_scoped_key(recipient.id, UserResource::Recommendations, Some((1, 20)));
        cache.set(&page_key, &"stale").await;

        let record = service
            .recommend(sender.id, request(property.id, " B@Example.com "))
            .await
            .expect("recommend");

        assert_eq!(record.to_user_id, recipient.id);
        assert_eq!(record.message.as_deref(), Some("have a look"));
        assert!(!cache.exists(&page_key).await);

        let received = service
            .list_received(recipient.id, PageRequest::default())
            .await
            .expect("list");
        assert_eq!(received.pagination.total, 1);
        assert_eq!(received.recommendations[0].from.id, sender.id);
    }

    #[tokio::test]
    async fn unknown_recipient_or_property_is_not_found() {
        let Fixture { service, repos, .. } = fixture();
        let sender = user(&repos, "a@example.com").await;
        user(&repos, "b@example.com").await;
        let property = repos.seed_property("PROP1", "Pune", sender.id);

        let err = service
            .recommend(sender.id, request(property.id, "nobody@example.com"))
            .await
            .expect_err("missing recipient");
        assert!(matches!(
            err,
            RecommendationServiceError::Domain(DomainError::NotFound { .. })
        ));

        let err = service
            .recommend(sender.id, request(Uuid::new_v4(), "b@example.com"))
            .await
            .expect_err("missing property");
        assert!(matches!(
            err,
            RecommendationServiceError::Domain(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn only_recipient_may_delete() {
        let Fixture { service, repos, .. } = fixture();
        let sender = user(&repos, "a@example.com").await;
        let recipient = user(&repos, "b@example.com").await;
        let property = repos.seed_property("PROP1", "Pune", sender.id);
        let record = service
            .recommend(sender.id, request(property.id, "b@example.com"))
            .await
            .expect("recommend");

        let err = service
            .delete(sender.id, record.id)
            .await
            .expect_err("sender cannot delete");
        assert!(matches!(
            err,
            RecommendationServiceError::Domain(DomainError::NotFound { .. })
        ));

        service.delete(recipient.id, record.id).await.expect("delete");
        let received = service
            .list_received(recipient.id, PageRequest::default())
            .await
            .expect("list");
        assert!(received.recommendations.is_empty());
    }

    #[tokio::test]
    async fn overlong_message_is_rejected() {
        let Fixture { service, repos, .. } = fixture();
        let sender = user(&repos, "a@example.com").await;
        let property = repos.seed_property("PROP1", "Pune", sender.id);

        let mut req = request(property.id, "a@example.com");
        req.message = Some("x".repeat(MAX_MESSAGE_LEN + 1));
        let err = service.recommend(sender.id, req).await.expect_err("too long");
        assert!(matches!(
            err,
            RecommendationServiceError::Domain(DomainError::Validation { .. })
        ));
    }
}
