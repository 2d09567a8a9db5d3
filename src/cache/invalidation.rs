//! Write-invalidate coordination.
//!
//! Each committed mutation maps to a fixed set of glob patterns. Services call
//! [`Invalidator::apply`] after the write succeeds and before responding, so a
//! caller's next read never sees a pre-write entry unless the store itself is
//! unreachable, in which case staleness is bounded by the entry TTL.

use std::fmt;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, warn};
use uuid::Uuid;

use super::keys::{
    PROPERTIES, PROPERTY, UserResource, collection_pattern, entity_pattern, user_scoped_pattern,
};
use super::service::CacheService;

pub const METRIC_CACHE_INVALIDATE_MS: &str = "listings_cache_invalidate_ms";

/// Committed writes that affect cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    PropertyCreated,
    PropertyUpdated { property_id: Uuid },
    PropertyDeleted { property_id: Uuid },
    /// A favorite was added to or removed from the user's list.
    FavoritesChanged { user_id: Uuid },
    /// The user's received recommendations changed.
    RecommendationsChanged { user_id: Uuid },
}

impl Mutation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PropertyCreated => "property_created",
            Self::PropertyUpdated { .. } => "property_updated",
            Self::PropertyDeleted { .. } => "property_deleted",
            Self::FavoritesChanged { .. } => "favorites_changed",
            Self::RecommendationsChanged { .. } => "recommendations_changed",
        }
    }
}

/// Ordered patterns to clear for one mutation. Narrow entity patterns come
/// before the collection sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub patterns: Vec<String>,
}

impl InvalidationPlan {
    pub fn for_mutation(mutation: Mutation) -> Self {
        let patterns = match mutation {
            Mutation::PropertyCreated => vec![collection_pattern(PROPERTIES)],
            Mutation::PropertyUpdated { property_id } | Mutation::PropertyDeleted { property_id } => {
                vec![
                    entity_pattern(PROPERTY, property_id),
                    collection_pattern(PROPERTIES),
                ]
            }
            Mutation::FavoritesChanged { user_id } => {
                vec![user_scoped_pattern(user_id, UserResource::Favorites)]
            }
            Mutation::RecommendationsChanged { user_id } => {
                vec![user_scoped_pattern(user_id, UserResource::Recommendations)]
            }
        };
        Self { patterns }
    }
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidationPlan {{ patterns: [{}] }}", self.patterns.join(", "))
    }
}

/// Result of applying a plan. Failures are informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationOutcome {
    pub cleared: Vec<String>,
    pub failed: Vec<String>,
}

impl InvalidationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Invalidator {
    cache: CacheService,
}

impl Invalidator {
    pub fn new(cache: CacheService) -> Self {
        Self { cache }
    }

    /// Clears every pattern for `mutation`, in order. Never fails: a pattern
    /// that could not be cleared is logged and reported in the outcome.
    pub async fn apply(&self, mutation: Mutation) -> InvalidationOutcome {
        let started_at = Instant::now();
        let plan = InvalidationPlan::for_mutation(mutation);
        let mut outcome = InvalidationOutcome {
            cleared: Vec::with_capacity(plan.patterns.len()),
            failed: Vec::new(),
        };

        if !self.cache.is_enabled() {
            return outcome;
        }

        for pattern in plan.patterns {
            if self.cache.clear_pattern(&pattern).await {
                outcome.cleared.push(pattern);
            } else {
                outcome.failed.push(pattern);
            }
        }

        if outcome.is_complete() {
            info!(
                mutation = mutation.label(),
                cleared = outcome.cleared.len(),
                "Cache invalidated"
            );
        } else {
            warn!(
                mutation = mutation.label(),
                failed = ?outcome.failed,
                "Cache invalidation incomplete; stale entries live until their TTL"
            );
        }

        histogram!(METRIC_CACHE_INVALIDATE_MS, "mutation" => mutation.label())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        outcome
    }
}
