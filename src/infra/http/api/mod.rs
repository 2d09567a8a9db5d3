pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get},
};

use crate::cache::{ReadThroughState, read_through_layer};
use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();
    let recommendations_cache = ReadThroughState::new(
        state.cache.clone(),
        handlers::recommendations_cache_key,
        None,
    );

    Router::new()
        .route(
            "/api/properties",
            get(handlers::list_properties).post(handlers::create_property),
        )
        .route("/api/properties/search", get(handlers::search_properties))
        .route(
            "/api/properties/{id}",
            get(handlers::get_property)
                .put(handlers::update_property)
                .delete(handlers::delete_property),
        )
        .route(
            "/api/favorites",
            get(handlers::list_favorites).post(handlers::add_favorite),
        )
        .route(
            "/api/favorites/{property_id}",
            delete(handlers::remove_favorite),
        )
        .route(
            "/api/recommendations",
            get(handlers::list_recommendations)
                .route_layer(axum_middleware::from_fn_with_state(
                    recommendations_cache,
                    read_through_layer,
                ))
                .post(handlers::create_recommendation),
        )
        .route(
            "/api/recommendations/{recommendation_id}",
            delete(handlers::delete_recommendation),
        )
        .route("/health", get(handlers::health))
        .fallback(handlers::route_not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::resolve_principal,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
