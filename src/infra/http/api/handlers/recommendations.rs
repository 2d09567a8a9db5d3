//! Recommendations handlers
//!
//! The received list is cached by the read-through middleware, keyed with
//! [`recommendations_cache_key`].

use axum::Json;
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use listings_api_types::{ApiEnvelope, RecommendationRequest};
use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::pagination::{PageParams, PageRequest};
use crate::cache::keys::{UserResource, user_scoped_key};

use super::{json_body, path_id};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::AuthUser;
use crate::infra::http::api::state::ApiState;

/// `user:<id>:recommendations:<page>:<limit>`; anonymous requests bypass the cache.
pub fn recommendations_cache_key(request: &Request<Body>) -> Option<String> {
    let principal = request.extensions().get::<Principal>()?;
    let params = Query::<PageParams>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();
    let page = PageRequest::from_params(&params);
    Some(user_scoped_key(
        principal.user_id,
        UserResource::Recommendations,
        Some((page.page, page.limit)),
    ))
}

pub async fn list_recommendations(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::from_params(&params);
    let list = state
        .recommendations
        .list_received(caller.user_id, page)
        .await?;
    Ok(Json(ApiEnvelope::ok(list)))
}

pub async fn create_recommendation(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let recipient = request.recipient_email.trim().to_string();
    let record = state
        .recommendations
        .recommend(caller.user_id, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiEnvelope::with_message(
            format!("Property recommended to {recipient} successfully"),
            record,
        )),
    ))
}

pub async fn delete_recommendation(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .recommendations
        .delete(caller.user_id, path_id(path)?)
        .await?;
    Ok(Json(ApiEnvelope::message(
        "Recommendation deleted successfully",
    )))
}
