//! Favorites handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use listings_api_types::{ApiEnvelope, FavoriteRequest};
use uuid::Uuid;

use crate::application::pagination::{PageParams, PageRequest};

use super::{json_body, path_id};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::AuthUser;
use crate::infra::http::api::state::ApiState;

pub async fn list_favorites(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::from_params(&params);
    let favorites = state.favorites.list(caller.user_id, page).await?;
    Ok(Json(ApiEnvelope::ok(favorites)))
}

pub async fn add_favorite(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<FavoriteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let property = state
        .favorites
        .add(caller.user_id, request.property_id)
        .await?;
    Ok(Json(ApiEnvelope::with_message(
        "Property added to favorites",
        property,
    )))
}

/// Removing a property that is not a favorite still succeeds.
pub async fn remove_favorite(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .favorites
        .remove(caller.user_id, path_id(path)?)
        .await?;
    Ok(Json(ApiEnvelope::message("Property removed from favorites")))
}
