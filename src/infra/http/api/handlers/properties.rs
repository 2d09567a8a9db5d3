//! Property catalog handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use listings_api_types::{ApiEnvelope, PropertyCreateRequest, PropertyUpdateRequest};
use uuid::Uuid;

use crate::application::filter::PropertyQueryParams;

use super::{json_body, path_id};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::AuthUser;
use crate::infra::http::api::state::ApiState;

pub async fn list_properties(
    State(state): State<ApiState>,
    Query(params): Query<PropertyQueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state.properties.list(&params).await?;
    Ok(Json(ApiEnvelope::ok(list)))
}

pub async fn search_properties(
    State(state): State<ApiState>,
    Query(params): Query<PropertyQueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state.properties.search(&params).await?;
    Ok(Json(ApiEnvelope::ok(results)))
}

pub async fn get_property(
    State(state): State<ApiState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let property = state.properties.get(path_id(path)?).await?;
    Ok(Json(ApiEnvelope::ok(property)))
}

pub async fn create_property(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<PropertyCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let property = state.properties.create(caller.user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiEnvelope::with_message(
            "Property created successfully",
            property,
        )),
    ))
}

pub async fn update_property(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PropertyUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(path)?;
    let request = json_body(payload)?;
    let property = state.properties.update(caller.user_id, id, request).await?;
    Ok(Json(ApiEnvelope::with_message(
        "Property updated successfully",
        property,
    )))
}

pub async fn delete_property(
    State(state): State<ApiState>,
    AuthUser(caller): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .properties
        .delete(caller.user_id, path_id(path)?)
        .await?;
    Ok(Json(ApiEnvelope::message("Property deleted successfully")))
}
