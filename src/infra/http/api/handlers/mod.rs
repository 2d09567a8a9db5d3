//! API handlers organized by resource.
//!
//! Extraction helpers that turn axum rejections into [`ApiError`] live here
//! and are shared across modules.

mod favorites;
mod health;
mod properties;
mod recommendations;

pub use favorites::*;
pub use health::*;
pub use properties::*;
pub use recommendations::*;

use axum::Json;
use axum::extract::Path;
use axum::extract::rejection::{JsonRejection, PathRejection};
use uuid::Uuid;

use super::error::ApiError;

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|err| ApiError::bad_request("Invalid request body", Some(err.body_text())))
}

pub(crate) fn path_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|err| ApiError::bad_request("Invalid id", Some(err.body_text())))
}

pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
