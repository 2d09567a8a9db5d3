use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::auth::AuthError;
use crate::application::error::ErrorReport;
use crate::application::favorites::FavoriteServiceError;
use crate::application::filter::FilterError;
use crate::application::properties::PropertyServiceError;
use crate::application::recommendations::RecommendationServiceError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const VALIDATION: &str = "validation_error";
    pub const INVALID_FILTER: &str = "invalid_filter";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const INTERNAL: &str = "internal_error";
    pub const UNAVAILABLE: &str = "unavailable";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: Cow<'static, str>,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<Cow<'static, str>>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Authentication required",
            Some("send `Authorization: Bearer <token>`".to_string()),
        )
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn unavailable(message: &'static str, hint: Option<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::UNAVAILABLE,
            message,
            hint,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message.as_ref())
        );
        let body = ApiErrorBody {
            success: false,
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.into_owned(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::api", self.status, detail).attach(&mut response);
        response
    }
}

fn capitalize(entity: &str) -> String {
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => Self::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(constraint),
            ),
            RepoError::NotFound => Self::not_found("Resource not found"),
            RepoError::InvalidInput { message } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message),
            ),
            RepoError::Integrity { message } => Self::new(
                StatusCode::CONFLICT,
                codes::INTEGRITY,
                "Integrity constraint violated",
                Some(message),
            ),
            RepoError::Timeout => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::Persistence(message) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                Some(message),
            ),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity } => {
                Self::not_found(format!("{} not found", capitalize(entity)))
            }
            DomainError::Validation { message } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::VALIDATION,
                "Validation failed",
                Some(message),
            ),
            DomainError::Forbidden { action } => Self::new(
                StatusCode::FORBIDDEN,
                codes::FORBIDDEN,
                format!("You are not authorized to {action}"),
                None,
            ),
            DomainError::Invariant { message } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "Internal error",
                Some(message),
            ),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_FILTER,
            "Invalid query parameter",
            Some(err.to_string()),
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => Self::unauthorized(),
            AuthError::Invalid => Self::new(
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED,
                "Invalid bearer token",
                None,
            ),
            AuthError::Revoked => Self::new(
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED,
                "Bearer token revoked",
                None,
            ),
        }
    }
}

impl From<PropertyServiceError> for ApiError {
    fn from(err: PropertyServiceError) -> Self {
        match err {
            PropertyServiceError::Domain(err) => err.into(),
            PropertyServiceError::Repo(err) => err.into(),
            PropertyServiceError::Filter(err) => err.into(),
        }
    }
}

impl From<FavoriteServiceError> for ApiError {
    fn from(err: FavoriteServiceError) -> Self {
        match err {
            FavoriteServiceError::Domain(err) => err.into(),
            FavoriteServiceError::Repo(err) => err.into(),
        }
    }
}

impl From<RecommendationServiceError> for ApiError {
    fn from(err: RecommendationServiceError) -> Self {
        match err {
            RecommendationServiceError::Domain(err) => err.into(),
            RecommendationServiceError::Repo(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn renders_failure_envelope_with_report() {
        let response = ApiError::from(DomainError::not_found("property")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
        assert_eq!(
            body_json(response).await,
            json!({
                "success": false,
                "error": { "code": "not_found", "message": "Property not found" }
            })
        );
    }

    #[test]
    fn maps_domain_and_repo_errors() {
        let forbidden = ApiError::from(DomainError::forbidden("update this property"));
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let duplicate = ApiError::from(PropertyServiceError::Repo(RepoError::Duplicate {
            constraint: "properties_property_code_key".into(),
        }));
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        assert_eq!(duplicate.code(), codes::DUPLICATE);

        let filter = ApiError::from(FilterError::InvalidValue {
            field: "minPrice",
            value: "cheap".into(),
        });
        assert_eq!(filter.status(), StatusCode::BAD_REQUEST);
        assert_eq!(filter.code(), codes::INVALID_FILTER);
    }
}
