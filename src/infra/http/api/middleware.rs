use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::auth::Principal;

use super::error::ApiError;
use super::state::ApiState;

/// Resolves the caller from a bearer token when one is sent.
///
/// Anonymous requests pass through without a [`Principal`]; a token that is
/// present but does not authenticate is rejected outright. The principal is
/// copied onto the response for the logging middleware.
pub async fn resolve_principal(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers().get(header::AUTHORIZATION)) else {
        return next.run(request).await;
    };

    match state.auth.authenticate(&token).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(principal);
            response
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?.trim();
    (!bearer.is_empty()).then(|| bearer.to_string())
}

/// Extractor for endpoints that need a caller; rejects with `401`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(ApiError::unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_extracted() {
        let header = HeaderValue::from_static("Bearer lk_abc_secret");
        assert_eq!(
            extract_token(Some(&header)).as_deref(),
            Some("lk_abc_secret")
        );
        assert_eq!(extract_token(Some(&HeaderValue::from_static("Basic xyz"))), None);
        assert_eq!(extract_token(Some(&HeaderValue::from_static("Bearer  "))), None);
        assert_eq!(extract_token(None), None);
    }
}
