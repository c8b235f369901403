use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{config::AppConfig, error::ApiError, token::TokenService};

/// Name of the session cookie set at login and cleared at logout.
pub const SESSION_COOKIE: &str = "session";

/// extract_bearer
///
/// Pulls the raw credential from a request: the `Authorization: Bearer <token>`
/// header if present, otherwise the session cookie. Admin clients historically
/// send the header and learner clients the cookie, but both extractors honor
/// both carriers for parity; which carrier delivered the token is irrelevant,
/// only the signing domain matters.
fn extract_bearer(parts: &Parts) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// LearnerAuth Extractor
///
/// The resolved identity of a learner-domain request. Usable as a function
/// argument in any learner-protected handler; if extraction fails the
/// handler never runs and the client receives a 401.
///
/// The guard performs identity resolution only: verifying the token against
/// the learner signing domain and yielding the principal id. It makes no
/// ownership or authorization decisions; those belong to the resource-owning
/// component downstream.
#[derive(Debug, Clone)]
pub struct LearnerAuth(pub Uuid);

impl<S> FromRequestParts<S> for LearnerAuth
where
    S: Send + Sync,
    // Allows the extractor to pull the AppConfig (for the domain secret).
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let token = extract_bearer(parts).ok_or(ApiError::Unauthorized)?;

        let principal_id = TokenService::learner(&config).verify(&token).map_err(|e| {
            tracing::debug!(error = %e, "learner token rejected");
            ApiError::Unauthorized
        })?;

        Ok(LearnerAuth(principal_id))
    }
}

/// AdminAuth Extractor
///
/// The resolved identity of an admin-domain request. Identical mechanics to
/// [`LearnerAuth`] but verified against the independent admin secret. A
/// learner token presented on an admin route fails the signature check and
/// is rejected before the handler runs.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub Uuid);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let token = extract_bearer(parts).ok_or(ApiError::Unauthorized)?;

        let principal_id = TokenService::admin(&config).verify(&token).map_err(|e| {
            tracing::debug!(error = %e, "admin token rejected");
            ApiError::Unauthorized
        })?;

        Ok(AdminAuth(principal_id))
    }
}
