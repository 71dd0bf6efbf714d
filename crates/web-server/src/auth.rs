// In crates/web-server/src/auth.rs

use crate::Error;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use core_types::UserId;

/// Header carrying the id of the logged-in user, set by the session layer in front of the API.
pub const USER_HEADER: &str = "x-user-id";

/// The user a request acts on behalf of.
///
/// Rejects the request with `NotAuthenticated` when the header is missing or
/// is not a positive integer.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| CurrentUser(UserId(id)))
            .ok_or(Error::Domain(core_types::Error::NotAuthenticated))
    }
}
