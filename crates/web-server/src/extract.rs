// In crates/web-server/src/extract.rs

use crate::Error;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};

/// A JSON request body whose rejections use the API's error shape.
///
/// Malformed JSON, a wrong content type, or a field of the wrong type (a
/// fractional quantity, a negative xp amount) answers with
/// `{success: false, message}` and the status axum would have used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}
