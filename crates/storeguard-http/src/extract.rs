//! Request extractors that run the sanitizer.

use axum::Json;
use axum::extract::{FromRef, FromRequest, Request};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

/// JSON body that has passed the attack detector.
///
/// The body is decoded into a generic tree, sanitized, and only then
/// deserialized into `T`, so `T` always sees the stripped strings. A
/// detection rejects with 403 naming the offending field.
#[derive(Debug, Clone)]
pub struct SanitizedJson<T>(pub T);

impl<S, T> FromRequest<S> for SanitizedJson<T>
where
    S: Send + Sync,
    AppState: FromRef<S>,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let app = AppState::from_ref(state);
        let cleaned = app.sanitize(&raw)?;

        let value = serde_json::from_value(cleaned).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(Self(value))
    }
}
