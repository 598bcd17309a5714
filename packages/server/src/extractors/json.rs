use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON body of an admin command where every field is optional.
///
/// An empty (or all-whitespace) body yields `T::default()`, so operators can
/// `POST` without a payload and get the configured defaults. Malformed JSON
/// becomes `AppError::Validation`.
pub struct JsonOrDefault<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrDefault<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonOrDefault(T::default()));
        }

        serde_json::from_slice(&body)
            .map(JsonOrDefault)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))
    }
}
