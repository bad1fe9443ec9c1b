//! JSON error responses and the lenient JSON body extractor.

use crate::catalog_store::CatalogError;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{} not found", what) })),
            )
                .into_response(),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(err) => {
                error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(what) => ApiError::NotFound(what),
            CatalogError::InvalidInput(message) => ApiError::BadRequest(message),
            CatalogError::Validation(validation) => ApiError::BadRequest(validation.to_string()),
            CatalogError::Internal(err) => ApiError::Internal(err),
        }
    }
}

/// Unwraps a lookup, turning None into a 404 for `what`.
pub fn found<T>(value: Option<T>, what: impl Into<String>) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::not_found(what))
}

/// JSON body read from raw bytes, so a malformed body is a 400 with the
/// parser message instead of axum's plain-text rejection.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|err| ApiError::BadRequest(format!("Invalid JSON: {}", err)))
    }
}

/// `{success: true}` merged with the fields of `payload`.
pub fn success_with<T: Serialize>(payload: &T) -> ApiResult<Json<Value>> {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    match serde_json::to_value(payload).map_err(anyhow::Error::from)? {
        Value::Object(fields) => body.extend(fields),
        other => {
            body.insert("data".to_string(), other);
        }
    }
    Ok(Json(Value::Object(body)))
}

pub fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}
