//! Path extractor for entity ids.
//!
//! `Path<Uuid>` rejects a malformed id with a plain-text 400. `PathId<T>`
//! rejects it with the standard error envelope instead.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Single path parameter parsed as `T` (`Uuid` for agents and calls, `i32`
/// for cities).
///
/// ```rust,ignore
/// async fn agent_stats(PathId(agent_id): PathId<Uuid>) -> ApiResult<impl IntoResponse> {
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PathId<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<T> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiError::invalid_format("id", std::any::type_name::<T>())
                    .with_details(serde_json::json!({ "reason": e.body_text() }))
            })?;
        Ok(PathId(id))
    }
}
