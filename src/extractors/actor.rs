//! Extract the acting user from the request (X-User-Id header).

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use uuid::Uuid;

/// Header an upstream auth layer sets to the authenticated user's id.
pub const ACTOR_HEADER: &str = "X-User-Id";

/// Optional actor id. A missing header or a value that is not a UUID yields `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Actor(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(raw) = raw else {
            return Ok(Actor(None));
        };
        match Uuid::parse_str(raw) {
            Ok(id) => Ok(Actor(Some(id))),
            Err(_) => {
                tracing::warn!(header = ACTOR_HEADER, value = raw, "ignoring malformed actor id");
                Ok(Actor(None))
            }
        }
    }
}
