//! Owner identity extraction
//!
//! There is no session layer in this service. Upstream infrastructure is
//! expected to authenticate the owner dashboard and forward the owner id in
//! the `x-owner-id` header; requests without it are rejected.

use crate::error::QueueError;
use crate::http::handlers::ApiError;
use crate::types::OwnerId;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

/// Header carrying the authenticated owner's id
pub const OWNER_HEADER: &str = "x-owner-id";

/// The company owner behind an authenticated dashboard request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerIdentity(pub OwnerId);

impl<S> FromRequestParts<S> for OwnerIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ApiError::from(QueueError::Unauthorized {
                    reason: format!("Missing {} header", OWNER_HEADER),
                })
            })?;

        let owner_id = raw.parse::<Uuid>().map_err(|_| {
            ApiError::from(QueueError::Unauthorized {
                reason: format!("Malformed {} header", OWNER_HEADER),
            })
        })?;

        Ok(OwnerIdentity(owner_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<OwnerIdentity, ApiError> {
        let (mut parts, _) = request.into_parts();
        OwnerIdentity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_header_is_accepted() {
        let owner = Uuid::new_v4();
        let request = Request::builder()
            .header(OWNER_HEADER, owner.to_string())
            .body(())
            .unwrap();

        let identity = extract(request).await.unwrap();
        assert_eq!(identity.0, owner);
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let request = Request::builder().body(()).unwrap();
        assert!(extract(request).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_header_is_rejected() {
        let request = Request::builder()
            .header(OWNER_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(extract(request).await.is_err());
    }
}
