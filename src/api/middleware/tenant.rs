//! Tenant resolution from request headers

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::api::types::ApiError;
use crate::domain::checkpoint::TenantKey;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant named by the `X-Tenant-Id` header, or the default tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant(pub TenantKey);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(TENANT_HEADER) else {
            return Ok(Tenant(TenantKey::default()));
        };

        let value = value.to_str().map_err(|_| {
            ApiError::bad_request("Invalid X-Tenant-Id header encoding").with_param(TENANT_HEADER)
        })?;

        let tenant = TenantKey::new(value);
        debug!(tenant = %tenant, "Resolved tenant from header");

        Ok(Tenant(tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    async fn extract(header: Option<HeaderValue>) -> Result<Tenant, ApiError> {
        let mut builder = Request::builder().uri("/v1/translate");
        if let Some(value) = header {
            builder = builder.header(TENANT_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Tenant::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_missing_header_uses_default_tenant() {
        let Tenant(tenant) = extract(None).await.unwrap();
        assert_eq!(tenant, TenantKey::default());
    }

    #[tokio::test]
    async fn test_header_selects_tenant() {
        let Tenant(tenant) = extract(Some(HeaderValue::from_static(" acme "))).await.unwrap();
        assert_eq!(tenant.as_str(), "acme");
    }

    #[tokio::test]
    async fn test_non_ascii_header_is_rejected() {
        let value = HeaderValue::from_bytes(b"caf\xe9").unwrap();
        let err = extract(Some(value)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
