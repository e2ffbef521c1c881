// API-key authentication
//
// Tenancy is a flat key-to-tenant map from configuration. Credentials may
// arrive as `Authorization: Bearer <key>`, as `X-API-Key: <key>`, or (for
// the SSE surface only, since EventSource cannot set headers) as an
// `api_key` query parameter.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
const API_KEY_QUERY_PARAM: &str = "api_key";

/// Flat API-key-to-tenant map parsed from the `API_KEYS` setting
/// (`key=tenant` pairs, comma-separated).
#[derive(Debug, Clone, Default)]
pub struct ApiKeyMap {
    keys: HashMap<String, String>,
}

impl ApiKeyMap {
    pub fn parse(raw: &str) -> Self {
        let keys = raw
            .split(',')
            .filter_map(|pair| {
                let (key, tenant) = pair.trim().split_once('=')?;
                if key.is_empty() || tenant.is_empty() {
                    return None;
                }
                Some((key.to_string(), tenant.to_string()))
            })
            .collect();
        Self { keys }
    }

    pub fn tenant_for(&self, api_key: &str) -> Option<&str> {
        self.keys.get(api_key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Tenant resolved from the request's API credential.
#[derive(Debug, Clone)]
pub struct Tenant(pub String);

#[async_trait]
impl FromRequestParts<AppState> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = bearer_key(parts)
            .or_else(|| header_key(parts))
            .or_else(|| query_key(parts))
            .ok_or(ApiError::MissingApiKey)?;

        match state.api_keys.tenant_for(&api_key) {
            Some(tenant) => Ok(Tenant(tenant.to_string())),
            None => Err(ApiError::InvalidApiKey),
        }
    }
}

fn bearer_key(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn header_key(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(API_KEY_HEADER)?
        .to_str()
        .ok()
        .map(str::to_string)
}

fn query_key(parts: &Parts) -> Option<String> {
    parts
        .uri
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix(API_KEY_QUERY_PARAM)?.strip_prefix('='))
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_pair() {
        let map = ApiKeyMap::parse("dev_key_123=tenant_dev");
        assert_eq!(map.tenant_for("dev_key_123"), Some("tenant_dev"));
        assert_eq!(map.tenant_for("other"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_parse_multiple_pairs_with_whitespace() {
        let map = ApiKeyMap::parse(" k1=tenant_a , k2=tenant_b,k3=tenant_a");
        assert_eq!(map.tenant_for("k1"), Some("tenant_a"));
        assert_eq!(map.tenant_for("k2"), Some("tenant_b"));
        assert_eq!(map.tenant_for("k3"), Some("tenant_a"));
    }

    #[test]
    fn test_parse_skips_malformed_pairs() {
        let map = ApiKeyMap::parse("no-separator,=tenant,key=,k1=tenant_a");
        assert_eq!(map.len(), 1);
        assert_eq!(map.tenant_for("k1"), Some("tenant_a"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(ApiKeyMap::parse("").is_empty());
    }

    #[test]
    fn test_tenant_value_may_contain_equals() {
        // Only the first '=' splits.
        let map = ApiKeyMap::parse("k1=tenant=with=equals");
        assert_eq!(map.tenant_for("k1"), Some("tenant=with=equals"));
    }

    #[test]
    fn test_query_key_extraction() {
        let request = axum::http::Request::builder()
            .uri("/v1/inbox/stream?limit=5&api_key=sse_key")
            .body(())
            .unwrap();
        let (parts, ()) = request.into_parts();
        assert_eq!(query_key(&parts).as_deref(), Some("sse_key"));

        let request = axum::http::Request::builder()
            .uri("/v1/inbox/stream?api_key=")
            .body(())
            .unwrap();
        let (parts, ()) = request.into_parts();
        assert_eq!(query_key(&parts), None);
    }
}
