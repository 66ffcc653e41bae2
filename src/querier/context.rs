//! Request-scoped context
//!
//! Tenant scope travels explicitly with each request instead of living in
//! ambient state. The querier reads it once, at the boundary.

use crate::querier::error::{QueryError, QueryResult};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Header carrying the tenant ID
pub const ORG_ID_HEADER: &str = "X-Scope-OrgID";

/// Per-request values handed to the querier and passed through to the store
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    tenant_id: Option<String>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without tenant scope
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tenant_id: None,
            deadline: None,
        }
    }

    /// Context scoped to `tenant_id`
    pub fn with_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Self::new()
        }
    }

    /// Build from request headers; the tenant header is matched
    /// case-insensitively.
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        let tenant_id = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(ORG_ID_HEADER))
            .map(|(_, value)| value.trim().to_string());

        Self {
            tenant_id,
            ..Self::new()
        }
    }

    /// Builder: fail store calls that outlive `timeout`
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the deadline, if any, has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Tenant scope of the request. Missing or empty is an auth error.
    pub fn tenant_id(&self) -> QueryResult<&str> {
        match self.tenant_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(QueryError::Auth("no org id".to_string())),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tenant() {
        let ctx = RequestContext::new();
        assert!(matches!(ctx.tenant_id(), Err(QueryError::Auth(_))));

        let ctx = RequestContext::with_tenant("");
        assert!(matches!(ctx.tenant_id(), Err(QueryError::Auth(_))));
    }

    #[test]
    fn test_with_tenant() {
        let ctx = RequestContext::with_tenant("team-a");
        assert_eq!(ctx.tenant_id().unwrap(), "team-a");
        assert!(!ctx.is_expired());
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HashMap::new();
        headers.insert("x-scope-orgid".to_string(), " team-b ".to_string());
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.tenant_id().unwrap(), "team-b");

        let ctx = RequestContext::from_headers(&HashMap::new());
        assert!(ctx.tenant_id().is_err());
    }

    #[test]
    fn test_deadline() {
        let ctx = RequestContext::with_tenant("t").timeout(Duration::ZERO);
        assert!(ctx.deadline().is_some());
        assert!(ctx.is_expired());
    }

    #[test]
    fn test_request_ids_differ() {
        assert_ne!(
            RequestContext::new().request_id(),
            RequestContext::new().request_id()
        );
    }
}
