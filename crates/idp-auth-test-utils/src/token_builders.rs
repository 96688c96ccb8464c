//! Builder patterns for test claims.

use chrono::{Duration, Utc};
use serde_json::json;

/// Builder for identity-provider token claims.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new()
///     .for_user("user-42")
///     .with_realm_roles(&["user"])
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestClaimsBuilder {
    claims: serde_json::Map<String, serde_json::Value>,
}

impl TestClaimsBuilder {
    /// Create a new builder with defaults: subject `test-subject`, issued now,
    /// expiring in one hour.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = serde_json::Map::new();
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("exp".to_string(), json!((now + Duration::seconds(3600)).timestamp()));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        Self { claims }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.with_claim("nbf", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    pub fn with_username(self, username: &str) -> Self {
        self.with_claim("preferred_username", json!(username))
    }

    pub fn with_email(self, email: &str) -> Self {
        self.with_claim("email", json!(email))
    }

    pub fn with_name(self, name: &str) -> Self {
        self.with_claim("name", json!(name))
    }

    /// Set `realm_access.roles`
    pub fn with_realm_roles(self, roles: &[&str]) -> Self {
        self.with_claim("realm_access", json!({ "roles": roles }))
    }

    /// Add `resource_access.<client>.roles`
    pub fn with_resource_roles(mut self, client: &str, roles: &[&str]) -> Self {
        let access = self
            .claims
            .entry("resource_access")
            .or_insert_with(|| json!({}));
        if let Some(map) = access.as_object_mut() {
            map.insert(client.to_string(), json!({ "roles": roles }));
        }
        self
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: serde_json::Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim, e.g. `exp` or `sub`
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> serde_json::Value {
        serde_json::Value::Object(self.claims)
    }
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
