//! Validated identity handed to the rest of the application.

use crate::auth::claims::Claims;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Identity of an authenticated caller.
///
/// Only ever built from claims that passed signature and claims validation.
/// Subject and email are redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    /// Stable subject identifier (`sub`).
    pub subject: String,

    /// `preferred_username`, if the provider sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// `email` claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// `name` claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Realm-level roles (`realm_access.roles`).
    pub roles: Vec<String>,

    /// Per-client roles (`resource_access.<client>.roles`).
    pub resource_roles: HashMap<String, Vec<String>>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("subject", &"[REDACTED]")
            .field("username", &self.username)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("display_name", &self.display_name)
            .field("roles", &self.roles)
            .field("resource_roles", &self.resource_roles)
            .finish()
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            username: claims.preferred_username,
            email: claims.email,
            display_name: claims.name,
            roles: claims.realm_access.map(|access| access.roles).unwrap_or_default(),
            resource_roles: claims
                .resource_access
                .into_iter()
                .map(|(client, access)| (client, access.roles))
                .collect(),
        }
    }
}

impl AuthContext {
    /// Check for a realm role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check for any of the given realm roles.
    #[must_use]
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    /// Roles granted for one client. Empty if the client has none.
    #[must_use]
    pub fn resource_roles(&self, client: &str) -> &[String] {
        self.resource_roles
            .get(client)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Check for a role on a specific client.
    #[must_use]
    pub fn has_resource_role(&self, client: &str, role: &str) -> bool {
        self.resource_roles(client).iter().any(|r| r == role)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn context() -> AuthContext {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "user-42",
            "exp": 4_102_444_800i64,
            "preferred_username": "jdoe",
            "email": "jdoe@example.com",
            "name": "Jane Doe",
            "realm_access": {"roles": ["user", "project-admin"]},
            "resource_access": {
                "collabhub-api": {"roles": ["reader", "writer"]},
                "account": {"roles": ["manage-account"]}
            }
        }))
        .unwrap();
        AuthContext::from(claims)
    }

    #[test]
    fn test_from_claims_projects_identity() {
        let ctx = context();

        assert_eq!(ctx.subject, "user-42");
        assert_eq!(ctx.username.as_deref(), Some("jdoe"));
        assert_eq!(ctx.email.as_deref(), Some("jdoe@example.com"));
        assert_eq!(ctx.display_name.as_deref(), Some("Jane Doe"));
        assert_eq!(ctx.roles, vec!["user", "project-admin"]);
        assert_eq!(ctx.resource_roles.len(), 2);
    }

    #[test]
    fn test_from_minimal_claims() {
        let claims: Claims =
            serde_json::from_value(serde_json::json!({"sub": "svc", "exp": 1})).unwrap();
        let ctx = AuthContext::from(claims);

        assert_eq!(ctx.subject, "svc");
        assert!(ctx.username.is_none());
        assert!(ctx.roles.is_empty());
        assert!(ctx.resource_roles.is_empty());
    }

    #[test]
    fn test_role_helpers() {
        let ctx = context();

        assert!(ctx.has_role("user"));
        assert!(!ctx.has_role("admin"));
        assert!(ctx.has_any_role(&["admin", "project-admin"]));
        assert!(!ctx.has_any_role(&["admin", "auditor"]));
        assert!(!ctx.has_any_role(&[]));
    }

    #[test]
    fn test_resource_role_helpers() {
        let ctx = context();

        assert_eq!(ctx.resource_roles("collabhub-api"), ["reader", "writer"]);
        assert!(ctx.resource_roles("unknown-client").is_empty());
        assert!(ctx.has_resource_role("account", "manage-account"));
        assert!(!ctx.has_resource_role("account", "reader"));
        // Realm roles do not leak into client roles
        assert!(!ctx.has_resource_role("collabhub-api", "user"));
    }

    #[test]
    fn test_debug_redacts_subject_and_email() {
        let debug = format!("{:?}", context());

        assert!(!debug.contains("user-42"));
        assert!(!debug.contains("jdoe@example.com"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("project-admin"));
    }

    #[test]
    fn test_serialize_omits_absent_fields() {
        let claims: Claims =
            serde_json::from_value(serde_json::json!({"sub": "svc", "exp": 1})).unwrap();
        let json = serde_json::to_value(AuthContext::from(claims)).unwrap();

        assert_eq!(json["subject"], "svc");
        assert!(json.get("email").is_none());
        assert_eq!(json["roles"], serde_json::json!([]));
    }
}
