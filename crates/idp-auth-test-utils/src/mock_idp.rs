//! Mock identity provider for integration tests.
//!
//! Serves a Keycloak-style realm layout:
//!
//! ```text
//! {uri}/realms/{realm}                                             issuer
//! {uri}/realms/{realm}/protocol/openid-connect/certs               JWKS
//! {uri}/realms/{realm}/protocol/openid-connect/token/introspect    introspection
//! {uri}/realms/{realm}/protocol/openid-connect/userinfo            userinfo
//! ```

use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Realm used by [`MockIdentityProvider::start`].
pub const TEST_REALM: &str = "collabhub";

/// Wrapper around a `wiremock` server publishing a realm's JWKS.
pub struct MockIdentityProvider {
    server: MockServer,
    realm: String,
}

impl MockIdentityProvider {
    /// Start a mock provider for [`TEST_REALM`] with no mocks mounted.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            realm: TEST_REALM.to_string(),
        }
    }

    /// Base URL, suitable for `IDP_BASE_URL`.
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Expected `iss` for tokens of this realm.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server.uri(), self.realm)
    }

    /// Full JWKS endpoint URL.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), self.jwks_path())
    }

    fn jwks_path(&self) -> String {
        self.endpoint_path("certs")
    }

    /// Publish `keys` as the realm's JWKS.
    pub async fn serve_keys(&self, keys: &[serde_json::Value]) {
        self.mount_jwks(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys })),
            None,
        )
        .await;
    }

    /// Publish `keys` and fail the test on drop unless the endpoint was hit
    /// exactly `times` times.
    pub async fn serve_keys_expecting(&self, keys: &[serde_json::Value], times: u64) {
        self.mount_jwks(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys })),
            Some(times),
        )
        .await;
    }

    /// Publish `keys` after an artificial delay.
    pub async fn serve_keys_with_delay(&self, keys: &[serde_json::Value], delay: Duration) {
        self.mount_jwks(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "keys": keys }))
                .set_delay(delay),
            None,
        )
        .await;
    }

    /// Answer JWKS requests with an error status.
    pub async fn fail_with_status(&self, status: u16) {
        self.mount_jwks(ResponseTemplate::new(status), None).await;
    }

    /// Answer JWKS requests with an error status after an artificial delay.
    pub async fn fail_with_status_after(&self, status: u16, delay: Duration) {
        self.mount_jwks(ResponseTemplate::new(status).set_delay(delay), None)
            .await;
    }

    /// Answer introspection of `token` with `{"active": active}`.
    pub async fn serve_introspection(&self, token: &str, active: bool) {
        Mock::given(method("POST"))
            .and(path(self.endpoint_path("token/introspect")))
            .and(body_string_contains(format!("token={token}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "active": active })),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer userinfo requests bearing `token` with `profile`; any other
    /// bearer gets 401.
    pub async fn serve_userinfo(&self, token: &str, profile: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(self.endpoint_path("userinfo")))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile))
            .with_priority(1)
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(self.endpoint_path("userinfo")))
            .respond_with(ResponseTemplate::new(401))
            .with_priority(2)
            .mount(&self.server)
            .await;
    }

    fn endpoint_path(&self, endpoint: &str) -> String {
        format!("/realms/{}/protocol/openid-connect/{}", self.realm, endpoint)
    }

    /// Remove all mounted responses; later requests get 404.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of JWKS requests received so far.
    pub async fn jwks_request_count(&self) -> usize {
        let jwks_path = self.jwks_path();
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == jwks_path)
            .count()
    }

    async fn mount_jwks(&self, response: ResponseTemplate, times: Option<u64>) {
        let mut mock = Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(response);
        if let Some(times) = times {
            mock = mock.expect(times);
        }
        mock.mount(&self.server).await;
    }
}
