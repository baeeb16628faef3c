//! Tests for `IntegrationFactory`: adapter construction, OAuth URLs and the
//! authorization-code exchange.

use pulseboard_core::{IntegrationConfig, OAuthClientCredentials, PlatformType};
use pulseboard_integrations::{
    generate_oauth_state, IntegrationError, IntegrationFactory, OAuthClients, PlatformEndpoints,
};
use reqwest::Client;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials(id: &str) -> Option<OAuthClientCredentials> {
    Some(OAuthClientCredentials {
        client_id: id.to_owned(),
        client_secret: format!("{id}-secret"),
    })
}

fn clients() -> OAuthClients {
    OAuthClients {
        meta: credentials("meta-app"),
        linkedin: credentials("li-app"),
        google: credentials("google-app"),
        public_url: "https://app.example.com/".to_owned(),
    }
}

fn query_value(url: &reqwest::Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[test]
fn creates_an_adapter_for_each_supported_key() {
    let factory = IntegrationFactory::new(clients(), Client::new());
    let org = Uuid::new_v4();

    for (key, expected) in [
        ("facebook", PlatformType::Facebook),
        ("linkedin", PlatformType::LinkedIn),
        ("google_analytics", PlatformType::GoogleAnalytics),
    ] {
        let integration = factory
            .create_integration(key, org, IntegrationConfig::new("tok"))
            .unwrap_or_else(|e| panic!("{key} should be supported: {e}"));
        assert_eq!(integration.platform_type(), expected);
        assert_eq!(integration.platform_name(), key);
        assert_eq!(integration.organization_id(), org);
        assert_eq!(integration.config().access_token, "tok");
        assert!(!integration.config_changed());
    }
}

#[test]
fn rejects_unsupported_platforms() {
    let factory = IntegrationFactory::new(clients(), Client::new());

    for key in ["twitter", "tiktok", "", "Facebook"] {
        let result = factory.create_integration(key, Uuid::new_v4(), IntegrationConfig::new("t"));
        assert!(
            matches!(result, Err(IntegrationError::UnsupportedPlatform(ref p)) if p == key),
            "{key:?} should be rejected"
        );
    }
}

#[test]
fn platforms_lists_all_three_with_metadata() {
    let platforms = IntegrationFactory::platforms();
    assert_eq!(platforms.len(), 3);
    assert!(platforms.iter().all(|p| !p.name.is_empty() && !p.description.is_empty()));

    let json = serde_json::to_value(&platforms).unwrap();
    assert_eq!(json[0]["type"], "facebook");
    assert_eq!(json[2]["type"], "google_analytics");
}

#[test]
fn google_authorization_url_requests_offline_access() {
    let factory = IntegrationFactory::new(clients(), Client::new());
    let url = factory
        .authorization_url(PlatformType::GoogleAnalytics, "state-123")
        .expect("google is configured");

    assert_eq!(url.host_str(), Some("accounts.google.com"));
    assert_eq!(query_value(&url, "client_id").as_deref(), Some("google-app"));
    assert_eq!(
        query_value(&url, "redirect_uri").as_deref(),
        Some("https://app.example.com/api/v1/oauth/google_analytics/callback")
    );
    assert_eq!(
        query_value(&url, "scope").as_deref(),
        Some("https://www.googleapis.com/auth/analytics.readonly")
    );
    assert_eq!(query_value(&url, "state").as_deref(), Some("state-123"));
    assert_eq!(query_value(&url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_value(&url, "access_type").as_deref(), Some("offline"));
    assert_eq!(query_value(&url, "prompt").as_deref(), Some("consent"));
}

#[test]
fn meta_and_linkedin_authorization_urls_carry_fixed_scopes() {
    let factory = IntegrationFactory::new(clients(), Client::new());

    let meta = factory
        .authorization_url(PlatformType::Facebook, "s")
        .expect("meta is configured");
    assert_eq!(
        query_value(&meta, "scope").as_deref(),
        Some(
            "pages_show_list,pages_read_engagement,read_insights,\
             instagram_basic,instagram_manage_insights"
        )
    );
    assert!(query_value(&meta, "access_type").is_none());

    let linkedin = factory
        .authorization_url(PlatformType::LinkedIn, "s")
        .expect("linkedin is configured");
    assert_eq!(
        query_value(&linkedin, "scope").as_deref(),
        Some("r_organization_social rw_organization_admin r_basicprofile")
    );
}

#[test]
fn authorization_url_requires_client_credentials() {
    let factory = IntegrationFactory::new(
        OAuthClients {
            linkedin: None,
            ..clients()
        },
        Client::new(),
    );
    let err = factory
        .authorization_url(PlatformType::LinkedIn, "s")
        .expect_err("linkedin has no app configured");
    assert!(matches!(
        err,
        IntegrationError::MissingClientCredentials(PlatformType::LinkedIn)
    ));
}

#[tokio::test]
async fn google_code_exchange_posts_authorization_code_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("client_id=google-app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.token",
            "refresh_token": "1//refresh",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/analytics.readonly",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let factory = IntegrationFactory::with_endpoints(
        clients(),
        Client::new(),
        PlatformEndpoints::all_at(&server.uri()),
    );
    let config = factory
        .exchange_code(PlatformType::GoogleAnalytics, "auth-code")
        .await
        .expect("exchange succeeds");

    assert_eq!(config.access_token, "ya29.token");
    assert_eq!(config.refresh_token.as_deref(), Some("1//refresh"));
    assert!(config.expires_at.is_some());
    assert_eq!(
        config.scope,
        Some(vec![
            "https://www.googleapis.com/auth/analytics.readonly".to_owned()
        ])
    );
}

#[tokio::test]
async fn meta_code_exchange_uses_get_and_keeps_token_for_renewal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .and(query_param("code", "fb-code"))
        .and(query_param("client_id", "meta-app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "EAAB",
            "token_type": "bearer",
            "expires_in": 5_183_944
        })))
        .expect(1)
        .mount(&server)
        .await;

    let factory = IntegrationFactory::with_endpoints(
        clients(),
        Client::new(),
        PlatformEndpoints::all_at(&server.uri()),
    );
    let config = factory
        .exchange_code(PlatformType::Facebook, "fb-code")
        .await
        .expect("exchange succeeds");

    assert_eq!(config.access_token, "EAAB");
    assert_eq!(config.refresh_token.as_deref(), Some("EAAB"));
}

#[tokio::test]
async fn rejected_code_is_an_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/v2/accessToken"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_request"
        })))
        .mount(&server)
        .await;

    let factory = IntegrationFactory::with_endpoints(
        clients(),
        Client::new(),
        PlatformEndpoints::all_at(&server.uri()),
    );
    let err = factory
        .exchange_code(PlatformType::LinkedIn, "stale")
        .await
        .expect_err("provider rejected the code");
    assert!(err.is_auth());
}

#[test]
fn oauth_state_is_random_and_url_safe() {
    let a = generate_oauth_state();
    let b = generate_oauth_state();
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(a, b);
}
