use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, RETRY_AFTER},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// API key auth settings used by middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<Vec<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `PULSEBOARD_API_KEYS` (comma-separated bearer tokens).
    ///
    /// In development, empty/missing keys disable auth for local iteration.
    /// In non-development envs, empty/missing keys fail startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("PULSEBOARD_API_KEYS").unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut keys: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        keys.sort();
        keys.dedup();

        if keys.is_empty() {
            if is_development {
                tracing::warn!(
                    "PULSEBOARD_API_KEYS not set; bearer auth disabled in development environment"
                );
                return Ok(Self::disabled());
            }

            anyhow::bail!(
                "PULSEBOARD_API_KEYS is required outside development; provide comma-separated bearer tokens"
            );
        }

        Ok(Self {
            api_keys: Arc::new(keys),
            enabled: true,
        })
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            api_keys: Arc::new(Vec::new()),
            enabled: false,
        }
    }

    /// Compares against every key in constant time.
    fn allows(&self, token: &str) -> bool {
        self.api_keys
            .iter()
            .fold(false, |found, key| {
                found | bool::from(key.as_bytes().ct_eq(token.as_bytes()))
            })
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    started_at: Instant,
    count: u32,
}

/// Fixed-window request limiter with one window per tenant.
///
/// Tenants are identified by the `organizations/{id}` path segment; other
/// routes share the [`SHARED_BUCKET`].
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: u32,
    window: Duration,
    buckets: Arc<Mutex<HashMap<String, RateLimitWindow>>>,
}

const SHARED_BUCKET: &str = "shared";

/// Expired windows are swept once this many tenants are tracked.
const SWEEP_THRESHOLD: usize = 1024;

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Counts one request against `tenant`. On rejection returns how long
    /// until its window resets.
    async fn acquire(&self, tenant: &str) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        if buckets.len() >= SWEEP_THRESHOLD {
            buckets.retain(|_, w| now.duration_since(w.started_at) < self.window);
        }

        let window = buckets.entry(tenant.to_owned()).or_insert(RateLimitWindow {
            started_at: now,
            count: 0,
        });
        let elapsed = now.duration_since(window.started_at);
        if elapsed >= self.window {
            *window = RateLimitWindow {
                started_at: now,
                count: 0,
            };
        }

        if window.count >= self.max_requests {
            return Err(self.window.saturating_sub(elapsed));
        }
        window.count += 1;
        Ok(())
    }
}

/// Organization id taken from an `/api/v1/organizations/{id}/...` path.
fn tenant_key(path: &str) -> Option<&str> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment == "organizations" {
            return segments.next();
        }
    }
    None
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: String,
}

fn middleware_error(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(MiddlewareErrorBody {
            error: MiddlewareError { code, message },
        }),
    )
        .into_response()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing Bearer token auth when enabled.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    let token = extract_bearer_token(req.headers().get(AUTHORIZATION));

    match token {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => {
            tracing::debug!(path = %req.uri().path(), "rejected request without a valid API key");
            middleware_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid API key; send `Authorization: Bearer <key>`".to_owned(),
            )
        }
    }
}

/// Middleware enforcing the per-organization request limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let tenant = tenant_key(req.uri().path()).unwrap_or(SHARED_BUCKET);

    if let Err(retry_after) = rate_limit.acquire(tenant).await {
        let secs = retry_after.as_secs().max(1);
        tracing::warn!(tenant, retry_after_secs = secs, "API rate limit exceeded");
        let message = if tenant == SHARED_BUCKET {
            format!("rate limit of {} requests per window exceeded", rate_limit.max_requests)
        } else {
            format!(
                "rate limit of {} requests per window exceeded for organization {tenant}",
                rate_limit.max_requests
            )
        };
        let mut res = middleware_error(StatusCode::TOO_MANY_REQUESTS, "rate_limited", message);
        res.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        return res;
    }

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
    }

    #[test]
    fn tenant_key_reads_organization_segment() {
        let org = "0b7e9c1a-5d2f-4c3e-9a8b-1f2e3d4c5b6a";
        assert_eq!(
            tenant_key(&format!("/api/v1/organizations/{org}/data-streams")),
            Some(org)
        );
        assert_eq!(tenant_key(&format!("/api/v1/organizations/{org}")), Some(org));
        assert_eq!(tenant_key("/api/v1/platforms"), None);
        assert_eq!(tenant_key("/api/v1/organizations"), None);
    }

    #[tokio::test]
    async fn rate_limit_is_counted_per_tenant() {
        let limiter = RateLimitState::new(2, Duration::from_secs(60));

        assert!(limiter.acquire("org-a").await.is_ok());
        assert!(limiter.acquire("org-a").await.is_ok());
        let retry_after = limiter.acquire("org-a").await.expect_err("third call is limited");
        assert!(retry_after <= Duration::from_secs(60));

        assert!(limiter.acquire("org-b").await.is_ok());
        assert!(limiter.acquire(SHARED_BUCKET).await.is_ok());
    }

    #[tokio::test]
    async fn rate_limit_window_resets() {
        let limiter = RateLimitState::new(1, Duration::from_millis(20));

        assert!(limiter.acquire("org-a").await.is_ok());
        assert!(limiter.acquire("org-a").await.is_err());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.acquire("org-a").await.is_ok());
    }

    #[tokio::test]
    async fn limited_request_gets_429_with_retry_after() {
        use axum::{body::Body, http::Request as HttpRequest, routing::get, Router};
        use tower::ServiceExt;

        let app = Router::new()
            .route("/api/v1/organizations/{org}/data-streams", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                RateLimitState::per_minute(1),
                enforce_rate_limit,
            ));
        let request = || {
            HttpRequest::builder()
                .uri("/api/v1/organizations/acme/data-streams")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = second.headers()[RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
    }

    #[test]
    fn auth_state_disables_when_no_keys_in_dev() {
        let state = AuthState::from_keys(" , ", true).expect("dev should allow missing keys");
        assert!(!state.enabled);
    }

    #[test]
    fn auth_state_requires_keys_outside_dev() {
        assert!(AuthState::from_keys("", false).is_err());
    }

    #[test]
    fn auth_state_accepts_only_listed_keys() {
        let state = AuthState::from_keys("alpha, beta", false).expect("keys present");
        assert!(state.enabled);
        assert!(state.allows("alpha"));
        assert!(state.allows("beta"));
        assert!(!state.allows("alph"));
        assert!(!state.allows("gamma"));
    }
}
