//! HTTP transport with the auth pipeline.
//!
//! Every outbound call goes through `HttpTransport::execute`, which
//!
//! - attaches `Authorization: Bearer <token>` to non-public endpoints,
//! - attaches the app version, platform and active franchise headers,
//! - recovers from 401 responses by refreshing the access token and
//!   reissuing the request, at most `MAX_RETRY_COUNT` times per call.
//!
//! Token refresh is single-flight: concurrent 401s queue on one async lock,
//! and a caller that finds the token already replaced by the holder before it
//! reuses that token instead of refreshing again. The refresh itself goes
//! through a separate client that never enters this pipeline.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::envelope::ApiEnvelope;
use super::ApiError;
use crate::auth::CredentialStore;
use crate::config::Config;
use crate::franchise::FranchiseContext;
use crate::models::{RefreshRequest, TokenResponse};

/// Path of the token refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "api/auth/mobile-refresh.php";

/// Endpoints reachable without a session. Matched by substring so that
/// both `/api/auth/mobile-login.php` and `/api/auth/owner-mobile-login.php`
/// are covered.
const PUBLIC_ENDPOINTS: &[&str] = &[
    "mobile-login",
    "mobile-refresh",
    "register",
    "forgot-password",
    "reset-password",
];

/// Maximum number of refresh-and-retry hops for one call.
const MAX_RETRY_COUNT: u32 = 3;

const HEADER_FRANCHISE_ID: &str = "x-franchise-id";
const HEADER_APP_VERSION: &str = "x-app-version";
const HEADER_PLATFORM: &str = "x-platform";

/// Hook applied to every `reqwest::ClientBuilder` the transport creates,
/// for certificate pinning, custom roots or other TLS settings.
pub type TlsCustomizer = Arc<dyn Fn(ClientBuilder) -> ClientBuilder + Send + Sync>;

#[derive(Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub app_version: String,
    pub platform: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// `Host` header for reaching a virtual host through a bare IP.
    pub host_override: Option<String>,
    pub tls_customizer: Option<TlsCustomizer>,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: "rust".to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            host_override: None,
            tls_customizer: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            app_version: config.app_version.clone(),
            platform: config.platform.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            host_override: config.host_override.clone(),
            tls_customizer: None,
        }
    }

    pub fn with_tls_customizer(
        mut self,
        customizer: impl Fn(ClientBuilder) -> ClientBuilder + Send + Sync + 'static,
    ) -> Self {
        self.tls_customizer = Some(Arc::new(customizer));
        self
    }

    fn build_client(&self) -> Result<Client, ApiError> {
        let mut builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout);
        if let Some(ref customize) = self.tls_customizer {
            builder = customize(builder);
        }
        Ok(builder.build()?)
    }
}

/// A request description that can be replayed after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// True for endpoints that must never carry a bearer token.
pub fn is_public_endpoint(path: &str) -> bool {
    PUBLIC_ENDPOINTS.iter().any(|p| path.contains(p))
}

pub struct HttpTransport {
    client: Client,
    refresh_client: Client,
    config: TransportConfig,
    credentials: Arc<CredentialStore>,
    franchise: FranchiseContext,
    refresh_lock: Mutex<()>,
}

impl HttpTransport {
    pub fn new(
        config: TransportConfig,
        credentials: Arc<CredentialStore>,
        franchise: FranchiseContext,
    ) -> Result<Self, ApiError> {
        let client = config.build_client()?;
        let refresh_client = config.build_client()?;
        Ok(Self {
            client,
            refresh_client,
            config,
            credentials,
            franchise,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn franchise(&self) -> &FranchiseContext {
        &self.franchise
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                headers.insert(HeaderName::from_static(name), v);
            }
            Err(_) => warn!(header = name, "Skipping header with invalid value"),
        }
    }

    /// Headers sent with every request, public or not.
    fn context_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        Self::insert_header(&mut headers, HEADER_APP_VERSION, &self.config.app_version);
        Self::insert_header(&mut headers, HEADER_PLATFORM, &self.config.platform);
        if let Some(id) = self.franchise.active_franchise_id_header() {
            Self::insert_header(&mut headers, HEADER_FRANCHISE_ID, &id);
        }
        if let Some(ref host) = self.config.host_override {
            if let Ok(v) = HeaderValue::from_str(host) {
                headers.insert(header::HOST, v);
            }
        }
        headers
    }

    fn stored_access_token(&self) -> Option<String> {
        self.credentials
            .access_token()
            .filter(|t| !t.trim().is_empty())
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        attempt: u32,
    ) -> Result<Response, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .headers(self.context_headers());
        if let Some(token) = token {
            builder = builder
                .bearer_auth(token)
                .header(header::ACCEPT, "application/json");
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            attempt,
            authorized = token.is_some(),
            "Sending request"
        );
        let response = builder.send().await?;
        debug!(path = %request.path, status = %response.status(), attempt, "Response received");
        Ok(response)
    }

    /// Send a request through the auth pipeline.
    ///
    /// Returns the first non-401 response. A 401 that cannot be recovered
    /// (no refresh token, refresh rejected, or retries exhausted) clears the
    /// stored tokens and yields `ApiError::SessionExpired`.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let public = is_public_endpoint(&request.path);
        let mut token = if public {
            None
        } else {
            self.stored_access_token()
        };
        let mut retry_count = 0;

        loop {
            let response = self.send_once(request, token.as_deref(), retry_count).await?;
            if response.status() != StatusCode::UNAUTHORIZED || public {
                return Ok(response);
            }

            match self.authenticate(retry_count, token.as_deref()).await {
                Some(new_token) => {
                    token = Some(new_token);
                    retry_count += 1;
                }
                None => return Err(ApiError::SessionExpired),
            }
        }
    }

    /// Decide how to answer a 401. Returns the token to retry with, or
    /// `None` to give up (tokens are cleared in that case).
    async fn authenticate(&self, prior_retries: u32, failed_token: Option<&str>) -> Option<String> {
        if prior_retries >= MAX_RETRY_COUNT {
            warn!(retries = prior_retries, "Max retry count reached for token refresh");
            self.clear_tokens();
            return None;
        }

        let _guard = self.refresh_lock.lock().await;

        // Someone else refreshed while we were waiting for the lock
        if let Some(current) = self.stored_access_token() {
            if failed_token != Some(current.as_str()) {
                debug!("Access token already refreshed, reusing it");
                return Some(current);
            }
        }

        let Some(refresh_token) = self
            .credentials
            .refresh_token()
            .filter(|t| !t.trim().is_empty())
        else {
            warn!("No refresh token available, forcing re-login");
            self.clear_tokens();
            return None;
        };

        match self.refresh_access_token(&refresh_token).await {
            Ok(new_token) => {
                if let Err(e) = self.credentials.save_access_token(&new_token) {
                    error!(error = %e, "Failed to persist refreshed access token");
                }
                debug!("Token refreshed successfully");
                Some(new_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, forcing re-login");
                self.clear_tokens();
                None
            }
        }
    }

    fn clear_tokens(&self) {
        if let Err(e) = self.credentials.clear_tokens() {
            error!(error = %e, "Failed to clear tokens");
        }
    }

    /// Exchange a refresh token for a new access token using the bare
    /// refresh client (no auth headers, no 401 handling).
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        let response = self
            .refresh_client
            .post(self.url(REFRESH_PATH))
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let body = response.text().await?;
        let envelope: ApiEnvelope<TokenResponse> = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e)))?;
        let data = envelope.into_data("Token refresh failed")?;
        data.token()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("Refresh response has no access token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_public_endpoint() {
        assert!(is_public_endpoint("api/auth/owner-mobile-login.php"));
        assert!(is_public_endpoint("/api/auth/mobile-refresh.php"));
        assert!(is_public_endpoint("api/auth/register"));
        assert!(is_public_endpoint("api/auth/forgot-password"));
        assert!(is_public_endpoint("api/auth/reset-password"));

        assert!(!is_public_endpoint("api/owners/dashboard-stats.php"));
        assert!(!is_public_endpoint("api/auth/mobile-logout.php"));
    }

    #[test]
    fn test_request_body_encoding() {
        let req = ApiRequest::post("api/x")
            .json(&RefreshRequest { refresh_token: "r" })
            .unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.body.unwrap()["refresh_token"], "r");
    }

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::new("https://api.example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.tls_customizer.is_none());
        let custom = config.with_tls_customizer(|b| b.https_only(true));
        assert!(custom.tls_customizer.is_some());
    }
}
