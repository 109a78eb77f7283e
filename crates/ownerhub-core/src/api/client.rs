//! API client for the owner hub backend.
//!
//! `ApiClient` maps each endpoint onto a request sent through the
//! `HttpTransport`, then unwraps the response envelope. The `AuthApi` and
//! `DashboardApi` traits are the seams the services depend on.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::envelope::ApiEnvelope;
use super::transport::{ApiRequest, HttpTransport, REFRESH_PATH};
use super::ApiError;
use crate::models::{DashboardStatsResponse, LoginRequest, LoginResponse, RefreshRequest, TokenResponse};

// ============================================================================
// Endpoints
// ============================================================================

const LOGIN_PATH: &str = "api/auth/owner-mobile-login.php";
const LOGOUT_PATH: &str = "api/auth/mobile-logout.php";
const DASHBOARD_STATS_PATH: &str = "api/owners/dashboard-stats.php";

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// Returns the new access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<String, ApiError>;

    async fn logout(&self, refresh_token: &str) -> Result<(), ApiError>;
}

#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Stats for the franchise currently sent in `X-Franchise-ID`.
    async fn fetch_dashboard_stats(&self) -> Result<DashboardStatsResponse, ApiError>;
}

/// API client for the owner hub.
/// Clone is cheap - the transport is shared behind an `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<HttpTransport>,
}

impl ApiClient {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    /// Read the body and unwrap the envelope.
    ///
    /// The envelope's `success` flag decides the outcome whenever the body
    /// parses, whatever the status code; otherwise the status is mapped.
    async fn read_envelope<T: DeserializeOwned>(
        response: Response,
        fallback: &str,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<ApiEnvelope<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(e) if status.is_success() => Err(ApiError::InvalidResponse(format!(
                "{}: failed to parse response: {}",
                fallback, e
            ))),
            Err(_) => Err(ApiError::from_status(status, &body)),
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest, fallback: &str) -> Result<T, ApiError> {
        let response = self.transport.execute(&request).await?;
        Self::read_envelope(response, fallback).await?.into_data(fallback)
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest { identifier, password })?;
        self.call(request, "Login failed").await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        let request = ApiRequest::post(REFRESH_PATH).json(&RefreshRequest { refresh_token })?;
        let data: TokenResponse = self.call(request, "Token refresh failed").await?;
        data.token()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("Refresh response has no access token".into()))
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let request = ApiRequest::delete(LOGOUT_PATH).json(&RefreshRequest { refresh_token })?;
        let response = self.transport.execute(&request).await?;
        let envelope: ApiEnvelope<serde_json::Value> =
            Self::read_envelope(response, "Logout failed").await?;
        debug!("Remote logout acknowledged");
        envelope.into_ack("Logout failed")
    }
}

#[async_trait]
impl DashboardApi for ApiClient {
    async fn fetch_dashboard_stats(&self) -> Result<DashboardStatsResponse, ApiError> {
        self.call(ApiRequest::get(DASHBOARD_STATS_PATH), "Failed to fetch dashboard data")
            .await
    }
}
