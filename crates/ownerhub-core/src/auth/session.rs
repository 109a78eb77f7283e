//! Login, logout and the in-memory session.
//!
//! Only the two tokens are durable (in the credential store). The user and
//! franchise list returned by login are cached in memory here and are gone
//! after a restart until the owner logs in again.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::CredentialStore;
use crate::api::{ApiError, AuthApi};
use crate::franchise::FranchiseContext;
use crate::models::{Franchise, LoginSummary, User};
use crate::outcome::{ErrorKind, Failure, Outcome};
use crate::repository::AuthRepository;

/// The pair of tokens that make up a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default)]
struct SessionCache {
    user: Option<User>,
    franchises: Vec<Franchise>,
}

pub struct AuthService {
    api: Arc<dyn AuthApi>,
    credentials: Arc<CredentialStore>,
    franchise: FranchiseContext,
    cache: RwLock<SessionCache>,
}

impl AuthService {
    pub fn new(
        api: Arc<dyn AuthApi>,
        credentials: Arc<CredentialStore>,
        franchise: FranchiseContext,
    ) -> Self {
        Self {
            api,
            credentials,
            franchise,
            cache: RwLock::new(SessionCache::default()),
        }
    }

    fn storage_failure(e: anyhow::Error, message: &str) -> Failure {
        Failure::new(ErrorKind::Data, format!("{:#}", e)).with_message(message)
    }
}

#[async_trait]
impl AuthRepository for AuthService {
    async fn login(&self, identifier: &str, password: &str) -> Outcome<LoginSummary> {
        let response = match self.api.login(identifier, password).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login failed");
                let mut failure = Failure::from_api(&e, "Login failed");
                if matches!(e, ApiError::Business { .. } | ApiError::Unauthorized) {
                    failure.kind = ErrorKind::Authentication;
                }
                return Outcome::Error(failure);
            }
        };

        if let Err(e) = self
            .credentials
            .save_tokens(&response.access_token, &response.refresh_token)
        {
            error!(error = %e, "Failed to store tokens after login");
            return Outcome::Error(Self::storage_failure(e, "Login failed: could not save session"));
        }

        // Kept on disk so the owner can switch franchises offline
        if let Err(e) = self.franchise.save_all_franchises(&response.franchises) {
            warn!(error = %e, "Failed to cache franchise list");
        }

        {
            let mut cache = self.cache.write().await;
            cache.user = Some(response.user.clone());
            cache.franchises = response.franchises.clone();
        }

        info!(
            user_id = response.user.id,
            franchises = response.franchises.len(),
            "Logged in"
        );

        Outcome::Success(LoginSummary {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user_id: response.user.id.to_string(),
            user_name: response.user.name,
            user_email: response.user.email,
        })
    }

    async fn logout(&self) -> Outcome<()> {
        if let Some(refresh_token) = self.credentials.refresh_token() {
            // Continue with the local logout even if the server is unreachable
            if let Err(e) = self.api.logout(&refresh_token).await {
                debug!(error = %e, "Remote logout failed, continuing");
            }
        }

        {
            let mut cache = self.cache.write().await;
            *cache = SessionCache::default();
        }

        if let Err(e) = self.credentials.clear_tokens() {
            error!(error = %e, "Failed to clear tokens on logout");
            return Outcome::Error(Self::storage_failure(e, "Logout failed: could not clear session"));
        }

        info!("Logged out");
        Outcome::Success(())
    }

    async fn is_logged_in(&self) -> bool {
        self.credentials.has_valid_session()
    }

    async fn refresh_token(&self) -> Outcome<String> {
        let Some(refresh_token) = self.credentials.refresh_token() else {
            return Outcome::Error(
                Failure::new(ErrorKind::Authentication, "No refresh token available")
                    .with_message("Please login again"),
            );
        };

        match self.api.refresh_token(&refresh_token).await {
            Ok(access_token) => {
                if let Err(e) = self.credentials.save_access_token(&access_token) {
                    error!(error = %e, "Failed to store refreshed access token");
                    return Outcome::Error(Self::storage_failure(e, "Token refresh failed"));
                }
                debug!("Access token refreshed on demand");
                Outcome::Success(access_token)
            }
            Err(e) => {
                warn!(error = %e, "On-demand token refresh failed");
                let rejected = matches!(
                    e,
                    ApiError::Business { .. } | ApiError::Unauthorized | ApiError::AccessDenied(_)
                );
                if rejected {
                    // A rejected refresh token can never succeed again
                    if let Err(e) = self.credentials.clear_tokens() {
                        error!(error = %e, "Failed to clear tokens");
                    }
                }
                let mut failure = Failure::from_api(&e, "Token refresh failed");
                if rejected {
                    failure.kind = ErrorKind::Authentication;
                }
                Outcome::Error(failure)
            }
        }
    }

    async fn current_user(&self) -> Option<User> {
        self.cache.read().await.user.clone()
    }

    async fn user_franchises(&self) -> Vec<Franchise> {
        self.cache.read().await.franchises.clone()
    }
}
