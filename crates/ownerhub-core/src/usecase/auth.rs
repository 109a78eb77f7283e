use std::sync::Arc;

use tracing::{debug, warn};

use crate::franchise::FranchiseContext;
use crate::models::User;
use crate::outcome::{ErrorKind, Failure, Outcome};
use crate::repository::{AuthRepository, DashboardRepository};

/// Cause recorded when login succeeded but no user was cached afterwards.
pub const INCOMPLETE_LOGIN: &str = "IncompleteLogin";

pub struct LoginUseCase {
    auth: Arc<dyn AuthRepository>,
}

impl LoginUseCase {
    pub fn new(auth: Arc<dyn AuthRepository>) -> Self {
        Self { auth }
    }

    /// Validate locally, log in, then confirm the session holds a user.
    pub async fn execute(&self, identifier: &str, password: &str) -> Outcome<User> {
        if identifier.trim().is_empty() {
            return Outcome::Error(Failure::validation(
                "Identifier is blank",
                "Please enter your username or email",
            ));
        }
        if password.trim().is_empty() {
            return Outcome::Error(Failure::validation(
                "Password is blank",
                "Please enter your password",
            ));
        }

        match self.auth.login(identifier.trim(), password).await {
            Outcome::Success(_) => match self.auth.current_user().await {
                Some(user) => Outcome::Success(user),
                None => Outcome::Error(
                    Failure::new(ErrorKind::Data, INCOMPLETE_LOGIN)
                        .with_message("Login succeeded but user information is missing"),
                ),
            },
            Outcome::Error(failure) => Outcome::Error(failure),
            Outcome::Loading => Outcome::Loading,
        }
    }
}

/// Ends the session and wipes everything tied to the previous owner.
pub struct LogoutUseCase {
    auth: Arc<dyn AuthRepository>,
    dashboard: Arc<dyn DashboardRepository>,
    franchise: FranchiseContext,
}

impl LogoutUseCase {
    pub fn new(
        auth: Arc<dyn AuthRepository>,
        dashboard: Arc<dyn DashboardRepository>,
        franchise: FranchiseContext,
    ) -> Self {
        Self {
            auth,
            dashboard,
            franchise,
        }
    }

    pub async fn execute(&self) -> Outcome<()> {
        let outcome = self.auth.logout().await;

        if let Err(e) = self.franchise.clear_all() {
            warn!(error = %e, "Failed to clear franchise selection on logout");
        }
        self.dashboard.clear_cache().await;
        debug!("Local owner data cleared");

        outcome
    }
}

pub struct GetCurrentUserUseCase {
    auth: Arc<dyn AuthRepository>,
}

impl GetCurrentUserUseCase {
    pub fn new(auth: Arc<dyn AuthRepository>) -> Self {
        Self { auth }
    }

    pub async fn execute(&self) -> Option<User> {
        self.auth.current_user().await
    }
}
