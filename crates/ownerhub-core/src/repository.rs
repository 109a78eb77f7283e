//! Service seams consumed by the use-case layer.
//!
//! `AuthService` and `DashboardService` are the production implementations;
//! use-cases hold `Arc<dyn ...>` so they can be exercised with test doubles.

use async_trait::async_trait;

use crate::models::{DashboardStats, Franchise, LoginSummary, User};
use crate::outcome::Outcome;

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn login(&self, identifier: &str, password: &str) -> Outcome<LoginSummary>;

    /// Always succeeds locally, even when the server cannot be reached.
    async fn logout(&self) -> Outcome<()>;

    /// Both tokens are stored. Expiry is not checked.
    async fn is_logged_in(&self) -> bool;

    async fn refresh_token(&self) -> Outcome<String>;

    async fn current_user(&self) -> Option<User>;

    async fn user_franchises(&self) -> Vec<Franchise>;
}

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// Run the cache-first read once, sending every state to `tx`.
    async fn observe(&self, tx: &tokio::sync::mpsc::Sender<Outcome<DashboardStats>>);

    /// Keep observing, restarting whenever the active franchise changes,
    /// until the receiving side of `tx` is dropped.
    async fn follow(&self, tx: tokio::sync::mpsc::Sender<Outcome<DashboardStats>>);

    async fn get_dashboard_stats(&self, force_refresh: bool) -> Outcome<DashboardStats>;

    async fn refresh(&self) -> Outcome<DashboardStats>;

    async fn clear_cache(&self);
}
