use std::sync::Arc;

use chrono::Utc;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::cache::CACHE_TTL_MILLIS;
use crate::dashboard::follow_stream;
use crate::models::DashboardStats;
use crate::outcome::Outcome;
use crate::repository::DashboardRepository;

pub struct ObserveDashboardUseCase {
    dashboard: Arc<dyn DashboardRepository>,
}

impl ObserveDashboardUseCase {
    pub fn new(dashboard: Arc<dyn DashboardRepository>) -> Self {
        Self { dashboard }
    }

    /// A single cache-then-network pass for the active franchise.
    pub async fn once(&self, tx: &mpsc::Sender<Outcome<DashboardStats>>) {
        self.dashboard.observe(tx).await;
    }

    /// Follows franchise changes until the returned stream is dropped.
    pub fn stream(&self) -> impl Stream<Item = Outcome<DashboardStats>> + Send + 'static {
        follow_stream(Arc::clone(&self.dashboard))
    }
}

pub struct RefreshDashboardUseCase {
    dashboard: Arc<dyn DashboardRepository>,
}

impl RefreshDashboardUseCase {
    pub fn new(dashboard: Arc<dyn DashboardRepository>) -> Self {
        Self { dashboard }
    }

    pub async fn execute(&self) -> Outcome<DashboardStats> {
        self.dashboard.refresh().await
    }
}

/// What a dashboard screen shows, folded from emitted outcomes.
///
/// Once data is held it is never replaced by an error; a failed refresh
/// only marks it stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardViewState {
    pub stats: Option<DashboardStats>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub is_stale: bool,
    pub error: Option<String>,
    /// Epoch milliseconds of the data shown.
    pub last_updated: Option<i64>,
}

impl DashboardViewState {
    pub fn has_data(&self) -> bool {
        self.stats.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some() && !self.has_data()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data() && !self.is_loading && self.error.is_none()
    }

    pub fn apply(&mut self, outcome: Outcome<DashboardStats>) {
        self.apply_at(outcome, Utc::now().timestamp_millis());
    }

    pub fn apply_at(&mut self, outcome: Outcome<DashboardStats>, now_millis: i64) {
        match outcome {
            Outcome::Loading => {
                // The spinner is only for an empty screen
                if self.stats.is_none() {
                    self.is_loading = true;
                    self.error = None;
                }
            }
            Outcome::Success(stats) => {
                self.is_stale = now_millis - stats.last_updated >= CACHE_TTL_MILLIS;
                self.last_updated = Some(stats.last_updated);
                self.stats = Some(stats);
                self.is_loading = false;
                self.is_refreshing = false;
                self.error = None;
            }
            Outcome::Error(failure) => {
                self.is_loading = false;
                self.is_refreshing = false;
                if self.stats.is_none() {
                    self.error = Some(failure.display_message().to_string());
                } else {
                    self.is_stale = true;
                }
            }
        }
    }

    pub fn begin_refresh(&mut self) {
        self.is_refreshing = true;
        self.error = None;
    }

    /// Fold the result of an explicit refresh.
    pub fn finish_refresh(&mut self, outcome: Outcome<DashboardStats>) {
        self.finish_refresh_at(outcome, Utc::now().timestamp_millis());
    }

    pub fn finish_refresh_at(&mut self, outcome: Outcome<DashboardStats>, now_millis: i64) {
        match outcome {
            Outcome::Loading => self.is_refreshing = true,
            other => self.apply_at(other, now_millis),
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}
