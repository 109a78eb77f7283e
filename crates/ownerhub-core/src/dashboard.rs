//! Cache-first dashboard reads.
//!
//! Every read shows whatever is cached for the active franchise first, then
//! revalidates over the network once the snapshot is older than the TTL. A
//! failed revalidation never hides data the owner is already looking at.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::api::DashboardApi;
use crate::cache::CacheManager;
use crate::franchise::FranchiseContext;
use crate::models::DashboardStats;
use crate::outcome::{ErrorKind, Failure, Outcome};
use crate::repository::DashboardRepository;

const FETCH_FAILED: &str = "Failed to fetch dashboard data";

/// Buffer between the observing task and a `follow_stream` consumer.
const STREAM_BUFFER: usize = 16;

/// Run `repo.follow` on a background task and expose it as a `Stream`.
/// The task stops once the stream is dropped.
pub fn follow_stream(
    repo: Arc<dyn DashboardRepository>,
) -> impl Stream<Item = Outcome<DashboardStats>> + Send + 'static {
    let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(async move { repo.follow(tx).await });
    futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
}

pub struct DashboardService {
    api: Arc<dyn DashboardApi>,
    cache: Arc<CacheManager>,
    franchise: FranchiseContext,
}

impl DashboardService {
    pub fn new(api: Arc<dyn DashboardApi>, cache: Arc<CacheManager>, franchise: FranchiseContext) -> Self {
        Self { api, cache, franchise }
    }

    /// Fetch for `franchise_id` and write the result through to the cache.
    ///
    /// If the active franchise changed while the request was in flight the
    /// result is discarded.
    async fn fetch(&self, franchise_id: Option<i32>) -> Result<DashboardStats, Failure> {
        let response = self.api.fetch_dashboard_stats().await.map_err(|e| {
            warn!(error = %e, ?franchise_id, "Dashboard fetch failed");
            Failure::from_api(&e, FETCH_FAILED)
        })?;

        if self.franchise.active_franchise_id() != franchise_id {
            debug!(?franchise_id, "Discarding dashboard fetched for a previous franchise");
            return Err(Failure::new(ErrorKind::Data, "Active franchise changed during fetch")
                .with_message("Franchise changed, please refresh"));
        }

        let stats = response.to_stats(Utc::now().timestamp_millis());
        if let Err(e) = self.cache.save_dashboard_stats(&stats, franchise_id) {
            error!(error = %e, "Failed to write dashboard cache");
        }
        Ok(stats)
    }

    /// One pass of Loading, cache, network for `franchise_id`.
    /// Returns early once the receiver is gone.
    async fn observe_for(&self, franchise_id: Option<i32>, tx: &mpsc::Sender<Outcome<DashboardStats>>) {
        if tx.send(Outcome::Loading).await.is_err() {
            return;
        }

        let cached = self.cache.load_dashboard_stats(franchise_id);
        if let Some(ref record) = cached {
            if tx.send(Outcome::Success(record.data.clone())).await.is_err() {
                return;
            }
            if record.is_fresh() {
                debug!(?franchise_id, "Dashboard cache is fresh");
                return;
            }
        }

        match self.fetch(franchise_id).await {
            Ok(stats) => {
                let _ = tx.send(Outcome::Success(stats)).await;
            }
            Err(failure) if cached.is_none() => {
                let _ = tx.send(Outcome::Error(failure)).await;
            }
            Err(_) => debug!(?franchise_id, "Keeping cached dashboard after failed refresh"),
        }
    }
}

#[async_trait]
impl DashboardRepository for DashboardService {
    async fn observe(&self, tx: &mpsc::Sender<Outcome<DashboardStats>>) {
        self.observe_for(self.franchise.active_franchise_id(), tx).await;
    }

    async fn follow(&self, tx: mpsc::Sender<Outcome<DashboardStats>>) {
        let mut franchise_rx = self.franchise.subscribe();
        loop {
            let franchise_id = franchise_rx.borrow_and_update().as_ref().map(|f| f.id);

            tokio::select! {
                _ = self.observe_for(franchise_id, &tx) => {
                    // Pass done; idle until the franchise changes
                    tokio::select! {
                        changed = franchise_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                        _ = tx.closed() => return,
                    }
                }
                changed = franchise_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!(?franchise_id, "Franchise changed, restarting dashboard observation");
                }
                _ = tx.closed() => return,
            }
        }
    }

    async fn get_dashboard_stats(&self, force_refresh: bool) -> Outcome<DashboardStats> {
        let franchise_id = self.franchise.active_franchise_id();
        let cached = self.cache.load_dashboard_stats(franchise_id);

        if !force_refresh {
            if let Some(ref record) = cached {
                if record.is_fresh() {
                    return Outcome::Success(record.data.clone());
                }
            }
        }

        match self.fetch(franchise_id).await {
            Ok(stats) => Outcome::Success(stats),
            // The cached record belongs to the franchise that was replaced
            Err(failure) if self.franchise.active_franchise_id() != franchise_id => {
                Outcome::Error(failure)
            }
            Err(failure) => match cached {
                Some(record) => {
                    debug!(age = %record.age_display(), "Serving cached dashboard after failed fetch");
                    Outcome::Success(record.data)
                }
                None => Outcome::Error(failure),
            },
        }
    }

    async fn refresh(&self) -> Outcome<DashboardStats> {
        self.get_dashboard_stats(true).await
    }

    async fn clear_cache(&self) {
        if let Err(e) = self.cache.clear() {
            error!(error = %e, "Failed to clear dashboard cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::auth::{CredentialStore, KeySource};
    use crate::cache::CachedData;
    use crate::models::{DashboardStatsResponse, Franchise};
    use chrono::Duration;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    fn response(sales: f64) -> DashboardStatsResponse {
        DashboardStatsResponse {
            sales_mtd: sales,
            cash_balance: 10.0,
            inventory_value: 20.0,
            total_bv: 30.0,
            pending_approvals: 1,
            sales_trend: "up".into(),
            cash_trend: "DOWN".into(),
            inventory_trend: "neutral".into(),
            bv_trend: String::new(),
            approvals_trend: "sideways".into(),
        }
    }

    /// Serves queued results in order.
    #[derive(Default)]
    struct ScriptedApi {
        results: Mutex<VecDeque<Result<DashboardStatsResponse, ApiError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedApi {
        fn with(results: Vec<Result<DashboardStatsResponse, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DashboardApi for ScriptedApi {
        async fn fetch_dashboard_stats(&self) -> Result<DashboardStatsResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::ServerError("no scripted result".into())))
        }
    }

    fn failing() -> Result<DashboardStatsResponse, ApiError> {
        Err(ApiError::Business {
            code: Some("UNAVAILABLE".into()),
            message: "Service unavailable".into(),
            details: None,
        })
    }

    struct Fixture {
        _dir: TempDir,
        cache: Arc<CacheManager>,
        franchise: FranchiseContext,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(&dir.path().join("data"), &KeySource::Key([9u8; 32])).unwrap();
        let franchise = FranchiseContext::new(Arc::new(store));
        franchise.set_active_franchise(Franchise::new(1, "Kisumu", 2)).unwrap();
        let cache = Arc::new(CacheManager::new(dir.path().join("cache")).unwrap());
        Fixture {
            _dir: dir,
            cache,
            franchise,
        }
    }

    impl Fixture {
        fn service(&self, api: Arc<dyn DashboardApi>) -> DashboardService {
            DashboardService::new(api, Arc::clone(&self.cache), self.franchise.clone())
        }

        fn seed(&self, sales: f64, age: Duration) {
            let record = CachedData::new(response(sales).to_stats(0), Some(1)).aged(age);
            self.cache.store_dashboard_stats(&record).unwrap();
        }
    }

    async fn collect_observe(service: &DashboardService) -> Vec<Outcome<DashboardStats>> {
        let (tx, mut rx) = mpsc::channel(16);
        service.observe(&tx).await;
        drop(tx);
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    fn sales(outcome: &Outcome<DashboardStats>) -> Option<f64> {
        outcome.data().map(|s| s.sales_mtd)
    }

    #[tokio::test]
    async fn test_stale_cache_then_network() {
        let fx = fixture();
        fx.seed(1000.0, Duration::milliseconds(301_000));
        let api = ScriptedApi::with(vec![Ok(response(2000.0))]);
        let service = fx.service(api.clone());

        let emitted = collect_observe(&service).await;
        assert_eq!(emitted.len(), 3);
        assert!(emitted[0].is_loading());
        assert_eq!(sales(&emitted[1]), Some(1000.0));
        assert_eq!(sales(&emitted[2]), Some(2000.0));

        let record = fx.cache.load_dashboard_stats(Some(1)).unwrap();
        assert_eq!(record.data.sales_mtd, 2000.0);
        assert!(record.is_fresh());
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let fx = fixture();
        fx.seed(1000.0, Duration::minutes(1));
        let api = ScriptedApi::with(vec![Ok(response(2000.0))]);
        let service = fx.service(api.clone());

        let emitted = collect_observe(&service).await;
        assert_eq!(emitted.len(), 2);
        assert!(emitted[0].is_loading());
        assert_eq!(sales(&emitted[1]), Some(1000.0));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_and_network_failure_ends_quietly() {
        let fx = fixture();
        fx.seed(1000.0, Duration::minutes(10));
        let service = fx.service(ScriptedApi::with(vec![failing()]));

        let emitted = collect_observe(&service).await;
        assert_eq!(emitted.len(), 2);
        assert!(emitted[0].is_loading());
        assert_eq!(sales(&emitted[1]), Some(1000.0));
        assert!(emitted.iter().all(|o| !o.is_error()));
    }

    #[tokio::test]
    async fn test_no_cache_and_network_failure_is_error() {
        let fx = fixture();
        let service = fx.service(ScriptedApi::with(vec![failing()]));

        let emitted = collect_observe(&service).await;
        assert_eq!(emitted.len(), 2);
        let failure = emitted[1].failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::Server);
    }

    #[tokio::test]
    async fn test_trends_are_normalised() {
        let fx = fixture();
        let service = fx.service(ScriptedApi::with(vec![Ok(response(5.0))]));
        let stats = service.get_dashboard_stats(false).await.into_data().unwrap();

        use crate::models::Trend;
        assert_eq!(stats.sales_trend, Trend::Up);
        assert_eq!(stats.cash_trend, Trend::Down);
        assert_eq!(stats.bv_trend, Trend::Neutral);
        assert_eq!(stats.approvals_trend, Trend::Neutral);
        assert!(stats.last_updated > 0);
    }

    #[tokio::test]
    async fn test_get_dashboard_stats_precedence() {
        let fx = fixture();
        fx.seed(1000.0, Duration::minutes(1));
        let api = ScriptedApi::with(vec![failing(), Ok(response(3000.0))]);
        let service = fx.service(api.clone());

        // Fresh cache short-circuits
        assert_eq!(sales(&service.get_dashboard_stats(false).await), Some(1000.0));
        assert_eq!(api.calls(), 0);

        // Forced and failing falls back to the cache
        assert_eq!(sales(&service.get_dashboard_stats(true).await), Some(1000.0));
        assert_eq!(api.calls(), 1);

        // Forced and succeeding writes through
        assert_eq!(sales(&service.refresh().await), Some(3000.0));
        assert_eq!(fx.cache.load_dashboard_stats(Some(1)).unwrap().data.sales_mtd, 3000.0);
    }

    #[tokio::test]
    async fn test_refresh_without_data_is_error() {
        let fx = fixture();
        let service = fx.service(ScriptedApi::with(vec![failing()]));
        let outcome = service.refresh().await;
        assert_eq!(outcome.failure().map(|f| f.display_message()), Some("Service unavailable"));
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let fx = fixture();
        fx.seed(1000.0, Duration::minutes(1));
        let service = fx.service(ScriptedApi::with(vec![]));
        service.clear_cache().await;
        assert!(fx.cache.load_dashboard_stats(Some(1)).is_none());
    }

    #[tokio::test]
    async fn test_cache_of_previous_franchise_is_not_shown() {
        let fx = fixture();
        fx.seed(1000.0, Duration::minutes(1));
        fx.franchise.set_active_franchise(Franchise::new(2, "Eldoret", 1)).unwrap();
        let service = fx.service(ScriptedApi::with(vec![Ok(response(2000.0))]));

        let emitted = collect_observe(&service).await;
        assert_eq!(emitted.len(), 2);
        assert_eq!(sales(&emitted[1]), Some(2000.0));
    }

    /// Answers with `franchise_id * 1000`; calls for franchise 1 block
    /// until released.
    struct FranchiseAwareApi {
        franchise: FranchiseContext,
        started: mpsc::UnboundedSender<Option<i32>>,
        release: Notify,
    }

    #[async_trait]
    impl DashboardApi for FranchiseAwareApi {
        async fn fetch_dashboard_stats(&self) -> Result<DashboardStatsResponse, ApiError> {
            let id = self.franchise.active_franchise_id();
            let _ = self.started.send(id);
            if id == Some(1) {
                self.release.notified().await;
            }
            Ok(response(f64::from(id.unwrap_or(0)) * 1000.0))
        }
    }

    #[tokio::test]
    async fn test_follow_switches_franchise_mid_flight() {
        let fx = fixture();
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let api = Arc::new(FranchiseAwareApi {
            franchise: fx.franchise.clone(),
            started: started_tx,
            release: Notify::new(),
        });
        let service: Arc<dyn DashboardRepository> = Arc::new(fx.service(api.clone()));

        let mut stream = Box::pin(follow_stream(service));
        assert!(stream.next().await.unwrap().is_loading());
        assert_eq!(started_rx.recv().await.unwrap(), Some(1));

        fx.franchise.set_active_franchise(Franchise::new(2, "Eldoret", 1)).unwrap();
        assert!(stream.next().await.unwrap().is_loading());
        assert_eq!(sales(&stream.next().await.unwrap()), Some(2000.0));

        // The superseded request finishing late changes nothing
        api.release.notify_one();
        tokio::task::yield_now().await;
        let record = fx.cache.load_dashboard_stats(Some(2)).unwrap();
        assert_eq!(record.data.sales_mtd, 2000.0);
        assert!(fx.cache.load_dashboard_stats(Some(1)).is_none());
    }

    #[tokio::test]
    async fn test_get_dashboard_stats_drops_result_of_replaced_franchise() {
        let fx = fixture();
        fx.seed(1000.0, Duration::minutes(10));
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let api = Arc::new(FranchiseAwareApi {
            franchise: fx.franchise.clone(),
            started: started_tx,
            release: Notify::new(),
        });
        let service = Arc::new(fx.service(api.clone()));

        let pending = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.get_dashboard_stats(false).await }
        });
        assert_eq!(started_rx.recv().await.unwrap(), Some(1));

        fx.franchise.set_active_franchise(Franchise::new(2, "Eldoret", 1)).unwrap();
        api.release.notify_one();

        let outcome = pending.await.unwrap();
        assert!(outcome.data().is_none());
        assert_eq!(outcome.failure().unwrap().kind, ErrorKind::Data);

        // Franchise 1's record is untouched and franchise 2 has none yet
        assert_eq!(fx.cache.load_dashboard_stats(Some(1)).unwrap().data.sales_mtd, 1000.0);
        assert!(fx.cache.load_dashboard_stats(Some(2)).is_none());
    }

    #[tokio::test]
    async fn test_follow_stops_when_receiver_dropped() {
        let fx = fixture();
        fx.seed(1000.0, Duration::minutes(1));
        let service = fx.service(ScriptedApi::with(vec![]));
        let (tx, mut rx) = mpsc::channel(4);

        let handle = tokio::spawn(async move { service.follow(tx).await });
        assert!(rx.recv().await.unwrap().is_loading());
        assert_eq!(sales(&rx.recv().await.unwrap()), Some(1000.0));
        drop(rx);

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("follow should end")
            .unwrap();
    }
}
