//! End-to-end owner flows: login, franchise selection, dashboard, logout.

mod common;

use common::*;
use futures::StreamExt;
use ownerhub_core::models::Trend;
use ownerhub_core::usecase::DashboardViewState;
use ownerhub_core::{AuthRepository, DashboardRepository};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_login(h: &Harness) {
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(body_json(json!({ "email": "amina@example.com", "password": "secret" })))
        .respond_with(ok(login_data()))
        .mount(&h.server)
        .await;
}

#[tokio::test]
async fn test_login_select_and_load_dashboard() {
    let h = harness().await;
    mount_login(&h).await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD_PATH))
        .and(header("x-franchise-id", "2"))
        .respond_with(ok(stats_data(4200.0)))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h
        .hub
        .login()
        .execute("amina@example.com", "secret")
        .await
        .into_data()
        .unwrap();
    assert_eq!(user.id, 12);
    assert!(h.hub.auth.is_logged_in().await);

    let select = h.hub.select_franchise();
    assert_eq!(select.available().len(), 2);
    assert_eq!(select.execute(2).into_data().unwrap().branch_count, 1);

    let (tx, mut rx) = mpsc::channel(8);
    h.hub.observe_dashboard().once(&tx).await;
    drop(tx);

    let mut view = DashboardViewState::default();
    let mut emitted = 0;
    while let Some(outcome) = rx.recv().await {
        view.apply(outcome);
        emitted += 1;
    }
    assert_eq!(emitted, 2);

    let stats = view.stats.unwrap();
    assert_eq!(stats.sales_mtd, 4200.0);
    assert_eq!(stats.cash_trend, Trend::Down);
    assert_eq!(stats.bv_trend, Trend::Up);
    assert!(!view.is_stale);

    // Second read is served from the fresh cache (mock expects one call)
    let again = h.hub.dashboard.get_dashboard_stats(false).await;
    assert_eq!(again.data().map(|s| s.sales_mtd), Some(4200.0));
}

#[tokio::test]
async fn test_refresh_keeps_cached_data_when_offline() {
    let h = harness().await;
    h.hub.credentials.save_tokens("access-1", "refresh-1").unwrap();

    Mock::given(method("GET"))
        .and(path(DASHBOARD_PATH))
        .respond_with(ok(stats_data(1000.0)))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&h.server)
        .await;

    let first = h.hub.refresh_dashboard().execute().await;
    assert_eq!(first.data().map(|s| s.sales_mtd), Some(1000.0));

    let second = h.hub.refresh_dashboard().execute().await;
    assert!(second.is_success());
    assert_eq!(second.data().map(|s| s.sales_mtd), Some(1000.0));
}

#[tokio::test]
async fn test_logout_clears_everything_even_when_server_fails() {
    let h = harness().await;
    mount_login(&h).await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD_PATH))
        .respond_with(ok(stats_data(1.0)))
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(LOGOUT_PATH))
        .and(body_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    h.hub.login().execute("amina@example.com", "secret").await;
    h.hub.select_franchise().execute(1);
    h.hub.refresh_dashboard().execute().await;

    assert!(h.hub.logout().execute().await.is_success());

    assert!(!h.hub.auth.is_logged_in().await);
    assert!(h.hub.current_user().execute().await.is_none());
    assert!(!h.hub.franchise.has_active_franchise());
    assert!(h.hub.franchise.all_franchises().is_empty());
    assert!(!h.dir.path().join("cache").join("dashboard_stats.json").exists());
}

#[tokio::test]
async fn test_dashboard_stream_follows_franchise_switch() {
    let h = harness().await;
    mount_login(&h).await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD_PATH))
        .and(header("x-franchise-id", "1"))
        .respond_with(ok(stats_data(100.0)))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD_PATH))
        .and(header("x-franchise-id", "2"))
        .respond_with(ok(stats_data(200.0)))
        .mount(&h.server)
        .await;

    h.hub.login().execute("amina@example.com", "secret").await;
    h.hub.select_franchise().execute(1);

    let mut stream = Box::pin(h.hub.observe_dashboard().stream());
    assert!(stream.next().await.unwrap().is_loading());
    assert_eq!(stream.next().await.unwrap().data().map(|s| s.sales_mtd), Some(100.0));

    h.hub.select_franchise().execute(2);
    assert!(stream.next().await.unwrap().is_loading());
    assert_eq!(stream.next().await.unwrap().data().map(|s| s.sales_mtd), Some(200.0));
}
