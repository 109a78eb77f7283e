//! Shared setup for integration tests: a mock backend and an owner hub
//! wired to it with throwaway storage.

#![allow(dead_code)]

use ownerhub_core::api::TransportConfig;
use ownerhub_core::auth::KeySource;
use ownerhub_core::{Config, OwnerHub};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::{MockServer, ResponseTemplate};

pub const LOGIN_PATH: &str = "/api/auth/owner-mobile-login.php";
pub const REFRESH_PATH: &str = "/api/auth/mobile-refresh.php";
pub const LOGOUT_PATH: &str = "/api/auth/mobile-logout.php";
pub const DASHBOARD_PATH: &str = "/api/owners/dashboard-stats.php";

pub const APP_VERSION: &str = "9.9.9-test";

pub struct Harness {
    pub server: MockServer,
    pub hub: OwnerHub,
    pub dir: TempDir,
}

pub async fn harness() -> Harness {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        data_dir: Some(dir.path().to_path_buf()),
        app_version: APP_VERSION.to_string(),
        ..Config::default()
    };
    let mut transport = TransportConfig::from_config(&config);
    transport.base_url = server.uri();
    let hub = OwnerHub::with_transport(config, transport, &KeySource::Key([8u8; 32])).unwrap();
    Harness {
        server,
        hub,
        dir,
    }
}

pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

pub fn failed(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "success": false,
        "error": { "code": code, "message": message }
    }))
}

pub fn login_data() -> Value {
    json!({
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "user": {
            "id": 12,
            "name": "Amina Wanjiru",
            "email": "amina@example.com",
            "role": "owner"
        },
        "franchises": [
            { "id": 1, "name": "Kisumu", "branch_count": 3 },
            { "id": 2, "name": "Eldoret", "branchCount": 1 }
        ]
    })
}

pub fn stats_data(sales: f64) -> Value {
    json!({
        "sales_mtd": sales,
        "cash_balance": 5400.5,
        "inventory_value": 12000.0,
        "total_bv": 830.25,
        "pending_approvals": 4,
        "sales_trend": "up",
        "cash_trend": "Down",
        "inventory_trend": "neutral",
        "bv_trend": "UP",
        "approvals_trend": "neutral"
    })
}
