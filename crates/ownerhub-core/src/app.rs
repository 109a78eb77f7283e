//! Wiring for a running owner hub.
//!
//! `OwnerHub` builds the whole service graph once from a `Config` and hands
//! out use-cases that share it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Certificate;
use tracing::debug;

use crate::api::{ApiClient, HttpTransport, TransportConfig};
use crate::auth::{AuthService, CredentialStore, KeySource};
use crate::cache::CacheManager;
use crate::config::{Config, ENV_PASSPHRASE};
use crate::dashboard::DashboardService;
use crate::franchise::FranchiseContext;
use crate::repository::{AuthRepository, DashboardRepository};
use crate::usecase::{
    GetCurrentUserUseCase, LoginUseCase, LogoutUseCase, ObserveDashboardUseCase,
    RefreshDashboardUseCase, SelectFranchiseUseCase,
};

/// Keychain service name for the generated master key.
pub const KEYRING_SERVICE: &str = "ownerhub";

/// Passphrase from `lookup` if set, otherwise the OS keychain.
pub fn key_source_from(lookup: impl Fn(&str) -> Option<String>) -> KeySource {
    match lookup(ENV_PASSPHRASE).filter(|p| !p.is_empty()) {
        Some(passphrase) => KeySource::Passphrase(passphrase),
        None => KeySource::Keyring {
            service: KEYRING_SERVICE.to_string(),
        },
    }
}

fn load_root_certificate(path: &Path) -> Result<Certificate> {
    let pem = std::fs::read(path)
        .with_context(|| format!("Failed to read root certificate: {}", path.display()))?;
    Certificate::from_pem(&pem)
        .with_context(|| format!("Invalid PEM certificate: {}", path.display()))
}

pub struct OwnerHub {
    pub config: Config,
    pub credentials: Arc<CredentialStore>,
    pub franchise: FranchiseContext,
    pub api: ApiClient,
    pub cache: Arc<CacheManager>,
    pub auth: Arc<AuthService>,
    pub dashboard: Arc<DashboardService>,
}

impl OwnerHub {
    pub fn open(config: Config, key_source: &KeySource) -> Result<Self> {
        let mut transport = TransportConfig::from_config(&config);
        if let Some(ref path) = config.root_certificate {
            let cert = load_root_certificate(path)?;
            transport = transport.with_tls_customizer(move |b| b.add_root_certificate(cert.clone()));
        }
        Self::with_transport(config, transport, key_source)
    }

    /// Like `open`, with a caller-built transport configuration.
    pub fn with_transport(config: Config, transport: TransportConfig, key_source: &KeySource) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let cache_dir = config.cache_dir()?;
        debug!(?data_dir, ?cache_dir, base_url = %transport.base_url, "Opening owner hub");

        let credentials = Arc::new(CredentialStore::open(&data_dir, key_source)?);
        let franchise = FranchiseContext::new(Arc::clone(&credentials));
        let cache = Arc::new(CacheManager::new(cache_dir)?);

        let transport = HttpTransport::new(transport, Arc::clone(&credentials), franchise.clone())
            .context("Failed to build HTTP client")?;
        let api = ApiClient::new(Arc::new(transport));

        let auth = Arc::new(AuthService::new(
            Arc::new(api.clone()),
            Arc::clone(&credentials),
            franchise.clone(),
        ));
        let dashboard = Arc::new(DashboardService::new(
            Arc::new(api.clone()),
            Arc::clone(&cache),
            franchise.clone(),
        ));

        Ok(Self {
            config,
            credentials,
            franchise,
            api,
            cache,
            auth,
            dashboard,
        })
    }

    fn auth_repository(&self) -> Arc<dyn AuthRepository> {
        self.auth.clone()
    }

    fn dashboard_repository(&self) -> Arc<dyn DashboardRepository> {
        self.dashboard.clone()
    }

    pub fn login(&self) -> LoginUseCase {
        LoginUseCase::new(self.auth_repository())
    }

    pub fn logout(&self) -> LogoutUseCase {
        LogoutUseCase::new(
            self.auth_repository(),
            self.dashboard_repository(),
            self.franchise.clone(),
        )
    }

    pub fn current_user(&self) -> GetCurrentUserUseCase {
        GetCurrentUserUseCase::new(self.auth_repository())
    }

    pub fn observe_dashboard(&self) -> ObserveDashboardUseCase {
        ObserveDashboardUseCase::new(self.dashboard_repository())
    }

    pub fn refresh_dashboard(&self) -> RefreshDashboardUseCase {
        RefreshDashboardUseCase::new(self.dashboard_repository())
    }

    pub fn select_franchise(&self) -> SelectFranchiseUseCase {
        SelectFranchiseUseCase::new(self.franchise.clone())
    }
}
