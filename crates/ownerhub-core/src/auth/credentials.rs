use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use super::secure_store::{KeySource, SecureStore};
use super::session::Session;
use crate::models::Franchise;

const KEY_ACCESS_TOKEN: &str = "access_token";
const KEY_REFRESH_TOKEN: &str = "refresh_token";
const KEY_ACTIVE_FRANCHISE_ID: &str = "active_franchise_id";
const KEY_ACTIVE_FRANCHISE_NAME: &str = "active_franchise_name";
const KEY_ACTIVE_FRANCHISE_BRANCH_COUNT: &str = "active_franchise_branch_count";
const KEY_ALL_FRANCHISES: &str = "all_franchises";

/// Durable, encrypted storage for the session tokens and franchise selection.
///
/// Reads never fail: anything missing or unreadable comes back as `None` or an
/// empty list. Writes return an error when the encrypted file could not be
/// replaced, in which case the previous values are still in effect.
pub struct CredentialStore {
    store: SecureStore,
}

impl CredentialStore {
    pub fn open(dir: &Path, key_source: &KeySource) -> Result<Self> {
        Ok(Self {
            store: SecureStore::open(dir, key_source)?,
        })
    }

    // ===== Tokens =====

    /// Store both tokens after a successful login
    pub fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        self.store.edit(|m| {
            m.insert(KEY_ACCESS_TOKEN.to_string(), access_token.to_string());
            m.insert(KEY_REFRESH_TOKEN.to_string(), refresh_token.to_string());
        })
    }

    /// Replace only the access token, keeping the refresh token
    pub fn save_access_token(&self, access_token: &str) -> Result<()> {
        self.store.edit(|m| {
            m.insert(KEY_ACCESS_TOKEN.to_string(), access_token.to_string());
        })
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get(KEY_ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(KEY_REFRESH_TOKEN)
    }

    pub fn clear_tokens(&self) -> Result<()> {
        debug!("Clearing stored tokens");
        self.store.edit(|m| {
            m.remove(KEY_ACCESS_TOKEN);
            m.remove(KEY_REFRESH_TOKEN);
        })
    }

    pub fn has_access_token(&self) -> bool {
        self.store.contains(KEY_ACCESS_TOKEN)
    }

    /// True when both tokens are stored. Expiry is not checked.
    pub fn has_valid_session(&self) -> bool {
        self.session().is_some()
    }

    pub fn session(&self) -> Option<Session> {
        Some(Session {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
        })
    }

    // ===== Franchise selection =====

    /// Persist the active franchise. Subscribers are notified by
    /// `FranchiseContext`, which is the caller of this method.
    pub fn set_active_franchise(&self, franchise: &Franchise) -> Result<()> {
        self.store.edit(|m| {
            m.insert(KEY_ACTIVE_FRANCHISE_ID.to_string(), franchise.id.to_string());
            m.insert(KEY_ACTIVE_FRANCHISE_NAME.to_string(), franchise.name.clone());
            m.insert(
                KEY_ACTIVE_FRANCHISE_BRANCH_COUNT.to_string(),
                franchise.branch_count.to_string(),
            );
        })
    }

    pub fn active_franchise_id(&self) -> Option<i32> {
        self.store
            .get(KEY_ACTIVE_FRANCHISE_ID)
            .and_then(|id| id.parse().ok())
    }

    pub fn active_franchise(&self) -> Option<Franchise> {
        let id = self.active_franchise_id()?;
        let name = self.store.get(KEY_ACTIVE_FRANCHISE_NAME)?;
        let branch_count = self
            .store
            .get(KEY_ACTIVE_FRANCHISE_BRANCH_COUNT)
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        Some(Franchise {
            id,
            name,
            branch_count,
        })
    }

    /// Cache the full franchise list for offline switching
    pub fn save_all_franchises(&self, franchises: &[Franchise]) -> Result<()> {
        let json = serde_json::to_string(franchises)?;
        self.store.edit(|m| {
            m.insert(KEY_ALL_FRANCHISES.to_string(), json);
        })
    }

    pub fn all_franchises(&self) -> Vec<Franchise> {
        let Some(json) = self.store.get(KEY_ALL_FRANCHISES) else {
            return Vec::new();
        };
        match serde_json::from_str(&json) {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Cached franchise list is unreadable, ignoring it");
                Vec::new()
            }
        }
    }

    /// Clear the active selection only; the cached list is kept
    pub fn clear_active_franchise(&self) -> Result<()> {
        self.store.edit(|m| {
            m.remove(KEY_ACTIVE_FRANCHISE_ID);
            m.remove(KEY_ACTIVE_FRANCHISE_NAME);
            m.remove(KEY_ACTIVE_FRANCHISE_BRANCH_COUNT);
        })
    }

    /// Clear the active selection and the cached franchise list
    pub fn clear_all(&self) -> Result<()> {
        self.store.edit(|m| {
            m.remove(KEY_ACTIVE_FRANCHISE_ID);
            m.remove(KEY_ACTIVE_FRANCHISE_NAME);
            m.remove(KEY_ACTIVE_FRANCHISE_BRANCH_COUNT);
            m.remove(KEY_ALL_FRANCHISES);
        })
    }

    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.store.edit(|m| {
            m.insert(key.to_string(), value.to_string());
        })
    }
}
