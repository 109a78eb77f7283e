//! Active franchise selection as reactive state.
//!
//! The selection lives in the credential store and is mirrored on a
//! `tokio::sync::watch` channel. A subscriber sees the current value right
//! away and is woken on every change; the dashboard engine uses that to
//! throw away in-flight reads for the previous franchise.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use crate::auth::CredentialStore;
use crate::models::Franchise;

/// Cheap to clone; all clones share the same store and channel.
#[derive(Clone)]
pub struct FranchiseContext {
    store: Arc<CredentialStore>,
    sender: Arc<watch::Sender<Option<Franchise>>>,
}

impl FranchiseContext {
    /// Build the context, seeding it with the persisted selection.
    pub fn new(store: Arc<CredentialStore>) -> Self {
        let (sender, _) = watch::channel(store.active_franchise());
        Self {
            store,
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Franchise>> {
        self.sender.subscribe()
    }

    pub fn active_franchise(&self) -> Option<Franchise> {
        self.sender.borrow().clone()
    }

    pub fn active_franchise_id(&self) -> Option<i32> {
        self.sender.borrow().as_ref().map(|f| f.id)
    }

    /// The active franchise id formatted for the `X-Franchise-ID` header.
    pub fn active_franchise_id_header(&self) -> Option<String> {
        self.active_franchise_id().map(|id| id.to_string())
    }

    pub fn has_active_franchise(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Persist `franchise` as active, then notify subscribers.
    ///
    /// The franchise does not have to be in the cached list.
    pub fn set_active_franchise(&self, franchise: Franchise) -> Result<()> {
        self.store.set_active_franchise(&franchise)?;
        info!(franchise_id = franchise.id, name = %franchise.name, "Active franchise changed");
        self.sender.send_replace(Some(franchise));
        Ok(())
    }

    pub fn save_all_franchises(&self, franchises: &[Franchise]) -> Result<()> {
        self.store.save_all_franchises(franchises)
    }

    pub fn all_franchises(&self) -> Vec<Franchise> {
        self.store.all_franchises()
    }

    /// Look a franchise up in the cached list.
    pub fn find_franchise(&self, id: i32) -> Option<Franchise> {
        self.all_franchises().into_iter().find(|f| f.id == id)
    }

    /// Clear the active selection; the cached list is kept.
    pub fn clear_active_franchise(&self) -> Result<()> {
        self.store.clear_active_franchise()?;
        self.sender.send_replace(None);
        Ok(())
    }

    /// Clear the active selection and the cached list.
    pub fn clear_all(&self) -> Result<()> {
        self.store.clear_all()?;
        self.sender.send_replace(None);
        Ok(())
    }
}
