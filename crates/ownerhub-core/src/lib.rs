//! Ownerhub core - session, transport and dashboard data for franchise owners.
//!
//! The crate keeps an owner logged in against the owner hub backend, renews
//! expired access tokens transparently, tracks which franchise is active and
//! serves the KPI dashboard cache-first so it stays usable offline.

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod franchise;
pub mod models;
pub mod outcome;
pub mod repository;
pub mod usecase;

pub use app::{key_source_from, OwnerHub};
pub use config::Config;
pub use franchise::FranchiseContext;
pub use outcome::{ErrorKind, Failure, Outcome};
pub use repository::{AuthRepository, DashboardRepository};
