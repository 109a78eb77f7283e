//! Data models for franchise owner entities.
//!
//! This module contains the data structures used across the core:
//!
//! - `User`: the authenticated owner (in-memory only)
//! - `Franchise`: a franchise the owner can switch between
//! - `DashboardStats`, `Trend`: KPI snapshot shown on the dashboard
//! - Session types: login request/response payloads and `LoginSummary`
//!
//! Wire payloads that need conversion (dashboard stats, login) have their own
//! response structs; simple records deserialize straight into the domain type.

pub mod dashboard;
pub mod franchise;
pub mod session;
pub mod user;

pub use dashboard::{DashboardStats, DashboardStatsResponse, Trend};
pub use franchise::Franchise;
pub use session::{LoginRequest, LoginResponse, LoginSummary, RefreshRequest, TokenResponse};
pub use user::User;
