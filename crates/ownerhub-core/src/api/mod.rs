//! REST API client module for the owner hub backend.
//!
//! This module provides the `ApiClient` for the auth and dashboard
//! endpoints, and the `HttpTransport` every call goes through. The
//! transport attaches the bearer token and context headers and renews the
//! access token transparently when a request comes back 401.

pub mod client;
pub mod envelope;
pub mod error;
pub mod transport;

pub use client::{ApiClient, AuthApi, DashboardApi};
pub use envelope::{ApiEnvelope, ApiErrorBody, ApiMeta, Pagination};
pub use error::ApiError;
pub use transport::{is_public_endpoint, ApiRequest, HttpTransport, TlsCustomizer, TransportConfig};
