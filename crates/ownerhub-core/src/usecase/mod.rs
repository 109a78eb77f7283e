//! Application operations built on the repository traits.

pub mod auth;
pub mod dashboard;
pub mod franchise;

pub use auth::{GetCurrentUserUseCase, LoginUseCase, LogoutUseCase, INCOMPLETE_LOGIN};
pub use dashboard::{DashboardViewState, ObserveDashboardUseCase, RefreshDashboardUseCase};
pub use franchise::SelectFranchiseUseCase;
