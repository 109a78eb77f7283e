use tracing::warn;

use crate::franchise::FranchiseContext;
use crate::models::Franchise;
use crate::outcome::{ErrorKind, Failure, Outcome};

/// Pick the active franchise from the list cached at login.
pub struct SelectFranchiseUseCase {
    franchise: FranchiseContext,
}

impl SelectFranchiseUseCase {
    pub fn new(franchise: FranchiseContext) -> Self {
        Self { franchise }
    }

    pub fn available(&self) -> Vec<Franchise> {
        self.franchise.all_franchises()
    }

    pub fn execute(&self, franchise_id: i32) -> Outcome<Franchise> {
        let Some(franchise) = self.franchise.find_franchise(franchise_id) else {
            return Outcome::Error(Failure::validation(
                format!("Franchise {} is not in the cached list", franchise_id),
                "That franchise is not available for this account",
            ));
        };

        if let Err(e) = self.franchise.set_active_franchise(franchise.clone()) {
            warn!(error = %e, franchise_id, "Failed to persist franchise selection");
            return Outcome::Error(
                Failure::new(ErrorKind::Data, format!("{:#}", e))
                    .with_message("Could not save franchise selection"),
            );
        }
        Outcome::Success(franchise)
    }
}
