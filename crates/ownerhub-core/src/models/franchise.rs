use serde::{Deserialize, Serialize};

/// A franchise the owner has access to.
///
/// The `id` is stable across the cached franchise list and the active
/// selection, and is what goes into the `X-Franchise-ID` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Franchise {
    pub id: i32,
    pub name: String,
    #[serde(rename = "branch_count", alias = "branchCount", default)]
    pub branch_count: i32,
}

impl Franchise {
    pub fn new(id: i32, name: impl Into<String>, branch_count: i32) -> Self {
        Self {
            id,
            name: name.into(),
            branch_count,
        }
    }

    pub fn display_branch_count(&self) -> String {
        match self.branch_count {
            1 => "1 branch".to_string(),
            n => format!("{} branches", n),
        }
    }
}
