//! Dashboard KPI models.
//!
//! `DashboardStatsResponse` is the wire shape returned by the stats endpoint;
//! `DashboardStats` is the domain snapshot that gets cached and shown.

use serde::{Deserialize, Serialize};

/// Direction of a KPI compared to the previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Trend {
    Up,
    Down,
    #[default]
    Neutral,
}

impl Trend {
    /// Parse a trend string from the API. Matching is case-insensitive and
    /// anything unrecognized collapses to `Neutral`.
    pub fn from_api(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => Trend::Up,
            "down" => Trend::Down,
            _ => Trend::Neutral,
        }
    }

    pub fn as_api_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Neutral => "neutral",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Neutral => "•",
        }
    }
}

/// Snapshot of the owner's key performance indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DashboardStats {
    pub sales_mtd: f64,
    pub cash_balance: f64,
    pub inventory_value: f64,
    pub total_bv: f64,
    pub pending_approvals: i32,
    pub sales_trend: Trend,
    pub cash_trend: Trend,
    pub inventory_trend: Trend,
    pub bv_trend: Trend,
    pub approvals_trend: Trend,
    /// Epoch milliseconds when this snapshot was fetched from the server.
    pub last_updated: i64,
}

/// Wire payload of the dashboard stats endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardStatsResponse {
    #[serde(alias = "salesMtd")]
    pub sales_mtd: f64,
    #[serde(alias = "cashBalance")]
    pub cash_balance: f64,
    #[serde(alias = "inventoryValue")]
    pub inventory_value: f64,
    #[serde(alias = "totalBv")]
    pub total_bv: f64,
    #[serde(alias = "pendingApprovals")]
    pub pending_approvals: i32,
    #[serde(alias = "salesTrend", default)]
    pub sales_trend: String,
    #[serde(alias = "cashTrend", default)]
    pub cash_trend: String,
    #[serde(alias = "inventoryTrend", default)]
    pub inventory_trend: String,
    #[serde(alias = "bvTrend", default)]
    pub bv_trend: String,
    #[serde(alias = "approvalsTrend", default)]
    pub approvals_trend: String,
}

impl DashboardStatsResponse {
    pub fn to_stats(&self, fetched_at_millis: i64) -> DashboardStats {
        DashboardStats {
            sales_mtd: self.sales_mtd,
            cash_balance: self.cash_balance,
            inventory_value: self.inventory_value,
            total_bv: self.total_bv,
            pending_approvals: self.pending_approvals,
            sales_trend: Trend::from_api(&self.sales_trend),
            cash_trend: Trend::from_api(&self.cash_trend),
            inventory_trend: Trend::from_api(&self.inventory_trend),
            bv_trend: Trend::from_api(&self.bv_trend),
            approvals_trend: Trend::from_api(&self.approvals_trend),
            last_updated: fetched_at_millis,
        }
    }
}
