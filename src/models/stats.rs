use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_invitations: i64,
    pub total_distributed: i64,
}

/// A user whose `total_earned` disagrees with the sum of their ledger rows.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMismatch {
    pub user_id: String,
    pub wallet_address: String,
    pub total_earned: i64,
    pub ledger_total: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub user_id: String,
    pub wallet_address: String,
    pub total_earned: i64,
    pub ledger_total: i64,
    pub consistent: bool,
}
