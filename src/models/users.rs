use serde::{Deserialize, Serialize};

use super::wallet::WalletAddress;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub wallet_address: String,
    pub angel_balance: i64,
    pub total_earned: i64,
    pub referred_by: Option<String>,
    pub invites_count: i32,
    pub is_active: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

/// Row to insert on first registration. `referred_by` is fixed here and
/// never updated afterwards, which keeps the referral forest acyclic.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub wallet: WalletAddress,
    pub referred_by: Option<String>,
    pub starting_balance: i64,
}
