use async_trait::async_trait;

use crate::models::{
    invitations::{Invitation, NewInvitation},
    rewards::{NewRewardRecord, RewardRecord},
    stats::{DashboardStats, LedgerMismatch},
    users::{NewUser, User},
    wallet::WalletAddress,
};

pub mod invitations;
pub mod memory;
pub mod postgres;
pub mod rewards;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    Conflict(String),
    #[error("Record not found: {0}")]
    Missing(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::RowNotFound => StoreError::Missing(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}

/// Read side of the user store, invitation store and reward ledger, plus the
/// entry point for atomic writes.
#[async_trait]
pub trait ReferralStore: Send + Sync + 'static {
    async fn find_user_by_wallet(&self, wallet: &WalletAddress)
        -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    /// Edges where `user_id` is the inviter, oldest first.
    async fn list_invitations_for_user(&self, user_id: &str)
        -> Result<Vec<Invitation>, StoreError>;

    /// Ledger rows received by `user_id`, oldest first.
    async fn list_rewards_for_user(&self, user_id: &str) -> Result<Vec<RewardRecord>, StoreError>;

    async fn ledger_total_for_user(&self, user_id: &str) -> Result<i64, StoreError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, StoreError>;

    async fn ledger_mismatches(&self) -> Result<Vec<LedgerMismatch>, StoreError>;

    /// Soft (de)activation. Returns `None` when the user does not exist.
    async fn set_user_active(&self, user_id: &str, active: bool)
        -> Result<Option<User>, StoreError>;

    /// Overwrites `total_earned` with the ledger total. Only the
    /// reconciliation job calls this.
    async fn reset_total_earned(&self, user_id: &str, total: i64) -> Result<(), StoreError>;

    async fn begin(&self) -> Result<Box<dyn ReferralTransaction>, StoreError>;
}

/// Writes of one registration. Nothing is visible to other readers until
/// `commit`; dropping the transaction without committing discards it.
#[async_trait]
pub trait ReferralTransaction: Send {
    async fn find_user_by_wallet(
        &mut self,
        wallet: &WalletAddress,
    ) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&mut self, user_id: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Conflict` when the wallet is already taken.
    async fn create_user(&mut self, new_user: NewUser) -> Result<User, StoreError>;

    /// Relative update of `angel_balance` and `total_earned` on one row.
    async fn increment_balance(&mut self, user_id: &str, amount: i64) -> Result<(), StoreError>;

    async fn increment_invites_count(&mut self, user_id: &str) -> Result<(), StoreError>;

    /// Returns `None` without writing when the (inviter, invitee) edge exists.
    async fn create_invitation_edge(
        &mut self,
        invitation: NewInvitation,
    ) -> Result<Option<Invitation>, StoreError>;

    async fn append_reward_record(
        &mut self,
        record: NewRewardRecord,
    ) -> Result<RewardRecord, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct FakeDbError {
        kind: ErrorKind,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message())
        }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_wallet_address_key\""
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match &self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn db_error(kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError { kind }))
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let error = StoreError::from(db_error(ErrorKind::UniqueViolation));
        assert!(
            matches!(&error, StoreError::Conflict(reason) if reason.contains("users_wallet_address_key"))
        );
    }

    #[test]
    fn test_other_sqlx_errors_map_by_kind() {
        assert!(matches!(
            StoreError::from(db_error(ErrorKind::ForeignKeyViolation)),
            StoreError::Database(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Missing(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Database(_)
        ));
    }
}
