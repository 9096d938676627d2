use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{invitations, rewards, users, ReferralStore, ReferralTransaction, StoreError};
use crate::models::{
    invitations::{Invitation, NewInvitation},
    rewards::{NewRewardRecord, RewardRecord},
    stats::{DashboardStats, LedgerMismatch},
    users::{NewUser, User},
    wallet::WalletAddress,
};

/// Postgres-backed store. The unique index on `users.wallet_address` is what
/// turns a lost registration race into `StoreError::Conflict`.
#[derive(Clone)]
pub struct PgReferralStore {
    conn: PgPool,
}

impl PgReferralStore {
    pub fn new(conn: PgPool) -> Self {
        PgReferralStore { conn }
    }
}

#[async_trait]
impl ReferralStore for PgReferralStore {
    async fn find_user_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn.acquire().await?;
        users::get_user_by_wallet(&mut conn, wallet).await
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn.acquire().await?;
        users::get_user_by_id(&mut conn, user_id).await
    }

    async fn list_invitations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Invitation>, StoreError> {
        let mut conn = self.conn.acquire().await?;
        invitations::list_for_inviter(&mut conn, user_id).await
    }

    async fn list_rewards_for_user(&self, user_id: &str) -> Result<Vec<RewardRecord>, StoreError> {
        let mut conn = self.conn.acquire().await?;
        rewards::list_for_user(&mut conn, user_id).await
    }

    async fn ledger_total_for_user(&self, user_id: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.acquire().await?;
        rewards::sum_for_user(&mut conn, user_id).await
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        let mut conn = self.conn.acquire().await?;

        let total_users = users::count_users(&mut conn).await?;
        let total_invitations = invitations::count_invitations(&mut conn).await?;
        let total_distributed = rewards::total_distributed(&mut conn).await?;

        Ok(DashboardStats {
            total_users,
            total_invitations,
            total_distributed,
        })
    }

    async fn ledger_mismatches(&self) -> Result<Vec<LedgerMismatch>, StoreError> {
        let mut conn = self.conn.acquire().await?;
        users::ledger_mismatches(&mut conn).await
    }

    async fn set_user_active(
        &self,
        user_id: &str,
        active: bool,
    ) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn.acquire().await?;
        users::set_active(&mut conn, user_id, active).await
    }

    async fn reset_total_earned(&self, user_id: &str, total: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.acquire().await?;
        users::reset_total_earned(&mut conn, user_id, total).await
    }

    async fn begin(&self) -> Result<Box<dyn ReferralTransaction>, StoreError> {
        let tx = self.conn.begin().await?;
        Ok(Box::new(PgReferralTransaction { tx }))
    }
}

pub struct PgReferralTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReferralTransaction for PgReferralTransaction {
    async fn find_user_by_wallet(
        &mut self,
        wallet: &WalletAddress,
    ) -> Result<Option<User>, StoreError> {
        users::get_user_by_wallet(&mut self.tx, wallet).await
    }

    async fn find_user_by_id(&mut self, user_id: &str) -> Result<Option<User>, StoreError> {
        users::get_user_by_id(&mut self.tx, user_id).await
    }

    async fn create_user(&mut self, new_user: NewUser) -> Result<User, StoreError> {
        users::insert_user(&mut self.tx, &new_user).await
    }

    async fn increment_balance(&mut self, user_id: &str, amount: i64) -> Result<(), StoreError> {
        users::increment_balance(&mut self.tx, user_id, amount).await
    }

    async fn increment_invites_count(&mut self, user_id: &str) -> Result<(), StoreError> {
        users::increment_invites_count(&mut self.tx, user_id).await
    }

    async fn create_invitation_edge(
        &mut self,
        invitation: NewInvitation,
    ) -> Result<Option<Invitation>, StoreError> {
        invitations::insert_invitation(&mut self.tx, &invitation).await
    }

    async fn append_reward_record(
        &mut self,
        record: NewRewardRecord,
    ) -> Result<RewardRecord, StoreError> {
        rewards::insert_reward_record(&mut self.tx, &record).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
