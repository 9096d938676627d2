use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{ReferralStore, ReferralTransaction, StoreError};
use crate::models::{
    invitations::{Invitation, NewInvitation},
    rewards::{NewRewardRecord, RewardRecord, REWARD_STATUS_COMPLETED},
    stats::{DashboardStats, LedgerMismatch},
    users::{NewUser, User},
    wallet::WalletAddress,
};

#[derive(Clone, Default)]
struct MemoryState {
    users: HashMap<String, User>,
    // insertion order, for stable listings
    user_order: Vec<String>,
    wallet_index: HashMap<String, String>,
    invitations: Vec<Invitation>,
    rewards: Vec<RewardRecord>,
}

impl MemoryState {
    fn user_by_wallet(&self, wallet: &WalletAddress) -> Option<&User> {
        self.wallet_index
            .get(wallet.as_str())
            .and_then(|id| self.users.get(id))
    }

    fn user_mut(&mut self, user_id: &str) -> Result<&mut User, StoreError> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::Missing(format!("user {}", user_id)))
    }

    fn ledger_total(&self, user_id: &str) -> Result<i64, StoreError> {
        checked_sum(
            self.rewards
                .iter()
                .filter(|r| r.user_id == user_id)
                .map(|r| r.amount),
        )
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = i64>) -> Result<i64, StoreError> {
    amounts.try_fold(0i64, |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| StoreError::Database("ledger total overflow".to_string()))
    })
}

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// In-process store for tests and database-less local runs. A transaction
/// holds the state lock for its whole lifetime and works on a copy, so
/// registrations are serialized and a dropped transaction leaves no trace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReferralStore for MemoryStore {
    async fn find_user_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.user_by_wallet(wallet).cloned())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn list_invitations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Invitation>, StoreError> {
        let state = self.state.lock().await;

        Ok(state
            .invitations
            .iter()
            .filter(|i| i.inviter_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_rewards_for_user(&self, user_id: &str) -> Result<Vec<RewardRecord>, StoreError> {
        let state = self.state.lock().await;

        Ok(state
            .rewards
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn ledger_total_for_user(&self, user_id: &str) -> Result<i64, StoreError> {
        self.state.lock().await.ledger_total(user_id)
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        let state = self.state.lock().await;

        Ok(DashboardStats {
            total_users: state.users.len() as i64,
            total_invitations: state.invitations.len() as i64,
            total_distributed: checked_sum(state.rewards.iter().map(|r| r.amount))?,
        })
    }

    async fn ledger_mismatches(&self) -> Result<Vec<LedgerMismatch>, StoreError> {
        let state = self.state.lock().await;

        let mut mismatches = Vec::new();
        for user in state.user_order.iter().filter_map(|id| state.users.get(id)) {
            let ledger_total = state.ledger_total(&user.id)?;
            if ledger_total != user.total_earned {
                mismatches.push(LedgerMismatch {
                    user_id: user.id.clone(),
                    wallet_address: user.wallet_address.clone(),
                    total_earned: user.total_earned,
                    ledger_total,
                });
            }
        }

        Ok(mismatches)
    }

    async fn set_user_active(
        &self,
        user_id: &str,
        active: bool,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.state.lock().await;

        Ok(state.users.get_mut(user_id).map(|user| {
            user.is_active = active;
            user.updated_at = now();
            user.clone()
        }))
    }

    async fn reset_total_earned(&self, user_id: &str, total: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let user = state.user_mut(user_id)?;

        user.total_earned = total;
        user.updated_at = now();

        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn ReferralTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();

        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl ReferralTransaction for MemoryTransaction {
    async fn find_user_by_wallet(
        &mut self,
        wallet: &WalletAddress,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.working.user_by_wallet(wallet).cloned())
    }

    async fn find_user_by_id(&mut self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.get(user_id).cloned())
    }

    async fn create_user(&mut self, new_user: NewUser) -> Result<User, StoreError> {
        if self.working.wallet_index.contains_key(new_user.wallet.as_str()) {
            return Err(StoreError::Conflict(format!(
                "wallet_address {} already registered",
                new_user.wallet
            )));
        }

        let timestamp = now();
        let user = User {
            id: Uuid::new_v4().hyphenated().to_string(),
            wallet_address: new_user.wallet.to_string(),
            angel_balance: new_user.starting_balance,
            total_earned: new_user.starting_balance,
            referred_by: new_user.referred_by,
            invites_count: 0,
            is_active: true,
            created_at: timestamp,
            updated_at: timestamp,
        };

        self.working
            .wallet_index
            .insert(user.wallet_address.clone(), user.id.clone());
        self.working.user_order.push(user.id.clone());
        self.working.users.insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn increment_balance(&mut self, user_id: &str, amount: i64) -> Result<(), StoreError> {
        let user = self.working.user_mut(user_id)?;
        let overflow = || StoreError::Database(format!("balance overflow for user {}", user_id));

        let angel_balance = user.angel_balance.checked_add(amount).ok_or_else(overflow)?;
        let total_earned = user.total_earned.checked_add(amount).ok_or_else(overflow)?;

        user.angel_balance = angel_balance;
        user.total_earned = total_earned;
        user.updated_at = now();

        Ok(())
    }

    async fn increment_invites_count(&mut self, user_id: &str) -> Result<(), StoreError> {
        let user = self.working.user_mut(user_id)?;

        user.invites_count = user
            .invites_count
            .checked_add(1)
            .ok_or_else(|| StoreError::Database(format!("invites_count overflow for user {}", user_id)))?;
        user.updated_at = now();

        Ok(())
    }

    async fn create_invitation_edge(
        &mut self,
        invitation: NewInvitation,
    ) -> Result<Option<Invitation>, StoreError> {
        let exists = self.working.invitations.iter().any(|i| {
            i.inviter_id == invitation.inviter_id && i.invitee_id == invitation.invitee_id
        });
        if exists {
            return Ok(None);
        }

        let timestamp = now();
        let invitation = Invitation {
            id: Uuid::new_v4().hyphenated().to_string(),
            inviter_id: invitation.inviter_id,
            invitee_id: invitation.invitee_id,
            level: invitation.level,
            reward_amount: invitation.reward_amount,
            status: invitation.status,
            created_at: timestamp,
            updated_at: timestamp,
        };
        self.working.invitations.push(invitation.clone());

        Ok(Some(invitation))
    }

    async fn append_reward_record(
        &mut self,
        record: NewRewardRecord,
    ) -> Result<RewardRecord, StoreError> {
        let record = RewardRecord {
            id: Uuid::new_v4().hyphenated().to_string(),
            user_id: record.user_id,
            reward_type: record.reward_type,
            amount: record.amount,
            related_user_id: record.related_user_id,
            invitation_id: record.invitation_id,
            status: REWARD_STATUS_COMPLETED.to_string(),
            created_at: now(),
        };
        self.working.rewards.push(record.clone());

        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{invitations::InvitationStatus, rewards::RewardType};

    fn wallet(n: u8) -> WalletAddress {
        WalletAddress::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn new_user(n: u8, starting_balance: i64) -> NewUser {
        NewUser {
            wallet: wallet(n),
            referred_by: None,
            starting_balance,
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let user = tx.create_user(new_user(1, 100)).await.unwrap();
        tx.increment_balance(&user.id, 50).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.find_user_by_wallet(&wallet(1)).await.unwrap().unwrap();
        assert_eq!(stored.angel_balance, 150);
        assert_eq!(stored.total_earned, 150);
        assert!(stored.is_active);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_writes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.create_user(new_user(1, 100)).await.unwrap();
        tx.rollback().await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_user(new_user(2, 100)).await.unwrap();
        }

        assert!(store.find_user_by_wallet(&wallet(1)).await.unwrap().is_none());
        assert!(store.find_user_by_wallet(&wallet(2)).await.unwrap().is_none());
        assert_eq!(store.dashboard_stats().await.unwrap().total_users, 0);
    }

    #[tokio::test]
    async fn test_duplicate_wallet_conflicts() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.create_user(new_user(1, 100)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = tx.create_user(new_user(1, 100)).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_edge_is_noop() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let inviter = tx.create_user(new_user(1, 0)).await.unwrap();
        let invitee = tx.create_user(new_user(2, 0)).await.unwrap();

        let edge = NewInvitation {
            inviter_id: inviter.id.clone(),
            invitee_id: invitee.id.clone(),
            level: 1,
            reward_amount: 50,
            status: InvitationStatus::Accepted,
        };
        assert!(tx.create_invitation_edge(edge.clone()).await.unwrap().is_some());
        assert!(tx.create_invitation_edge(edge).await.unwrap().is_none());
        tx.commit().await.unwrap();

        let edges = store.list_invitations_for_user(&inviter.id).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].invitee_id, invitee.id);
    }

    #[tokio::test]
    async fn test_increment_unknown_user_is_missing() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let result = tx.increment_balance("nope", 10).await;
        assert!(matches!(result, Err(StoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_increment_past_i64_max_errors() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let user = tx.create_user(new_user(1, i64::MAX)).await.unwrap();
        let result = tx.increment_balance(&user.id, 1).await;
        assert!(matches!(result, Err(StoreError::Database(_))));

        let unchanged = tx.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.angel_balance, i64::MAX);
        assert_eq!(unchanged.total_earned, i64::MAX);
    }

    #[tokio::test]
    async fn test_ledger_mismatches_and_reset() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let user = tx.create_user(new_user(1, 100)).await.unwrap();
        tx.append_reward_record(NewRewardRecord {
            user_id: user.id.clone(),
            reward_type: RewardType::Welcome,
            amount: 100,
            related_user_id: None,
            invitation_id: None,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert!(store.ledger_mismatches().await.unwrap().is_empty());

        store.reset_total_earned(&user.id, 70).await.unwrap();
        let mismatches = store.ledger_mismatches().await.unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].total_earned, 70);
        assert_eq!(mismatches[0].ledger_total, 100);
    }
}
