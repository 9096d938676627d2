use std::sync::Arc;

use serde::Serialize;

use crate::models::{
    invitations::{Invitation, InvitationStatus, NewInvitation},
    rewards::{NewRewardRecord, RewardRecord, RewardSchedule, RewardType, MAX_REFERRAL_LEVEL},
    stats::{DashboardStats, LedgerMismatch, ReconciliationReport},
    users::{NewUser, User},
    wallet::WalletAddress,
};
use crate::repositories::{ReferralStore, ReferralTransaction, StoreError};
use crate::services::ServiceError;

/// What happened to the referral hint of a registration.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ReferralOutcome {
    /// Organic signup, or the wallet was already registered.
    None,
    /// The inviter wallet is well formed but nobody registered it.
    InviterNotFound,
    /// The inviter hint was malformed or pointed at the new wallet itself.
    InvalidInviter,
    Applied { levels_paid: u8 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub user: User,
    pub created: bool,
    pub referral: ReferralOutcome,
    pub rewards: Vec<RewardRecord>,
}

impl RegistrationOutcome {
    fn existing(user: User) -> Self {
        RegistrationOutcome {
            user,
            created: false,
            referral: ReferralOutcome::None,
            rewards: Vec::new(),
        }
    }
}

enum InviterHint {
    Absent,
    Invalid,
    Wallet(WalletAddress),
}

pub struct ReferralEngine {
    store: Arc<dyn ReferralStore>,
    schedule: RewardSchedule,
}

impl ReferralEngine {
    pub fn new(store: Arc<dyn ReferralStore>, schedule: RewardSchedule) -> Self {
        ReferralEngine { store, schedule }
    }

    pub async fn register_with_referral(
        &self,
        new_user_wallet: &str,
        inviter_wallet: Option<&str>,
    ) -> Result<RegistrationOutcome, ServiceError> {
        let wallet = parse_wallet(new_user_wallet)?;
        let hint = self.inviter_hint(&wallet, inviter_wallet);

        if let Some(user) = self.store.find_user_by_wallet(&wallet).await? {
            log::debug!("Wallet {} already registered, no rewards granted.", wallet);
            return Ok(RegistrationOutcome::existing(user));
        }

        let mut tx = self.store.begin().await?;
        let registered = self.register_in(tx.as_mut(), &wallet, &hint).await;
        let result = match registered {
            Ok(outcome) => tx.commit().await.map(|_| outcome),
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    log::error!("Rollback for {} failed: {}", wallet, rollback_error);
                }
                Err(e)
            }
        };

        match result {
            Ok(outcome) => {
                log::info!(
                    "Registered {} ({:?}), {} reward record(s) written.",
                    wallet,
                    outcome.referral,
                    outcome.rewards.len()
                );
                Ok(outcome)
            }
            Err(StoreError::Conflict(reason)) => {
                log::info!("Concurrent registration of {} won elsewhere: {}", wallet, reason);

                match self.store.find_user_by_wallet(&wallet).await? {
                    Some(user) => Ok(RegistrationOutcome::existing(user)),
                    None => Err(ServiceError::Persistence(format!(
                        "wallet {} conflicted but is not registered",
                        wallet
                    ))),
                }
            }
            Err(e) => {
                log::error!("Registration of {} rolled back: {}", wallet, e);
                Err(ServiceError::Persistence(e.to_string()))
            }
        }
    }

    fn inviter_hint(&self, wallet: &WalletAddress, inviter_wallet: Option<&str>) -> InviterHint {
        let raw = match inviter_wallet.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw,
            None => return InviterHint::Absent,
        };

        match WalletAddress::parse(raw) {
            Ok(inviter) if &inviter == wallet => {
                log::warn!("Ignoring self-referral from {}.", wallet);
                InviterHint::Invalid
            }
            Ok(inviter) => InviterHint::Wallet(inviter),
            Err(e) => {
                log::warn!("Ignoring referral hint for {}: {}", wallet, e);
                InviterHint::Invalid
            }
        }
    }

    async fn register_in(
        &self,
        tx: &mut dyn ReferralTransaction,
        wallet: &WalletAddress,
        hint: &InviterHint,
    ) -> Result<RegistrationOutcome, StoreError> {
        // resolved before the insert so a wallet can never become its own parent
        let inviter = match hint {
            InviterHint::Wallet(inviter_wallet) => tx.find_user_by_wallet(inviter_wallet).await?,
            _ => None,
        };

        let user = tx
            .create_user(NewUser {
                wallet: wallet.clone(),
                referred_by: inviter.as_ref().map(|u| u.id.clone()),
                starting_balance: self.schedule.welcome,
            })
            .await?;

        let mut rewards = vec![
            tx.append_reward_record(NewRewardRecord {
                user_id: user.id.clone(),
                reward_type: RewardType::Welcome,
                amount: self.schedule.welcome,
                related_user_id: None,
                invitation_id: None,
            })
            .await?,
        ];

        let referral = match (hint, inviter) {
            (InviterHint::Absent, _) => ReferralOutcome::None,
            (InviterHint::Invalid, _) => ReferralOutcome::InvalidInviter,
            (InviterHint::Wallet(inviter_wallet), None) => {
                log::warn!(
                    "Inviter {} is not registered, {} signs up without referral.",
                    inviter_wallet,
                    wallet
                );
                ReferralOutcome::InviterNotFound
            }
            (InviterHint::Wallet(_), Some(inviter)) => {
                let levels_paid = self.pay_upline(tx, &user, inviter, &mut rewards).await?;
                ReferralOutcome::Applied { levels_paid }
            }
        };

        Ok(RegistrationOutcome {
            user,
            created: true,
            referral,
            rewards,
        })
    }

    /// Creates the direct invitation edge and credits the inviter and up to
    /// two further ancestors. Returns the deepest level paid.
    async fn pay_upline(
        &self,
        tx: &mut dyn ReferralTransaction,
        invitee: &User,
        inviter: User,
        rewards: &mut Vec<RewardRecord>,
    ) -> Result<u8, StoreError> {
        let invitation = tx
            .create_invitation_edge(NewInvitation {
                inviter_id: inviter.id.clone(),
                invitee_id: invitee.id.clone(),
                level: 1,
                reward_amount: self.schedule.referral_l1,
                status: InvitationStatus::Accepted,
            })
            .await?;

        let invitation = match invitation {
            Some(invitation) => invitation,
            None => {
                log::warn!(
                    "Invitation {} -> {} already exists, skipping payout.",
                    inviter.id,
                    invitee.id
                );
                return Ok(0);
            }
        };
        tx.increment_invites_count(&inviter.id).await?;

        let mut levels_paid = 0;
        let mut ancestor = Some(inviter);

        for level in 1..=MAX_REFERRAL_LEVEL {
            let (recipient, reward_type) = match (ancestor.take(), RewardType::for_level(level)) {
                (Some(recipient), Some(reward_type)) => (recipient, reward_type),
                _ => break,
            };

            let amount = self.schedule.amount_for(reward_type);
            tx.increment_balance(&recipient.id, amount).await?;
            rewards.push(
                tx.append_reward_record(NewRewardRecord {
                    user_id: recipient.id.clone(),
                    reward_type,
                    amount,
                    related_user_id: Some(invitee.id.clone()),
                    invitation_id: Some(invitation.id.clone()),
                })
                .await?,
            );
            levels_paid = level;

            ancestor = match recipient.referred_by {
                Some(parent_id) if level < MAX_REFERRAL_LEVEL => {
                    let parent = tx.find_user_by_id(&parent_id).await?;
                    if parent.is_none() {
                        log::warn!("User {} points at missing parent {}.", recipient.id, parent_id);
                    }
                    parent
                }
                _ => None,
            };
        }

        Ok(levels_paid)
    }

    pub async fn get_user(&self, wallet: &str) -> Result<User, ServiceError> {
        let wallet = parse_wallet(wallet)?;

        self.store
            .find_user_by_wallet(&wallet)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", wallet)))
    }

    pub async fn list_invitations(&self, wallet: &str) -> Result<Vec<Invitation>, ServiceError> {
        let user = self.get_user(wallet).await?;
        Ok(self.store.list_invitations_for_user(&user.id).await?)
    }

    pub async fn list_rewards(&self, wallet: &str) -> Result<Vec<RewardRecord>, ServiceError> {
        let user = self.get_user(wallet).await?;
        Ok(self.store.list_rewards_for_user(&user.id).await?)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
        Ok(self.store.dashboard_stats().await?)
    }

    pub async fn set_user_active(&self, wallet: &str, active: bool) -> Result<User, ServiceError> {
        let user = self.get_user(wallet).await?;

        self.store
            .set_user_active(&user.id, active)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", wallet)))
    }

    pub async fn audit_user(&self, wallet: &str) -> Result<ReconciliationReport, ServiceError> {
        let user = self.get_user(wallet).await?;
        let ledger_total = self.store.ledger_total_for_user(&user.id).await?;

        Ok(ReconciliationReport {
            consistent: ledger_total == user.total_earned,
            user_id: user.id,
            wallet_address: user.wallet_address,
            total_earned: user.total_earned,
            ledger_total,
        })
    }

    /// Finds every user whose `total_earned` drifted from the ledger. With
    /// `repair`, the ledger total is written back onto the user row.
    pub async fn reconcile(&self, repair: bool) -> Result<Vec<LedgerMismatch>, ServiceError> {
        let mismatches = self.store.ledger_mismatches().await?;

        for mismatch in &mismatches {
            log::warn!(
                "Ledger mismatch for {}: total_earned={} ledger={}",
                mismatch.wallet_address,
                mismatch.total_earned,
                mismatch.ledger_total
            );

            if repair {
                self.store
                    .reset_total_earned(&mismatch.user_id, mismatch.ledger_total)
                    .await?;
            }
        }

        Ok(mismatches)
    }
}

fn parse_wallet(raw: &str) -> Result<WalletAddress, ServiceError> {
    WalletAddress::parse(raw).map_err(|e| ServiceError::Validation(e.to_string()))
}
