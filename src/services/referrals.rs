use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::{
    invitations::Invitation,
    rewards::RewardRecord,
    stats::{DashboardStats, ReconciliationReport},
    users::User,
};

mod engine;

pub use engine::{ReferralEngine, RegistrationOutcome};

pub enum ReferralRequest {
    Register {
        new_user_wallet: String,
        inviter_wallet: Option<String>,
        response: oneshot::Sender<Result<RegistrationOutcome, ServiceError>>,
    },
    GetUser {
        wallet: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    SetUserActive {
        wallet: String,
        active: bool,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    ListInvitations {
        wallet: String,
        response: oneshot::Sender<Result<Vec<Invitation>, ServiceError>>,
    },
    ListRewards {
        wallet: String,
        response: oneshot::Sender<Result<Vec<RewardRecord>, ServiceError>>,
    },
    AuditUser {
        wallet: String,
        response: oneshot::Sender<Result<ReconciliationReport, ServiceError>>,
    },
    DashboardStats {
        response: oneshot::Sender<Result<DashboardStats, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct ReferralRequestHandler {
    engine: Arc<ReferralEngine>,
}

impl ReferralRequestHandler {
    pub fn new(engine: Arc<ReferralEngine>) -> Self {
        ReferralRequestHandler { engine }
    }
}

#[async_trait]
impl RequestHandler<ReferralRequest> for ReferralRequestHandler {
    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::Register {
                new_user_wallet,
                inviter_wallet,
                response,
            } => {
                let result = self
                    .engine
                    .register_with_referral(&new_user_wallet, inviter_wallet.as_deref())
                    .await;
                let _ = response.send(result);
            }
            ReferralRequest::GetUser { wallet, response } => {
                let user = self.engine.get_user(&wallet).await;
                let _ = response.send(user);
            }
            ReferralRequest::SetUserActive {
                wallet,
                active,
                response,
            } => {
                let user = self.engine.set_user_active(&wallet, active).await;
                let _ = response.send(user);
            }
            ReferralRequest::ListInvitations { wallet, response } => {
                let invitations = self.engine.list_invitations(&wallet).await;
                let _ = response.send(invitations);
            }
            ReferralRequest::ListRewards { wallet, response } => {
                let rewards = self.engine.list_rewards(&wallet).await;
                let _ = response.send(rewards);
            }
            ReferralRequest::AuditUser { wallet, response } => {
                let report = self.engine.audit_user(&wallet).await;
                let _ = response.send(report);
            }
            ReferralRequest::DashboardStats { response } => {
                let stats = self.engine.dashboard_stats().await;
                let _ = response.send(stats);
            }
        }
    }
}

pub struct ReferralService;

impl ReferralService {
    pub fn new() -> Self {
        ReferralService {}
    }
}

#[async_trait]
impl Service<ReferralRequest, ReferralRequestHandler> for ReferralService {}
