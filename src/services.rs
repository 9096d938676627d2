use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::repositories::{ReferralStore, StoreError};
use crate::settings::Settings;

mod http;
mod reconciliation;
mod referrals;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(reason) => ServiceError::Conflict(reason),
            other => ServiceError::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(
    store: Arc<dyn ReferralStore>,
    settings: Settings,
) -> Result<(), anyhow::Error> {
    let (referral_tx, mut referral_rx) = mpsc::channel(512);

    let engine = Arc::new(referrals::ReferralEngine::new(store, settings.rewards));
    let mut referral_service = referrals::ReferralService::new();

    log::info!("Starting referral service.");
    let handler = referrals::ReferralRequestHandler::new(engine.clone());
    tokio::spawn(async move {
        referral_service.run(handler, &mut referral_rx).await;
    });

    if settings.reconciliation.enabled {
        log::info!("Starting ledger reconciliation task.");
        reconciliation::start_reconciliation_task(
            engine,
            Duration::from_secs(settings.reconciliation.interval_secs),
            settings.reconciliation.repair,
        );
    }

    log::info!("Starting HTTP server.");
    http::start_http_server(&settings.http.listen, referral_tx).await
}
