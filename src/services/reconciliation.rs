use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::referrals::ReferralEngine;

/// Periodically compares every user's `total_earned` with their ledger rows.
/// Registration is transactional, so a mismatch means something wrote to the
/// tables outside the engine.
pub fn start_reconciliation_task(
    engine: Arc<ReferralEngine>,
    period: Duration,
    repair: bool,
) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;

            match engine.reconcile(repair).await {
                Ok(mismatches) if mismatches.is_empty() => {
                    log::debug!("Ledger reconciled, no drift.")
                }
                Ok(mismatches) => {
                    log::warn!(
                        "Ledger reconciliation found {} mismatched user(s){}.",
                        mismatches.len(),
                        if repair { ", repaired" } else { "" }
                    );
                }
                Err(e) => {
                    log::error!("Error reconciling ledger: {}", e);
                }
            }
        }
    });

    log::info!("Reconciliation task started");
    handle
}
