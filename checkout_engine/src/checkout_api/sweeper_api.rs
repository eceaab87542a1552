use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    checkout_api::{
        objects::{ReconcileOutcome, SweepReport},
        reconcile::Reconciler,
    },
    db_types::{Payment, PaymentStatus},
    events::EventProducers,
    gateway::PaymentGateway,
    traits::{CheckoutDatabase, CheckoutDatabaseError, PaymentStats},
};

#[derive(Debug, Clone, Copy)]
pub struct SweeperSettings {
    /// Pending payments without a gateway transaction id are failed after this long.
    pub pending_timeout: Duration,
    /// Closed payments older than this are removed by [`SweeperApi::cleanup_old`].
    pub cleanup_age: Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self { pending_timeout: Duration::hours(1), cleanup_age: Duration::days(30) }
    }
}

/// Background reconciliation: catches payments whose webhook never arrived, and gives up on payments that never
/// reached the gateway.
pub struct SweeperApi<B, G> {
    reconciler: Reconciler<B, G>,
    settings: SweeperSettings,
}

impl<B, G> Debug for SweeperApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SweeperApi")
    }
}

impl<B, G> SweeperApi<B, G> {
    pub fn new(db: B, gateway: G, settings: SweeperSettings, producers: EventProducers) -> Self {
        Self { reconciler: Reconciler::new(db, gateway, producers), settings }
    }

    pub fn settings(&self) -> &SweeperSettings {
        &self.settings
    }
}

impl<B, G> SweeperApi<B, G>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    /// Asks the gateway about every open payment that it has assigned a transaction id, and applies the answers.
    /// A failure for one payment is logged and does not stop the sweep.
    pub async fn verify_pending(&self) -> Result<SweepReport, CheckoutDatabaseError> {
        let open = self.reconciler.ledger().open_payments_with_tx_id().await?;
        let mut report = SweepReport::default();
        for payment in &open {
            let Some(tx_id) = payment.gateway_transaction_id.as_deref() else { continue };
            report.checked += 1;
            match self.reconciler.verify_and_apply(payment, tx_id, None).await {
                Ok(outcome) => tally(&mut report, &outcome),
                Err(e) => {
                    warn!("🧹️ Could not verify payment {}. {e}", payment.payment_id);
                    report.errors += 1;
                },
            }
        }
        if report.checked > 0 {
            info!(
                "🧹️ Verified {} open payments: {} settled, {} failed, {} still open, {} errors",
                report.checked, report.settled, report.failed, report.still_open, report.errors
            );
        }
        Ok(report)
    }

    /// Fails pending payments that are older than the timeout and never received a gateway transaction id. The orders
    /// become eligible for a retry.
    pub async fn timeout_pending(&self) -> Result<Vec<Payment>, CheckoutDatabaseError> {
        let expired = self.reconciler.ledger().expire_stale(self.settings.pending_timeout).await?;
        if !expired.is_empty() {
            info!("🧹️ {} stale pending payments timed out", expired.len());
        }
        Ok(expired)
    }

    pub async fn cleanup_old(&self) -> Result<u64, CheckoutDatabaseError> {
        let deleted = self.reconciler.ledger().delete_old_closed(self.settings.cleanup_age).await?;
        info!("🧹️ Removed {deleted} old closed payments");
        Ok(deleted)
    }

    pub async fn stats(&self) -> Result<PaymentStats, CheckoutDatabaseError> {
        self.reconciler.ledger().stats(self.settings.pending_timeout).await
    }
}

fn tally(report: &mut SweepReport, outcome: &ReconcileOutcome) {
    match outcome.status() {
        PaymentStatus::Successful => report.settled += 1,
        PaymentStatus::Pending | PaymentStatus::Processing => report.still_open += 1,
        _ => report.failed += 1,
    }
}
