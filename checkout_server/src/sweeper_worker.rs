use std::time::Duration;

use checkout_engine::{gateway::PaymentGateway, traits::CheckoutDatabase, SqliteDatabase, SweeperApi};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::flutterwave::FlutterwaveGateway;

/// Starts the payment sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick first asks the gateway about open payments it knows of, then times out the payments that never reached
/// it. The order matters: a payment the gateway has seen is never timed out from under it.
pub fn start_sweeper_worker(
    api: SweeperApi<SqliteDatabase, FlutterwaveGateway>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🧹️ Payment sweeper started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            run_sweep(&api).await;
        }
    })
}

pub async fn run_sweep<B, G>(api: &SweeperApi<B, G>)
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    debug!("🧹️ Running payment sweep");
    match api.verify_pending().await {
        Ok(report) => {
            info!(
                "🧹️ Verified {} open payments: {} settled, {} failed, {} still open, {} errors",
                report.checked, report.settled, report.failed, report.still_open, report.errors
            );
        },
        Err(e) => error!("🧹️ Error verifying open payments: {e}"),
    }
    match api.timeout_pending().await {
        Ok(expired) if expired.is_empty() => trace!("🧹️ No abandoned payments"),
        Ok(expired) => {
            let ids = expired.iter().map(|p| p.payment_id.as_str()).collect::<Vec<_>>().join(", ");
            info!("🧹️ {} abandoned payments timed out: {ids}", expired.len());
        },
        Err(e) => error!("🧹️ Error timing out abandoned payments: {e}"),
    }
    match api.stats().await {
        Ok(stats) if stats.requires_review > 0 => {
            warn!("🧹️ {} payments are waiting for manual review", stats.requires_review)
        },
        Ok(stats) => trace!("🧹️ {} payments on record", stats.total()),
        Err(e) => error!("🧹️ Could not collect payment statistics: {e}"),
    }
}
