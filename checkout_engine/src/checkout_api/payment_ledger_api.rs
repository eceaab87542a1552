use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{Payment, UserId},
    events::{EventProducers, OrderPaidEvent, PushEvent},
    traits::{CheckoutDatabase, CheckoutDatabaseError, PaymentStats, Settlement, SettlementOutcome, TransitionOutcome},
};

/// `PaymentLedgerApi` is the only way payment rows change state.
///
/// It wraps the backend's transition methods and publishes the resulting events. Events are only published for
/// transitions that were actually applied, so a transition that loses a race (or is replayed) is silent.
pub struct PaymentLedgerApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PaymentLedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentLedgerApi")
    }
}

impl<B> PaymentLedgerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> PaymentLedgerApi<B>
where B: CheckoutDatabase
{
    pub async fn fetch_payment(&self, payment_id: &str) -> Result<Option<Payment>, CheckoutDatabaseError> {
        self.db.fetch_payment(payment_id).await
    }

    pub async fn payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, CheckoutDatabaseError> {
        self.db.fetch_payments_for_user(user_id).await
    }

    pub async fn mark_successful(
        &self,
        payment_id: &str,
        transaction_id: Option<&str>,
        gateway_reference: Option<&str>,
        raw_response: Option<&str>,
    ) -> Result<SettlementOutcome, CheckoutDatabaseError> {
        let outcome =
            self.db.mark_payment_successful(payment_id, transaction_id, gateway_reference, raw_response).await?;
        if let SettlementOutcome::Settled(settlement) = &outcome {
            self.notify_settlement(settlement);
        }
        Ok(outcome)
    }

    pub async fn mark_failed(
        &self,
        payment_id: &str,
        error: &str,
        raw_response: Option<&str>,
        requires_review: bool,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError> {
        let outcome = self.db.mark_payment_failed(payment_id, error, raw_response, requires_review).await?;
        if let TransitionOutcome::Applied(payment) = &outcome {
            info!("💳️ Payment {payment_id} failed. {error}");
            self.notify_payment(payment).await;
        }
        Ok(outcome)
    }

    pub async fn cancel(
        &self,
        payment_id: &str,
        reason: &str,
        raw_response: Option<&str>,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError> {
        let outcome = self.db.cancel_payment(payment_id, reason, raw_response).await?;
        if let TransitionOutcome::Applied(payment) = &outcome {
            info!("💳️ Payment {payment_id} was cancelled. {reason}");
            self.notify_payment(payment).await;
        }
        Ok(outcome)
    }

    pub async fn record_gateway_status(
        &self,
        payment_id: &str,
        transaction_id: Option<&str>,
        raw_response: Option<&str>,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError> {
        let outcome = self.db.record_gateway_status(payment_id, transaction_id, raw_response).await?;
        if let TransitionOutcome::Applied(payment) = &outcome {
            self.notify_payment(payment).await;
        }
        Ok(outcome)
    }

    pub async fn set_payment_link(&self, payment_id: &str, link: &str) -> Result<(), CheckoutDatabaseError> {
        self.db.set_payment_link(payment_id, link).await
    }

    pub async fn set_transaction_id(
        &self,
        payment_id: &str,
        transaction_id: &str,
    ) -> Result<(), CheckoutDatabaseError> {
        self.db.set_transaction_id(payment_id, transaction_id).await
    }

    pub async fn open_payments_with_tx_id(&self) -> Result<Vec<Payment>, CheckoutDatabaseError> {
        self.db.fetch_open_payments_with_tx_id().await
    }

    /// Fails pending payments that never reached the gateway within `timeout`.
    pub async fn expire_stale(&self, timeout: Duration) -> Result<Vec<Payment>, CheckoutDatabaseError> {
        let error = format!("Payment timed out after {} minutes", timeout.num_minutes());
        let expired = self.db.expire_stale_payments(timeout, &error).await?;
        for payment in &expired {
            self.notify_payment(payment).await;
        }
        Ok(expired)
    }

    pub async fn delete_old_closed(&self, older_than: Duration) -> Result<u64, CheckoutDatabaseError> {
        self.db.delete_old_closed_payments(older_than).await
    }

    pub async fn stats(&self, stale_after: Duration) -> Result<PaymentStats, CheckoutDatabaseError> {
        self.db.payment_stats(stale_after).await
    }

    pub(crate) fn notify_settlement(&self, settlement: &Settlement) {
        let Settlement { payment, order, order_changed, .. } = settlement;
        self.producers.publish_push(PushEvent::payment_updated(payment, &order.order_number));
        if *order_changed {
            self.producers.publish_push(PushEvent::order_updated(order));
            self.producers.publish_push(PushEvent::cart_cleared(order.user_id));
            debug!("📬️ Notifying order paid hook subscribers");
            self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), payment.clone()));
        }
    }

    async fn notify_payment(&self, payment: &Payment) {
        match self.db.fetch_order_by_id(payment.order_id).await {
            Ok(Some(order)) => {
                self.producers.publish_push(PushEvent::payment_updated(payment, &order.order_number));
            },
            Ok(None) => warn!("💳️ Payment {} has no order. No notification sent", payment.payment_id),
            Err(e) => warn!("💳️ Could not notify the owner of payment {}. {e}", payment.payment_id),
        }
    }
}
