//! Applies the gateway's authoritative view of a transaction to our payment ledger.
//!
//! The webhook handler, the customer's verification poll and the sweeper all end up here, possibly at the same time
//! for the same payment. That is safe because every ledger transition is conditional on the current status.
use std::fmt::Debug;

use checkout_common::Money;
use log::*;

use crate::{
    checkout_api::{errors::CheckoutError, objects::ReconcileOutcome, payment_ledger_api::PaymentLedgerApi},
    db_types::Payment,
    events::EventProducers,
    gateway::{GatewayTxStatus, PaymentGateway, VerifiedTransaction},
    traits::{CheckoutDatabase, CheckoutDatabaseError},
};

pub struct Reconciler<B, G> {
    ledger: PaymentLedgerApi<B>,
    gateway: G,
}

impl<B, G> Debug for Reconciler<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reconciler")
    }
}

impl<B, G> Reconciler<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { ledger: PaymentLedgerApi::new(db, producers), gateway }
    }

    pub fn ledger(&self) -> &PaymentLedgerApi<B> {
        &self.ledger
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> Reconciler<B, G>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    /// Asks the gateway for the transaction and applies the answer. Gateway failures change nothing.
    pub async fn verify_and_apply(
        &self,
        payment: &Payment,
        transaction_id: &str,
        declared_amount: Option<Money>,
    ) -> Result<ReconcileOutcome, CheckoutError> {
        let verified = self.gateway.verify(transaction_id).await?;
        trace!("💳️ Gateway reports transaction {transaction_id} as {:?}", verified.status);
        let outcome = self.apply_verified(payment, &verified, declared_amount).await?;
        Ok(outcome)
    }

    /// Applies a verified transaction to the payment.
    ///
    /// A success is only accepted if the transaction belongs to this payment, and the verified amount and currency
    /// agree with the payment (and with `declared_amount`, the amount a webhook claimed, if there was one). An amount
    /// disagreement fails the payment and flags it for review.
    pub async fn apply_verified(
        &self,
        payment: &Payment,
        verified: &VerifiedTransaction,
        declared_amount: Option<Money>,
    ) -> Result<ReconcileOutcome, CheckoutDatabaseError> {
        let payment_id = payment.payment_id.as_str();
        if verified.tx_ref != payment.tx_ref() {
            warn!(
                "💳️ Transaction {} belongs to {}, not payment {payment_id}. Ignoring it",
                verified.transaction_id, verified.tx_ref
            );
            return Ok(ReconcileOutcome::ReferenceMismatch {
                payment: payment.clone(),
                verified_tx_ref: verified.tx_ref.clone(),
            });
        }
        let raw = serde_json::to_string(&verified.raw).ok();
        let raw = raw.as_deref();
        let tx_id = Some(verified.transaction_id.as_str());
        let outcome = match verified.status {
            GatewayTxStatus::Successful => {
                let amount_ok =
                    verified.amount == payment.amount && declared_amount.map_or(true, |d| d == verified.amount);
                let currency_ok = verified.currency.eq_ignore_ascii_case(&payment.currency);
                if !(amount_ok && currency_ok) {
                    return self.reject_amount(payment, verified, declared_amount, raw).await;
                }
                let reference = verified.gateway_reference.as_deref();
                let result = self.ledger.mark_successful(payment_id, tx_id, reference, raw).await?;
                ReconcileOutcome::Settled { result }
            },
            GatewayTxStatus::Failed => {
                self.ledger.set_transaction_id(payment_id, &verified.transaction_id).await?;
                let error = "The gateway reported the payment as failed";
                let result = self.ledger.mark_failed(payment_id, error, raw, false).await?;
                ReconcileOutcome::Transitioned { result }
            },
            GatewayTxStatus::Cancelled => {
                self.ledger.set_transaction_id(payment_id, &verified.transaction_id).await?;
                let result = self.ledger.cancel(payment_id, "The payment was cancelled at the gateway", raw).await?;
                ReconcileOutcome::Transitioned { result }
            },
            GatewayTxStatus::Pending => {
                let result = self.ledger.record_gateway_status(payment_id, tx_id, raw).await?;
                ReconcileOutcome::Transitioned { result }
            },
        };
        Ok(outcome)
    }

    async fn reject_amount(
        &self,
        payment: &Payment,
        verified: &VerifiedTransaction,
        declared: Option<Money>,
        raw: Option<&str>,
    ) -> Result<ReconcileOutcome, CheckoutDatabaseError> {
        let declared_str = declared.map(|d| d.to_string()).unwrap_or_else(|| "nothing".into());
        let error = format!(
            "Amount mismatch: expected {} {}, gateway verified {} {}, notification declared {declared_str}",
            payment.amount, payment.currency, verified.amount, verified.currency
        );
        error!("💳️ SECURITY: payment {}. {error}", payment.payment_id);
        self.ledger.set_transaction_id(&payment.payment_id, &verified.transaction_id).await?;
        let result = self.ledger.mark_failed(&payment.payment_id, &error, raw, true).await?;
        Ok(ReconcileOutcome::AmountMismatch {
            payment: result.payment().clone(),
            expected: payment.amount,
            verified: verified.amount,
            declared,
        })
    }
}
