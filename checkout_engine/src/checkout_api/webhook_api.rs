use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    checkout_api::{
        errors::WebhookError,
        objects::{ReconcileOutcome, WebhookEvent},
        reconcile::Reconciler,
    },
    events::EventProducers,
    gateway::{GatewayTxStatus, PaymentGateway},
    idempotency::IdempotencyStore,
    traits::CheckoutDatabase,
};

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// This exact notification was handled recently. Nothing was done.
    Duplicate,
    Applied(ReconcileOutcome),
}

/// `WebhookApi` handles status notifications pushed by the payment gateway.
///
/// Nothing in a notification is trusted until its signature checks out, and a claimed success is never applied
/// without first asking the gateway for the authoritative record.
pub struct WebhookApi<B, G, S> {
    reconciler: Reconciler<B, G>,
    dedup: S,
    dedup_ttl: Duration,
}

impl<B, G, S> Debug for WebhookApi<B, G, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B, G, S> WebhookApi<B, G, S> {
    pub fn new(db: B, gateway: G, dedup: S, dedup_ttl: Duration, producers: EventProducers) -> Self {
        Self { reconciler: Reconciler::new(db, gateway, producers), dedup, dedup_ttl }
    }
}

impl<B, G, S> WebhookApi<B, G, S>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
    S: IdempotencyStore,
{
    pub fn gateway_name(&self) -> &str {
        self.reconciler.gateway().name()
    }

    pub async fn handle(&self, raw_body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome, WebhookError> {
        let gateway = self.reconciler.gateway();
        if !signature.is_some_and(|sig| gateway.validate_signature(raw_body, sig)) {
            warn!("🪝️ SECURITY: rejected a {} webhook with a missing or invalid signature", gateway.name());
            return Err(WebhookError::Unauthorized);
        }
        let event = WebhookEvent::from_slice(raw_body).map_err(WebhookError::MalformedPayload)?;
        let key = event.dedup_key();
        // The key is only marked once the delivery has been applied, so concurrent copies of one delivery can both
        // get past this check. The ledger's status guards turn the later copy into a no-op transition.
        if self.dedup.contains(&key).await {
            info!("🪝️ Webhook {key} has already been handled. Skipping it");
            return Ok(WebhookOutcome::Duplicate);
        }
        let ledger = self.reconciler.ledger();
        let payment = ledger
            .fetch_payment(&event.tx_ref)
            .await?
            .ok_or_else(|| WebhookError::PaymentNotFound(event.tx_ref.clone()))?;
        let raw = serde_json::to_string(&event.raw).ok();
        let raw = raw.as_deref();
        let payment_id = payment.payment_id.as_str();
        debug!("🪝️ Webhook reports payment {payment_id} as '{}'", event.status);
        let outcome = match GatewayTxStatus::from_provider(&event.status) {
            GatewayTxStatus::Successful => {
                let tx_id = event.transaction_id.as_deref().ok_or_else(|| {
                    WebhookError::MalformedPayload("A successful payment notification must carry an id".into())
                })?;
                self.reconciler.verify_and_apply(&payment, tx_id, event.amount).await?
            },
            GatewayTxStatus::Failed => {
                if let Some(tx_id) = event.transaction_id.as_deref() {
                    ledger.set_transaction_id(payment_id, tx_id).await?;
                }
                let error = format!("The gateway reported the payment as {}", event.status);
                ReconcileOutcome::Transitioned { result: ledger.mark_failed(payment_id, &error, raw, false).await? }
            },
            GatewayTxStatus::Cancelled => {
                if let Some(tx_id) = event.transaction_id.as_deref() {
                    ledger.set_transaction_id(payment_id, tx_id).await?;
                }
                let reason = "The payment was cancelled at the gateway";
                ReconcileOutcome::Transitioned { result: ledger.cancel(payment_id, reason, raw).await? }
            },
            GatewayTxStatus::Pending => {
                let tx_id = event.transaction_id.as_deref();
                ReconcileOutcome::Transitioned { result: ledger.record_gateway_status(payment_id, tx_id, raw).await? }
            },
        };
        self.dedup.set_if_absent(&key, self.dedup_ttl).await;
        info!("🪝️ Webhook for payment {payment_id} handled. Payment is {}", outcome.status());
        Ok(WebhookOutcome::Applied(outcome))
    }
}
