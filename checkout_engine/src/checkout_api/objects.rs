use std::time::Duration;

use checkout_common::Money;
use serde::Serialize;
use serde_json::Value;

use crate::{
    db_types::{Order, OrderItem, OrderStatusType, Payment, PaymentStatus},
    traits::{SettlementOutcome, TransitionOutcome},
};

/// Tunables for the payment side of the checkout flow.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    /// A failed payment may be retried while its `retry_count` is below this.
    pub max_retries: i64,
    /// How many times a payment initialization is attempted when the gateway cannot be reached.
    pub network_attempts: u32,
    /// Wait before the second attempt. Doubles for each further attempt.
    pub network_backoff: Duration,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: checkout_common::DEFAULT_CURRENCY_CODE.to_string(),
            max_retries: 3,
            network_attempts: 3,
            network_backoff: Duration::from_millis(250),
        }
    }
}

/// What the customer gets back from checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
    /// Where to send the customer to pay. `None` for cash on delivery, or if the gateway could not be reached.
    pub payment_link: Option<String>,
    /// Set if the order was created but the payment could not be started. The order can be paid for later.
    pub payment_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInitiation {
    pub payment_link: String,
    pub payment_id: String,
    pub tx_ref: String,
    pub retry_count: i64,
}

impl PaymentInitiation {
    pub fn new(payment: &Payment, payment_link: String) -> Self {
        Self {
            payment_link,
            payment_id: payment.payment_id.clone(),
            tx_ref: payment.tx_ref().to_string(),
            retry_count: payment.retry_count,
        }
    }
}

/// The stored state of a payment and its order.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusReport {
    pub payment: Payment,
    pub order_number: String,
    pub order_status: OrderStatusType,
    pub order_paid: bool,
    pub can_retry: bool,
}

impl PaymentStatusReport {
    pub fn new(payment: Payment, order: &Order, max_retries: i64) -> Self {
        let can_retry = payment.can_retry(max_retries) && !order.payment_status && !order.status.is_terminal();
        Self {
            payment,
            order_number: order.order_number.clone(),
            order_status: order.status,
            order_paid: order.payment_status,
            can_retry,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

/// The result of bringing a payment into line with the gateway's record of it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Settled { result: SettlementOutcome },
    Transitioned { result: TransitionOutcome },
    /// The gateway's amount disagreed with ours. The payment has been failed and flagged for review.
    AmountMismatch { payment: Payment, expected: Money, verified: Money, declared: Option<Money> },
    /// The gateway transaction belongs to a different payment. Nothing was changed.
    ReferenceMismatch { payment: Payment, verified_tx_ref: String },
}

impl ReconcileOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            ReconcileOutcome::Settled { result } => result.payment(),
            ReconcileOutcome::Transitioned { result } => result.payment(),
            ReconcileOutcome::AmountMismatch { payment, .. } => payment,
            ReconcileOutcome::ReferenceMismatch { payment, .. } => payment,
        }
    }

    pub fn status(&self) -> PaymentStatus {
        self.payment().status
    }
}

/// A gateway-pushed status notification, normalised.
///
/// Providers either send the transaction fields at the top level, or wrap them in a `data` object next to an `event`
/// name. Both shapes are accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub tx_ref: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub amount: Option<Money>,
    pub currency: Option<String>,
    pub raw: Value,
}

impl WebhookEvent {
    pub fn from_slice(raw_body: &[u8]) -> Result<Self, String> {
        let raw: Value = serde_json::from_slice(raw_body).map_err(|e| e.to_string())?;
        let data = match raw.get("data") {
            Some(d) if d.is_object() => d,
            _ => &raw,
        };
        let tx_ref = string_field(data, &["tx_ref", "txRef"]).ok_or("Missing tx_ref")?;
        let status = string_field(data, &["status"]).ok_or("Missing status")?;
        let transaction_id = string_field(data, &["id", "transaction_id"]);
        let amount = match data.get("amount") {
            None | Some(Value::Null) => None,
            Some(v) => Some(serde_json::from_value::<Money>(v.clone()).map_err(|e| format!("Invalid amount. {e}"))?),
        };
        let currency = string_field(data, &["currency"]);
        Ok(Self { tx_ref, status, transaction_id, amount, currency, raw })
    }

    /// Identifies this notification for replay detection. The status is part of the key, so that a "pending" event
    /// does not mask the "successful" one that follows it.
    pub fn dedup_key(&self) -> String {
        let id = self.transaction_id.as_deref().unwrap_or("-");
        format!("webhook:{}:{id}:{}", self.tx_ref, self.status.to_ascii_lowercase())
    }
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match value.get(*name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub settled: usize,
    pub failed: usize,
    pub still_open: usize,
    pub errors: usize,
}
