use std::collections::HashMap;

use serde::Serialize;

use crate::db_types::{Order, OrderItem, OrderStatusType, Payment, PaymentStatus, PaymentMethod, ShippingInfo};

/// What the customer submits at checkout. Totals are never part of it; they are computed from the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

/// The rows written by a successful checkout transaction.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRecord {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
    /// True when the payment was settled inside the checkout itself (cash on delivery).
    pub settled: bool,
}

/// How a new payment attempt for an existing order came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAttempt {
    /// The customer asked to pay for an order that has no payment in flight.
    Pay { order_number: String },
    /// The customer asked to retry a specific failed payment.
    Retry { payment_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub payment: Payment,
    pub order: Order,
    /// False if the order had already been marked paid by another payment.
    pub order_changed: bool,
    pub cart_items_cleared: u64,
}

/// The result of asking for a payment to be marked successful.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled(Settlement),
    /// The payment was already successful, or is in a state that cannot become successful. Nothing was written
    /// beyond (possibly) a review flag.
    Unchanged(Payment),
}

impl SettlementOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            SettlementOutcome::Settled(s) => &s.payment,
            SettlementOutcome::Unchanged(p) => p,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, SettlementOutcome::Settled(_))
    }
}

/// The result of any other payment transition.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied(Payment),
    Unchanged(Payment),
}

impl TransitionOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            TransitionOutcome::Applied(p) | TransitionOutcome::Unchanged(p) => p,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PaymentStats {
    pub by_status: HashMap<PaymentStatus, i64>,
    /// Pending payments without a gateway transaction id that are older than the timeout.
    pub stale_pending: i64,
    pub requires_review: i64,
}

impl PaymentStats {
    pub fn count(&self, status: PaymentStatus) -> i64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.by_status.values().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusChange {
    pub old_status: OrderStatusType,
    pub order: Order,
    pub payments_cancelled: Vec<Payment>,
}
