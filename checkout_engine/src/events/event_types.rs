use serde::Serialize;

use crate::db_types::{CartSnapshot, Money, Order, OrderStatusType, Payment, PaymentStatus, UserId};

/// A state change that a connected client may want to see. Delivery is best-effort and at-most-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushEvent {
    pub user_id: UserId,
    #[serde(flatten)]
    pub kind: PushEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEventKind {
    CartUpdated { item_count: i64, subtotal: Money },
    PaymentUpdated { payment_id: String, order_number: String, status: PaymentStatus },
    OrderUpdated { order_number: String, status: OrderStatusType, payment_status: bool },
}

impl PushEvent {
    pub fn cart_updated(snapshot: &CartSnapshot) -> Self {
        Self {
            user_id: snapshot.user_id,
            kind: PushEventKind::CartUpdated { item_count: snapshot.total_item_count, subtotal: snapshot.subtotal },
        }
    }

    pub fn cart_cleared(user_id: UserId) -> Self {
        Self { user_id, kind: PushEventKind::CartUpdated { item_count: 0, subtotal: Money::default() } }
    }

    pub fn payment_updated(payment: &Payment, order_number: &str) -> Self {
        Self {
            user_id: payment.user_id,
            kind: PushEventKind::PaymentUpdated {
                payment_id: payment.payment_id.clone(),
                order_number: order_number.to_string(),
                status: payment.status,
            },
        }
    }

    pub fn order_updated(order: &Order) -> Self {
        Self {
            user_id: order.user_id,
            kind: PushEventKind::OrderUpdated {
                order_number: order.order_number.clone(),
                status: order.status,
                payment_status: order.payment_status,
            },
        }
    }
}

/// Emitted exactly once per order, when its payment settles. Hook point for confirmation emails and the like.
#[derive(Debug, Clone)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub payment: Payment,
}

impl OrderPaidEvent {
    pub fn new(order: Order, payment: Payment) -> Self {
        Self { order, payment }
    }
}
