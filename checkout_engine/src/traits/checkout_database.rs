use thiserror::Error;

use crate::{
    db_types::OrderStatusType,
    pricing::PricingError,
    traits::{CartManagement, OrderManagement, PaymentManagement},
};

/// Broad classes of failure, used by callers to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input. Do not retry.
    Validation,
    /// The request is well-formed, but the current state does not allow it.
    Conflict,
    NotFound,
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutDatabaseError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("{0}")]
    Pricing(#[from] PricingError),
    #[error("This cart has already been checked out as order {0}, which is awaiting payment")]
    DuplicateCheckout(String),
    #[error("Could not generate a unique order number")]
    OrderNumberExhausted,
    #[error("Order {0} does not exist")]
    OrderNotFound(String),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Order {0} has already been paid")]
    OrderAlreadyPaid(String),
    #[error("Order {order_number} is {status} and can no longer be paid for")]
    OrderClosed { order_number: String, status: OrderStatusType },
    #[error("Order {0} already has a payment in progress")]
    PendingPaymentExists(String),
    #[error("Payment {payment_id} has been retried {retry_count} times, which is the limit")]
    RetryLimitReached { payment_id: String, retry_count: i64 },
    #[error("Payment cannot be retried. {0}")]
    RetryNotAllowed(String),
    #[error("An order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} must be paid before it can move to that status")]
    PaymentRequired(String),
}

impl CheckoutDatabaseError {
    pub fn kind(&self) -> ErrorKind {
        use CheckoutDatabaseError::*;
        match self {
            DatabaseError(_) | OrderNumberExhausted => ErrorKind::Internal,
            Pricing(_) | InvalidStatusTransition { .. } => ErrorKind::Validation,
            EmptyCart |
            DuplicateCheckout(_) |
            OrderAlreadyPaid(_) |
            OrderClosed { .. } |
            PendingPaymentExists(_) |
            RetryLimitReached { .. } |
            RetryNotAllowed(_) |
            PaymentRequired(_) => ErrorKind::Conflict,
            OrderNotFound(_) | PaymentNotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl From<sqlx::Error> for CheckoutDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        CheckoutDatabaseError::DatabaseError(e.to_string())
    }
}

/// The complete set of behaviour a storage backend needs to provide to run the checkout engine.
#[allow(async_fn_in_trait)]
pub trait CheckoutDatabase: Clone + CartManagement + OrderManagement + PaymentManagement {
    /// The URL of the database
    fn url(&self) -> &str;
}
