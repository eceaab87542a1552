use thiserror::Error;

use crate::{
    gateway::GatewayError,
    traits::{CartError, CheckoutDatabaseError},
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Database(#[from] CheckoutDatabaseError),
    #[error("{0}")]
    Cart(#[from] CartError),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    /// Also returned when the thing exists but belongs to somebody else.
    #[error("{0} was not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("Webhook signature is missing or invalid")]
    Unauthorized,
    #[error("Webhook payload could not be read. {0}")]
    MalformedPayload(String),
    #[error("No payment matches the webhook reference {0}")]
    PaymentNotFound(String),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    Database(#[from] CheckoutDatabaseError),
}

impl From<CheckoutError> for WebhookError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Gateway(e) => WebhookError::Gateway(e),
            CheckoutError::Database(e) => WebhookError::Database(e),
            CheckoutError::NotFound(what) => WebhookError::PaymentNotFound(what),
            CheckoutError::Cart(e) => WebhookError::Database(CheckoutDatabaseError::DatabaseError(e.to_string())),
        }
    }
}
