//! The seam between the engine and an external payment provider.
//!
//! The engine never talks HTTP itself. A provider integration implements [`PaymentGateway`] and translates its own
//! failures into [`GatewayError`], so that the ledger can tell a retryable network failure from a definite refusal.
use checkout_common::Money;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::db_types::PaymentStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The provider could not be reached, or did not answer in time. Safe to retry.
    #[error("Could not reach the payment gateway. {0}")]
    Network(String),
    /// The provider answered and said no.
    #[error("The payment gateway rejected the request. {message}")]
    Rejected { status: Option<u16>, message: String },
    #[error("The payment gateway did not return a payment link")]
    MissingLink,
    #[error("The payment gateway returned a response we could not read. {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerInfo {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

/// Everything a provider needs to start collecting a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInitRequest {
    /// Our reference for this attempt: the payment id. Never the order number, so each retry is distinct.
    pub tx_ref: String,
    pub amount: Money,
    pub currency: String,
    pub order_number: String,
    pub customer: CustomerInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentLink {
    pub redirect_url: String,
    pub tx_ref: String,
}

/// The provider's status for a transaction, normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayTxStatus {
    Successful,
    Failed,
    Cancelled,
    Pending,
}

impl GatewayTxStatus {
    /// Maps a provider status string. Anything we do not recognise is treated as still pending.
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "successful" | "success" | "completed" => GatewayTxStatus::Successful,
            "failed" | "error" => GatewayTxStatus::Failed,
            "cancelled" | "canceled" => GatewayTxStatus::Cancelled,
            _ => GatewayTxStatus::Pending,
        }
    }

    pub fn as_payment_status(&self) -> PaymentStatus {
        match self {
            GatewayTxStatus::Successful => PaymentStatus::Successful,
            GatewayTxStatus::Failed => PaymentStatus::Failed,
            GatewayTxStatus::Cancelled => PaymentStatus::Cancelled,
            GatewayTxStatus::Pending => PaymentStatus::Processing,
        }
    }
}

/// The authoritative record of a transaction, as reported by the provider's verification endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedTransaction {
    pub transaction_id: String,
    pub tx_ref: String,
    pub status: GatewayTxStatus,
    pub amount: Money,
    pub currency: String,
    pub gateway_reference: Option<String>,
    pub raw: Value,
}

/// A single pluggable payment provider.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Short, stable provider name. Stored on every payment row and used in webhook URLs.
    fn name(&self) -> &str;

    /// Registers a payment with the provider and returns the page the customer should be sent to.
    async fn initialize(&self, request: PaymentInitRequest) -> Result<PaymentLink, GatewayError>;

    /// Fetches the provider's authoritative view of a transaction.
    async fn verify(&self, transaction_id: &str) -> Result<VerifiedTransaction, GatewayError>;

    /// Checks a webhook signature against the raw request body. Implementations must compare in constant time.
    fn validate_signature(&self, raw_body: &[u8], signature: &str) -> bool;
}
