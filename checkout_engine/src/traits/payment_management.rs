use chrono::Duration;

use crate::{
    db_types::{Order, Payment, UserId},
    traits::{CheckoutDatabaseError, PaymentAttempt, PaymentStats, SettlementOutcome, TransitionOutcome},
};

/// Payment storage and the payment state machine.
///
/// Every transition method is safe to call more than once, and from several tasks at the same time. The current status
/// is checked in the same statement that changes it, so side effects of a transition (settling the order, emptying
/// the cart) happen at most once, no matter how many callers race. A call that finds the payment already in (or past)
/// the target state returns an `Unchanged` outcome rather than an error.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Creates a new `pending` payment row for an existing order.
    ///
    /// * [`PaymentAttempt::Pay`] refuses orders that are paid, closed, or already have a payment in flight.
    /// * [`PaymentAttempt::Retry`] only accepts the newest payment of its order, only if it has `failed`, and only if
    ///   its `retry_count` is below `max_retries`. The new row carries `retry_count + 1`. The failed row is kept.
    ///
    /// Returns the order and the new payment.
    async fn create_payment_attempt(
        &self,
        attempt: PaymentAttempt,
        gateway: &str,
        max_retries: i64,
    ) -> Result<(Order, Payment), CheckoutDatabaseError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<Payment>, CheckoutDatabaseError>;

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, CheckoutDatabaseError>;

    /// All of the user's payments, newest first.
    async fn fetch_payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, CheckoutDatabaseError>;

    /// Moves the payment to `successful`. When that move happens, and in the same transaction, the owning order is
    /// marked paid (`pending` orders advance to `processing`) and the user's cart is emptied.
    ///
    /// If the order was already settled by another payment, or has been cancelled in the meantime, the payment is
    /// still recorded as successful but is flagged for review instead of touching the order.
    async fn mark_payment_successful(
        &self,
        payment_id: &str,
        transaction_id: Option<&str>,
        gateway_reference: Option<&str>,
        raw_response: Option<&str>,
    ) -> Result<SettlementOutcome, CheckoutDatabaseError>;

    /// Moves an open (`pending` or `processing`) payment to `failed`. Never touches the order.
    async fn mark_payment_failed(
        &self,
        payment_id: &str,
        error: &str,
        raw_response: Option<&str>,
        requires_review: bool,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError>;

    /// Moves an open payment to `cancelled`.
    async fn cancel_payment(
        &self,
        payment_id: &str,
        reason: &str,
        raw_response: Option<&str>,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError>;

    /// Records a non-final gateway status: the payment moves from `pending` to `processing`, and the transaction id
    /// and raw response are stored. Final states are left alone.
    async fn record_gateway_status(
        &self,
        payment_id: &str,
        transaction_id: Option<&str>,
        raw_response: Option<&str>,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError>;

    async fn set_payment_link(&self, payment_id: &str, link: &str) -> Result<(), CheckoutDatabaseError>;

    /// Stores the gateway's transaction id, if one has not been recorded yet.
    async fn set_transaction_id(&self, payment_id: &str, transaction_id: &str) -> Result<(), CheckoutDatabaseError>;

    /// Open payments that the gateway has assigned a transaction id, oldest first.
    async fn fetch_open_payments_with_tx_id(&self) -> Result<Vec<Payment>, CheckoutDatabaseError>;

    /// Fails every `pending` payment older than `older_than` that never received a gateway transaction id.
    /// Returns the payments that were expired.
    async fn expire_stale_payments(
        &self,
        older_than: Duration,
        error: &str,
    ) -> Result<Vec<Payment>, CheckoutDatabaseError>;

    /// Deletes `failed` and `cancelled` payments older than `older_than`, except the newest payment of each order.
    async fn delete_old_closed_payments(&self, older_than: Duration) -> Result<u64, CheckoutDatabaseError>;

    async fn payment_stats(&self, stale_after: Duration) -> Result<PaymentStats, CheckoutDatabaseError>;
}
