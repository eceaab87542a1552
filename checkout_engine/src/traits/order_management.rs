use crate::{
    db_types::{Order, OrderItem, OrderStatusType, UserId},
    pricing::PricingPolicy,
    traits::{CheckoutDatabaseError, CheckoutRecord, CheckoutRequest, OrderStatusChange},
};

/// Order storage, and the checkout transaction that creates orders.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Freezes the user's cart into a new order, in a single atomic transaction:
    ///
    /// * The cart row is locked first, so concurrent checkouts by the same user serialize.
    /// * Fails with [`CheckoutDatabaseError::EmptyCart`] if there is nothing to buy, and with
    ///   [`CheckoutDatabaseError::DuplicateCheckout`] if this exact cart revision is already waiting for payment.
    /// * Prices the order from the cart contents with `pricing`. Client-supplied totals do not exist.
    /// * Writes the order, one order item per cart line, and a payment row for the full total against `gateway`.
    ///
    /// For gateway payment methods the payment is `pending` and the cart is left intact. For cash on delivery the
    /// payment is settled immediately, the order moves to `processing`, and the cart is emptied.
    ///
    /// If any step fails, nothing is written.
    async fn checkout(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
        pricing: &PricingPolicy,
        gateway: &str,
        currency: &str,
    ) -> Result<CheckoutRecord, CheckoutDatabaseError>;

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, CheckoutDatabaseError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, CheckoutDatabaseError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, CheckoutDatabaseError>;

    /// All orders placed by the user, newest first.
    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutDatabaseError>;

    /// Administrative status change.
    ///
    /// The move must be allowed by [`OrderStatusType::can_transition_to`], and statuses that imply payment require the
    /// order to be paid. Moving to `delivered` sets `completed_at`. Cancelling an order cancels its open payments in
    /// the same transaction.
    async fn update_order_status(
        &self,
        order_number: &str,
        new_status: OrderStatusType,
    ) -> Result<OrderStatusChange, CheckoutDatabaseError>;
}
