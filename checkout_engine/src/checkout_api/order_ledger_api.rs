use std::fmt::Debug;

use log::*;

use crate::{
    checkout_api::objects::OrderDetail,
    db_types::{Order, OrderStatusType, UserId},
    events::{EventProducers, PushEvent},
    traits::{CheckoutDatabase, CheckoutDatabaseError},
};

/// Read access to orders, and the administrative status changes.
pub struct OrderLedgerApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderLedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLedgerApi")
    }
}

impl<B> OrderLedgerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderLedgerApi<B>
where B: CheckoutDatabase
{
    pub async fn fetch_order(&self, order_number: &str) -> Result<Option<Order>, CheckoutDatabaseError> {
        self.db.fetch_order_by_number(order_number).await
    }

    /// The order with its frozen line items and every payment attempt, oldest first.
    pub async fn order_detail(&self, order_number: &str) -> Result<Option<OrderDetail>, CheckoutDatabaseError> {
        let Some(order) = self.db.fetch_order_by_number(order_number).await? else {
            return Ok(None);
        };
        let items = self.db.fetch_order_items(order.id).await?;
        let payments = self.db.fetch_payments_for_order(order.id).await?;
        Ok(Some(OrderDetail { order, items, payments }))
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutDatabaseError> {
        self.db.fetch_orders_for_user(user_id).await
    }

    pub async fn update_status(
        &self,
        order_number: &str,
        new_status: OrderStatusType,
    ) -> Result<Order, CheckoutDatabaseError> {
        let change = self.db.update_order_status(order_number, new_status).await?;
        for payment in &change.payments_cancelled {
            debug!("🧾️ Payment {} cancelled along with order {order_number}", payment.payment_id);
            self.producers.publish_push(PushEvent::payment_updated(payment, order_number));
        }
        self.producers.publish_push(PushEvent::order_updated(&change.order));
        Ok(change.order)
    }
}
