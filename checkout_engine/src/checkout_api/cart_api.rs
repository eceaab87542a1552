use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Cart, CartItem, CartSnapshot, UserId},
    events::{EventProducers, PushEvent},
    traits::{CartError, CartManagement, QuantityUpdate},
};

/// `CartApi` is the public face of the cart store.
///
/// Every successful mutation is followed by a `CartUpdated` push event carrying the new item count and subtotal.
/// Notification is best-effort: if the snapshot for the event cannot be read, the mutation still succeeds.
pub struct CartApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi")
    }
}

impl<B> CartApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> CartApi<B>
where B: CartManagement
{
    pub async fn cart(&self, user_id: UserId) -> Result<Cart, CartError> {
        self.db.fetch_or_create_cart(user_id).await
    }

    pub async fn snapshot(&self, user_id: UserId) -> Result<CartSnapshot, CartError> {
        self.db.cart_snapshot(user_id).await
    }

    pub async fn add_item(&self, user_id: UserId, product_id: i64, quantity: i64) -> Result<CartItem, CartError> {
        let item = self.db.add_item(user_id, product_id, quantity).await?;
        self.notify(user_id).await;
        Ok(item)
    }

    pub async fn set_item_quantity(
        &self,
        user_id: UserId,
        item_id: i64,
        quantity: i64,
    ) -> Result<Option<CartItem>, CartError> {
        let item = self.db.set_item_quantity(user_id, item_id, quantity).await?;
        self.notify(user_id).await;
        Ok(item)
    }

    pub async fn bulk_set(&self, user_id: UserId, updates: &[QuantityUpdate]) -> Result<Vec<CartItem>, CartError> {
        let items = self.db.bulk_set_quantities(user_id, updates).await?;
        self.notify(user_id).await;
        Ok(items)
    }

    pub async fn remove_item(&self, user_id: UserId, item_id: i64) -> Result<(), CartError> {
        self.db.remove_item(user_id, item_id).await?;
        self.notify(user_id).await;
        Ok(())
    }

    pub async fn clear(&self, user_id: UserId) -> Result<u64, CartError> {
        let removed = self.db.clear_cart(user_id).await?;
        debug!("🛒️ Cleared {removed} items from the cart of user #{user_id}");
        self.producers.publish_push(PushEvent::cart_cleared(user_id));
        Ok(removed)
    }

    async fn notify(&self, user_id: UserId) {
        match self.db.cart_snapshot(user_id).await {
            Ok(snapshot) => self.producers.publish_push(PushEvent::cart_updated(&snapshot)),
            Err(e) => warn!("🛒️ Cart for user #{user_id} changed, but no notification was sent. {e}"),
        }
    }
}
