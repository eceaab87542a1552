use thiserror::Error;

use crate::db_types::{Cart, CartItem, CartSnapshot, Product, UserId};

/// The most units of a single product a cart line may hold, unless the backend is configured otherwise.
pub const DEFAULT_MAX_LINE_QUANTITY: i64 = 1_000;

#[derive(Debug, Clone, Error)]
pub enum CartError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Quantity must be a positive integer, not {0}")]
    InvalidQuantity(i64),
    #[error("No more than {0} of a product can be in a cart")]
    QuantityLimitExceeded(i64),
    #[error("The cart total is too large to be processed")]
    AmountOutOfRange,
    #[error("Product {0} does not exist or is not available")]
    ProductNotFound(i64),
    #[error("Cart item {0} was not found in your cart")]
    ItemNotFound(i64),
}

impl From<sqlx::Error> for CartError {
    fn from(e: sqlx::Error) -> Self {
        CartError::DatabaseError(e.to_string())
    }
}

/// One entry of a bulk quantity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct QuantityUpdate {
    #[serde(alias = "id")]
    pub item_id: i64,
    pub quantity: i64,
}

/// Per-user cart storage.
///
/// A user has exactly one cart, created lazily. Every method that takes a `user_id` scopes its work to that user's
/// cart, so an item id belonging to somebody else's cart behaves exactly like one that does not exist.
///
/// Every mutating method bumps the cart's `revision`.
#[allow(async_fn_in_trait)]
pub trait CartManagement {
    /// Returns the user's cart, creating it if necessary. Safe to call concurrently for the same user.
    async fn fetch_or_create_cart(&self, user_id: UserId) -> Result<Cart, CartError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CartError>;

    /// Adds `quantity` units of a product. If the product is already in the cart, the quantities are merged.
    ///
    /// Neither `quantity` nor the merged line may exceed the backend's line limit
    /// ([`CartError::QuantityLimitExceeded`]). The cart is left unchanged in that case.
    async fn add_item(&self, user_id: UserId, product_id: i64, quantity: i64) -> Result<CartItem, CartError>;

    /// Sets the quantity of an item. A quantity of zero or less removes the item, and `None` is returned. Quantities
    /// above the line limit are rejected.
    async fn set_item_quantity(
        &self,
        user_id: UserId,
        item_id: i64,
        quantity: i64,
    ) -> Result<Option<CartItem>, CartError>;

    /// Applies every update, or none of them. All entries are validated before the first one is written.
    async fn bulk_set_quantities(
        &self,
        user_id: UserId,
        updates: &[QuantityUpdate],
    ) -> Result<Vec<CartItem>, CartError>;

    async fn remove_item(&self, user_id: UserId, item_id: i64) -> Result<(), CartError>;

    /// Removes every item from the cart. The cart itself remains. Returns the number of items removed.
    async fn clear_cart(&self, user_id: UserId) -> Result<u64, CartError>;

    /// Fails with [`CartError::AmountOutOfRange`] if the subtotal cannot be represented.
    async fn cart_snapshot(&self, user_id: UserId) -> Result<CartSnapshot, CartError>;
}
