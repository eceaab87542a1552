//! `SqliteDatabase` is a concrete implementation of a checkout engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every method that writes more than one row composes the low-level functions from [`super::db`] inside a
//! single transaction, and starts that transaction with a write so that competing writers queue up behind it.
use std::{collections::HashMap, fmt::Debug};

use chrono::Duration;
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{carts, db_url, new_pool, orders, payments, products};
use crate::{
    db_types::{
        Cart,
        CartItem,
        CartSnapshot,
        Money,
        NewOrder,
        NewPayment,
        NewProduct,
        Order,
        OrderItem,
        OrderStatusType,
        Payment,
        PaymentMethod,
        PaymentStatus,
        Product,
        UserId,
    },
    pricing::{PricingError, PricingPolicy},
    traits::{
        CartError,
        CartManagement,
        CheckoutDatabase,
        CheckoutDatabaseError,
        CheckoutRecord,
        CheckoutRequest,
        OrderManagement,
        OrderStatusChange,
        PaymentAttempt,
        PaymentManagement,
        PaymentStats,
        QuantityUpdate,
        Settlement,
        SettlementOutcome,
        TransitionOutcome,
        DEFAULT_MAX_LINE_QUANTITY,
    },
};

const MAX_ORDER_NUMBER_ATTEMPTS: usize = 10;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    max_line_quantity: i64,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl CheckoutDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl CartManagement for SqliteDatabase {
    async fn fetch_or_create_cart(&self, user_id: UserId) -> Result<Cart, CartError> {
        let mut conn = self.pool.acquire().await?;
        let cart = carts::fetch_or_create_cart(user_id, &mut conn).await?;
        Ok(cart)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CartError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_active_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn add_item(&self, user_id: UserId, product_id: i64, quantity: i64) -> Result<CartItem, CartError> {
        self.check_quantity(quantity)?;
        let mut tx = self.pool.begin().await?;
        let cart = carts::fetch_or_create_cart(user_id, &mut tx).await?;
        products::fetch_active_product(product_id, &mut tx).await?.ok_or(CartError::ProductNotFound(product_id))?;
        let item = carts::upsert_item(cart.id, product_id, quantity, self.max_line_quantity, &mut tx)
            .await?
            .ok_or(CartError::QuantityLimitExceeded(self.max_line_quantity))?;
        carts::bump_revision(cart.id, &mut tx).await?;
        tx.commit().await?;
        trace!("🛒️ User #{user_id} added {quantity} of product #{product_id}. Line quantity is now {}", item.quantity);
        Ok(item)
    }

    async fn set_item_quantity(
        &self,
        user_id: UserId,
        item_id: i64,
        quantity: i64,
    ) -> Result<Option<CartItem>, CartError> {
        if quantity > self.max_line_quantity {
            return Err(CartError::QuantityLimitExceeded(self.max_line_quantity));
        }
        let mut tx = self.pool.begin().await?;
        let cart = carts::fetch_or_create_cart(user_id, &mut tx).await?;
        let result = if quantity <= 0 {
            if !carts::delete_item(cart.id, item_id, &mut tx).await? {
                return Err(CartError::ItemNotFound(item_id));
            }
            None
        } else {
            let item = carts::update_item_quantity(cart.id, item_id, quantity, &mut tx)
                .await?
                .ok_or(CartError::ItemNotFound(item_id))?;
            Some(item)
        };
        carts::bump_revision(cart.id, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn bulk_set_quantities(
        &self,
        user_id: UserId,
        updates: &[QuantityUpdate],
    ) -> Result<Vec<CartItem>, CartError> {
        for update in updates {
            self.check_quantity(update.quantity)?;
        }
        let mut tx = self.pool.begin().await?;
        let cart = carts::fetch_or_create_cart(user_id, &mut tx).await?;
        let existing = carts::fetch_items(cart.id, &mut tx).await?;
        if let Some(missing) = updates.iter().find(|u| !existing.iter().any(|i| i.id == u.item_id)) {
            return Err(CartError::ItemNotFound(missing.item_id));
        }
        let mut result = Vec::with_capacity(updates.len());
        for update in updates {
            let item = carts::update_item_quantity(cart.id, update.item_id, update.quantity, &mut tx)
                .await?
                .ok_or(CartError::ItemNotFound(update.item_id))?;
            result.push(item);
        }
        carts::bump_revision(cart.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🛒️ Applied {} quantity updates to the cart of user #{user_id}", result.len());
        Ok(result)
    }

    async fn remove_item(&self, user_id: UserId, item_id: i64) -> Result<(), CartError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::fetch_or_create_cart(user_id, &mut tx).await?;
        if !carts::delete_item(cart.id, item_id, &mut tx).await? {
            return Err(CartError::ItemNotFound(item_id));
        }
        carts::bump_revision(cart.id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64, CartError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::fetch_or_create_cart(user_id, &mut tx).await?;
        let removed = carts::delete_all_items(cart.id, &mut tx).await?;
        carts::bump_revision(cart.id, &mut tx).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn cart_snapshot(&self, user_id: UserId) -> Result<CartSnapshot, CartError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::fetch_or_create_cart(user_id, &mut tx).await?;
        let lines = carts::cart_lines(cart.id, &mut tx).await?;
        tx.commit().await?;
        CartSnapshot::new(&cart, lines).ok_or(CartError::AmountOutOfRange)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn checkout(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
        pricing: &PricingPolicy,
        gateway: &str,
        currency: &str,
    ) -> Result<CheckoutRecord, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::lock_cart(user_id, &mut tx).await?;
        let lines = carts::cart_lines(cart.id, &mut tx).await?;
        if lines.is_empty() {
            return Err(CheckoutDatabaseError::EmptyCart);
        }
        if let Some(existing) = orders::fetch_pending_order_for_revision(user_id, cart.revision, &mut tx).await? {
            debug!("🧾️ Cart #{} (rev {}) is already order {}", cart.id, cart.revision, existing.order_number);
            return Err(CheckoutDatabaseError::DuplicateCheckout(existing.order_number));
        }
        let snapshot = CartSnapshot::new(&cart, lines).ok_or(PricingError::AmountOutOfRange)?;
        let shipping = &request.shipping;
        let price = pricing.compute(snapshot.subtotal, &shipping.state, &shipping.city)?;
        let order_number = unique_order_number(&mut tx).await?;
        let new_order = NewOrder {
            order_number,
            user_id,
            shipping: shipping.clone(),
            customer_phone: request.customer_phone.clone().unwrap_or_default(),
            notes: request.notes.clone().unwrap_or_default(),
            payment_method: request.payment_method,
            subtotal: price.subtotal,
            shipping_fee: price.shipping_fee,
            tax: price.tax,
            total: price.total,
            currency: currency.to_string(),
            cart_revision: cart.revision,
        };
        let order = orders::insert_order(new_order, &mut tx).await?;
        let mut items = Vec::with_capacity(snapshot.items.len());
        for line in &snapshot.items {
            items.push(orders::insert_order_item(order.id, line, &mut tx).await?);
        }
        let record = if request.payment_method.uses_gateway() {
            let new_payment = NewPayment::for_order(&order, gateway, 0);
            let payment = payments::insert_payment(new_payment, PaymentStatus::Pending, &mut tx).await?;
            CheckoutRecord { order, items, payment, settled: false }
        } else {
            let new_payment = NewPayment::for_order(&order, request.payment_method.as_str(), 0);
            let payment = payments::insert_payment(new_payment, PaymentStatus::Successful, &mut tx).await?;
            let order = orders::mark_order_paid(order.id, &payment.payment_id, &mut tx).await?.ok_or_else(|| {
                CheckoutDatabaseError::DatabaseError(format!("Order {} could not be settled", order.order_number))
            })?;
            carts::delete_all_items(cart.id, &mut tx).await?;
            carts::bump_revision(cart.id, &mut tx).await?;
            CheckoutRecord { order, items, payment, settled: true }
        };
        tx.commit().await?;
        info!(
            "🧾️ User #{user_id} checked out {} items as order {} for {} {}",
            snapshot.total_item_count, record.order.order_number, record.order.total, record.order.currency
        );
        Ok(record)
    }

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_number: &str,
        new_status: OrderStatusType,
    ) -> Result<OrderStatusChange, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order_by_number(order_number, &mut tx)
            .await?
            .ok_or_else(|| CheckoutDatabaseError::OrderNotFound(order_number.to_string()))?;
        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(CheckoutDatabaseError::InvalidStatusTransition { from: old_status, to: new_status });
        }
        if new_status.requires_payment() && !order.payment_status {
            return Err(CheckoutDatabaseError::PaymentRequired(order_number.to_string()));
        }
        let payments_cancelled = if new_status == OrderStatusType::Cancelled {
            let reason = format!("Order {order_number} was cancelled");
            payments::cancel_open_payments_for_order(order.id, &reason, &mut tx).await?
        } else {
            vec![]
        };
        let order = orders::update_order_status(order.id, new_status, &mut tx).await?;
        tx.commit().await?;
        info!("🧾️ Order {order_number} moved from {old_status} to {new_status}");
        Ok(OrderStatusChange { old_status, order, payments_cancelled })
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn create_payment_attempt(
        &self,
        attempt: PaymentAttempt,
        gateway: &str,
        max_retries: i64,
    ) -> Result<(Order, Payment), CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let (order, retry_count) = match attempt {
            PaymentAttempt::Pay { order_number } => {
                let order = orders::lock_order_by_number(&order_number, &mut tx)
                    .await?
                    .ok_or(CheckoutDatabaseError::OrderNotFound(order_number))?;
                check_order_is_payable(&order)?;
                if payments::count_open_payments_for_order(order.id, &mut tx).await? > 0 {
                    return Err(CheckoutDatabaseError::PendingPaymentExists(order.order_number));
                }
                let retry_count = match payments::fetch_latest_payment_for_order(order.id, &mut tx).await? {
                    Some(latest) if latest.retry_count >= max_retries => {
                        return Err(CheckoutDatabaseError::RetryLimitReached {
                            payment_id: latest.payment_id,
                            retry_count: latest.retry_count,
                        });
                    },
                    Some(latest) => latest.retry_count + 1,
                    None => 0,
                };
                (order, retry_count)
            },
            PaymentAttempt::Retry { payment_id } => {
                let payment = payments::lock_payment(&payment_id, &mut tx)
                    .await?
                    .ok_or(CheckoutDatabaseError::PaymentNotFound(payment_id))?;
                let order = orders::fetch_order_by_id(payment.order_id, &mut tx)
                    .await?
                    .ok_or_else(|| CheckoutDatabaseError::OrderNotFound(payment.order_id.to_string()))?;
                check_order_is_payable(&order)?;
                let latest = payments::fetch_latest_payment_for_order(order.id, &mut tx).await?;
                if latest.map(|p| p.id) != Some(payment.id) {
                    let msg = "Only the most recent payment attempt for an order can be retried".to_string();
                    return Err(CheckoutDatabaseError::RetryNotAllowed(msg));
                }
                if payment.status != PaymentStatus::Failed {
                    let msg = format!("Only failed payments can be retried, and this one is {}", payment.status);
                    return Err(CheckoutDatabaseError::RetryNotAllowed(msg));
                }
                if payment.retry_count >= max_retries {
                    return Err(CheckoutDatabaseError::RetryLimitReached {
                        payment_id: payment.payment_id,
                        retry_count: payment.retry_count,
                    });
                }
                (order, payment.retry_count + 1)
            },
        };
        let new_payment = NewPayment::for_order(&order, gateway, retry_count);
        let payment = payments::insert_payment(new_payment, PaymentStatus::Pending, &mut tx)
            .await
            .map_err(|e| pending_payment_conflict(e, &order.order_number))?;
        tx.commit().await?;
        debug!("💳️ Payment attempt {} (retry {retry_count}) created for order {}", payment.payment_id, order.order_number);
        Ok((order, payment))
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<Payment>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }

    async fn fetch_payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_user(user_id, &mut conn).await?;
        Ok(payments)
    }

    async fn mark_payment_successful(
        &self,
        payment_id: &str,
        transaction_id: Option<&str>,
        gateway_reference: Option<&str>,
        raw_response: Option<&str>,
    ) -> Result<SettlementOutcome, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            payments::try_mark_successful(payment_id, transaction_id, gateway_reference, raw_response, &mut tx)
                .await?;
        let Some(payment) = updated else {
            let payment = payments::fetch_payment(payment_id, &mut tx)
                .await?
                .ok_or_else(|| CheckoutDatabaseError::PaymentNotFound(payment_id.to_string()))?;
            let payment = if matches!(payment.status, PaymentStatus::Cancelled | PaymentStatus::Refunded) {
                warn!("💳️ The gateway reports payment {payment_id} as successful, but it is {}", payment.status);
                let note = format!("Gateway reported success for a {} payment", payment.status);
                payments::flag_for_review(payment_id, &note, &mut tx).await?.unwrap_or(payment)
            } else {
                trace!("💳️ Payment {payment_id} is already {}. Nothing to do", payment.status);
                payment
            };
            tx.commit().await?;
            return Ok(SettlementOutcome::Unchanged(payment));
        };
        let settlement = match orders::mark_order_paid(payment.order_id, &payment.payment_id, &mut tx).await? {
            Some(order) => {
                let cart_items_cleared = carts::clear_cart_for_user(order.user_id, &mut tx).await?;
                Settlement { payment, order, order_changed: true, cart_items_cleared }
            },
            None => {
                let order = orders::fetch_order_by_id(payment.order_id, &mut tx)
                    .await?
                    .ok_or_else(|| CheckoutDatabaseError::OrderNotFound(payment.order_id.to_string()))?;
                let note = if order.payment_status {
                    format!("Order {} was already paid by another payment", order.order_number)
                } else {
                    format!("Order {} is {} and was not updated", order.order_number, order.status)
                };
                warn!("💳️ Payment {payment_id} succeeded, but it needs a manual review. {note}");
                let payment = payments::flag_for_review(payment_id, &note, &mut tx).await?.unwrap_or(payment);
                Settlement { payment, order, order_changed: false, cart_items_cleared: 0 }
            },
        };
        tx.commit().await?;
        info!(
            "💳️ Payment {payment_id} is successful. Order {} is {}",
            settlement.order.order_number, settlement.order.status
        );
        Ok(SettlementOutcome::Settled(settlement))
    }

    async fn mark_payment_failed(
        &self,
        payment_id: &str,
        error: &str,
        raw_response: Option<&str>,
        requires_review: bool,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError> {
        self.close_open_payment(payment_id, PaymentStatus::Failed, error, raw_response, requires_review).await
    }

    async fn cancel_payment(
        &self,
        payment_id: &str,
        reason: &str,
        raw_response: Option<&str>,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError> {
        self.close_open_payment(payment_id, PaymentStatus::Cancelled, reason, raw_response, false).await
    }

    async fn record_gateway_status(
        &self,
        payment_id: &str,
        transaction_id: Option<&str>,
        raw_response: Option<&str>,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let outcome = match payments::try_record_processing(payment_id, transaction_id, raw_response, &mut tx).await? {
            Some(payment) => TransitionOutcome::Applied(payment),
            None => TransitionOutcome::Unchanged(fetch_existing_payment(payment_id, &mut tx).await?),
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn set_payment_link(&self, payment_id: &str, link: &str) -> Result<(), CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        payments::set_payment_link(payment_id, link, &mut conn).await?;
        Ok(())
    }

    async fn set_transaction_id(&self, payment_id: &str, transaction_id: &str) -> Result<(), CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        payments::set_transaction_id(payment_id, transaction_id, &mut conn).await?;
        Ok(())
    }

    async fn fetch_open_payments_with_tx_id(&self) -> Result<Vec<Payment>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_open_payments_with_tx_id(&mut conn).await?;
        Ok(payments)
    }

    async fn expire_stale_payments(
        &self,
        older_than: Duration,
        error: &str,
    ) -> Result<Vec<Payment>, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let expired = payments::expire_stale_payments(older_than, error, &mut tx).await?;
        tx.commit().await?;
        Ok(expired)
    }

    async fn delete_old_closed_payments(&self, older_than: Duration) -> Result<u64, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let deleted = payments::delete_old_closed_payments(older_than, &mut tx).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn payment_stats(&self, stale_after: Duration) -> Result<PaymentStats, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let by_status: HashMap<PaymentStatus, i64> = payments::count_by_status(&mut conn).await?.into_iter().collect();
        let stale_pending = payments::count_stale_pending(stale_after, &mut conn).await?;
        let requires_review = payments::count_requires_review(&mut conn).await?;
        Ok(PaymentStats { by_status, stale_pending, requires_review })
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool, max_line_quantity: DEFAULT_MAX_LINE_QUANTITY })
    }

    /// Sets the most units of one product a cart line may hold.
    pub fn with_max_line_quantity(mut self, max_line_quantity: i64) -> Self {
        self.max_line_quantity = max_line_quantity.max(1);
        self
    }

    pub fn max_line_quantity(&self) -> i64 {
        self.max_line_quantity
    }

    fn check_quantity(&self, quantity: i64) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        if quantity > self.max_line_quantity {
            return Err(CartError::QuantityLimitExceeded(self.max_line_quantity));
        }
        Ok(())
    }

    /// Brings the schema up to date. Safe to run on every start.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Adds a product to the local catalog mirror.
    pub async fn insert_product(&self, product: NewProduct) -> Result<Product, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    pub async fn set_product_active(&self, product_id: i64, active: bool) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        products::set_product_active(product_id, active, &mut conn).await
    }

    pub async fn set_product_price(&self, product_id: i64, price: Money) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        products::set_product_price(product_id, price, &mut conn).await
    }

    async fn close_open_payment(
        &self,
        payment_id: &str,
        status: PaymentStatus,
        reason: &str,
        raw_response: Option<&str>,
        requires_review: bool,
    ) -> Result<TransitionOutcome, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let closed =
            payments::try_close_open_payment(payment_id, status, reason, raw_response, requires_review, &mut tx)
                .await?;
        let outcome = match closed {
            Some(payment) => {
                debug!("💳️ Payment {payment_id} is now {status}. {reason}");
                TransitionOutcome::Applied(payment)
            },
            None => {
                let payment = fetch_existing_payment(payment_id, &mut tx).await?;
                trace!("💳️ Payment {payment_id} is {} and cannot become {status}", payment.status);
                let payment = if requires_review {
                    payments::flag_for_review(payment_id, reason, &mut tx).await?.unwrap_or(payment)
                } else {
                    payment
                };
                TransitionOutcome::Unchanged(payment)
            },
        };
        tx.commit().await?;
        Ok(outcome)
    }
}

fn check_order_is_payable(order: &Order) -> Result<(), CheckoutDatabaseError> {
    if order.payment_status {
        return Err(CheckoutDatabaseError::OrderAlreadyPaid(order.order_number.clone()));
    }
    if order.status != OrderStatusType::Pending {
        let order_number = order.order_number.clone();
        return Err(CheckoutDatabaseError::OrderClosed { order_number, status: order.status });
    }
    if order.payment_method != PaymentMethod::Flutterwave {
        return Err(CheckoutDatabaseError::RetryNotAllowed(format!(
            "Order {} is paid by {}",
            order.order_number, order.payment_method
        )));
    }
    Ok(())
}

async fn fetch_existing_payment(
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, CheckoutDatabaseError> {
    payments::fetch_payment(payment_id, conn)
        .await?
        .ok_or_else(|| CheckoutDatabaseError::PaymentNotFound(payment_id.to_string()))
}

async fn unique_order_number(conn: &mut SqliteConnection) -> Result<String, CheckoutDatabaseError> {
    for _ in 0..MAX_ORDER_NUMBER_ATTEMPTS {
        let candidate = orders::new_order_number();
        if !orders::order_number_exists(&candidate, &mut *conn).await? {
            return Ok(candidate);
        }
        warn!("🧾️ Order number {candidate} is taken. Trying another");
    }
    Err(CheckoutDatabaseError::OrderNumberExhausted)
}

/// The partial unique index on pending payments is the last line of defence against two in-flight payments.
fn pending_payment_conflict(e: sqlx::Error, order_number: &str) -> CheckoutDatabaseError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            CheckoutDatabaseError::PendingPaymentExists(order_number.to_string())
        },
        _ => e.into(),
    }
}
