use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{CartLine, NewOrder, Order, OrderItem, OrderStatusType, UserId};

/// Generates a candidate order number: `ORD-` followed by 8 uppercase hex digits.
pub fn new_order_number() -> String {
    format!("ORD-{:08X}", rand::random::<u32>())
}

pub async fn order_number_exists(order_number: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE order_number = $1")
        .bind(order_number)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                user_id,
                shipping_address,
                shipping_city,
                shipping_state,
                shipping_country,
                shipping_zip_code,
                customer_phone,
                notes,
                payment_method,
                subtotal,
                shipping_fee,
                tax,
                total,
                currency,
                cart_revision
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *;
        "#,
    )
    .bind(order.order_number)
    .bind(order.user_id)
    .bind(order.shipping.address)
    .bind(order.shipping.city)
    .bind(order.shipping.state)
    .bind(order.shipping.country)
    .bind(order.shipping.zip_code)
    .bind(order.customer_phone)
    .bind(order.notes)
    .bind(order.payment_method)
    .bind(order.subtotal)
    .bind(order.shipping_fee)
    .bind(order.tax)
    .bind(order.total)
    .bind(order.currency)
    .bind(order.cart_revision)
    .fetch_one(conn)
    .await?;
    debug!("🧾️ Order [{}] inserted with id {}", order.order_number, order.id);
    Ok(order)
}

/// Copies a cart line into the order. Product display fields are copied as they are right now.
pub async fn insert_order_item(
    order_id: i64,
    line: &CartLine,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, product_name, product_price, description, image_url, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(&line.product_name)
    .bind(line.unit_price)
    .bind(&line.description)
    .bind(&line.image_url)
    .bind(line.quantity)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order_by_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches the order and takes the write lock on it, so that the rest of the transaction sees a stable row.
pub async fn lock_order_by_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("UPDATE orders SET updated_at = updated_at WHERE order_number = $1 RETURNING *")
        .bind(order_number)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn fetch_orders_for_user(user_id: UserId, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Finds an unpaid, still pending order that was made from the given revision of the user's cart.
pub async fn fetch_pending_order_for_revision(
    user_id: UserId,
    cart_revision: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE user_id = $1 AND cart_revision = $2 AND status = 'pending' AND payment_status = 0
            ORDER BY id DESC LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(cart_revision)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Marks the order as paid. `pending` orders advance to `processing`; later statuses are left as they are.
///
/// Returns `None` if the order was already paid, so the caller knows it did not make the change.
pub async fn mark_order_paid(
    order_id: i64,
    payment_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                payment_status = 1,
                paid_at = COALESCE(paid_at, CURRENT_TIMESTAMP),
                payment_reference = $1,
                status = CASE WHEN status = 'pending' THEN 'processing' ELSE status END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND payment_status = 0 AND status NOT IN ('cancelled', 'refunded')
            RETURNING *;
        "#,
    )
    .bind(payment_reference)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    if order.is_some() {
        trace!("🧾️ Order #{order_id} marked as paid");
    }
    Ok(order)
}

/// Unconditionally sets the order status. Callers check that the move is allowed.
pub async fn update_order_status(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                completed_at = CASE WHEN $1 = 'delivered' THEN CURRENT_TIMESTAMP ELSE completed_at END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(order)
}
