use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{Cart, CartItem, CartLine, UserId};

/// Returns the user's cart, creating it first if it does not exist.
///
/// The insert is a no-op when the row already exists (the `user_id` column is unique), so two concurrent callers can
/// never end up with two carts.
pub async fn fetch_or_create_cart(user_id: UserId, conn: &mut SqliteConnection) -> Result<Cart, sqlx::Error> {
    let inserted = sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT(user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if inserted > 0 {
        debug!("🛒️ Created a cart for user #{user_id}");
    }
    let cart = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1").bind(user_id).fetch_one(conn).await?;
    Ok(cart)
}

/// Takes the database write lock on the user's cart, and returns the cart.
///
/// SQLite only has one writer at a time, so the first write in a transaction is what serializes competing
/// transactions. Doing it on the cart row first means two checkouts for the same cart can never interleave.
pub async fn lock_cart(user_id: UserId, conn: &mut SqliteConnection) -> Result<Cart, sqlx::Error> {
    sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT(user_id) DO UPDATE SET updated_at = updated_at")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    let cart = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1").bind(user_id).fetch_one(conn).await?;
    Ok(cart)
}

pub async fn bump_revision(cart_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE carts SET revision = revision + 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Adds `quantity` of the product to the cart. An existing row for the same product has its quantity increased.
///
/// Returns `None`, and changes nothing, if the merged quantity would exceed `max_quantity`. The caller checks
/// `quantity` itself.
pub async fn upsert_item(
    cart_id: i64,
    product_id: i64,
    quantity: i64,
    max_quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CartItem>, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)
            ON CONFLICT(cart_id, product_id) DO UPDATE SET
                quantity = cart_items.quantity + excluded.quantity,
                updated_at = CURRENT_TIMESTAMP
            WHERE cart_items.quantity + excluded.quantity <= $4
            RETURNING *;
        "#,
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .bind(max_quantity)
    .fetch_optional(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_item(
    cart_id: i64,
    item_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CartItem>, sqlx::Error> {
    let item = sqlx::query_as("SELECT * FROM cart_items WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart_id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

pub async fn fetch_items(cart_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, sqlx::Error> {
    let items =
        sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY id").bind(cart_id).fetch_all(conn).await?;
    Ok(items)
}

/// Sets the quantity of an item in the given cart. Returns `None` if there is no such item in this cart.
pub async fn update_item_quantity(
    cart_id: i64,
    item_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CartItem>, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
            UPDATE cart_items SET quantity = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND cart_id = $3
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(item_id)
    .bind(cart_id)
    .fetch_optional(conn)
    .await?;
    Ok(item)
}

/// Returns true if a row was deleted.
pub async fn delete_item(cart_id: i64, item_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart_id)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

pub async fn delete_all_items(cart_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(conn).await?;
    trace!("🛒️ Removed {} items from cart #{cart_id}", deleted.rows_affected());
    Ok(deleted.rows_affected())
}

/// Empties the user's cart (if they have one) and bumps its revision. Returns the number of items removed.
pub async fn clear_cart_for_user(user_id: UserId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let cart: Option<Cart> =
        sqlx::query_as("SELECT * FROM carts WHERE user_id = $1").bind(user_id).fetch_optional(&mut *conn).await?;
    let Some(cart) = cart else {
        return Ok(0);
    };
    let removed = delete_all_items(cart.id, &mut *conn).await?;
    bump_revision(cart.id, conn).await?;
    Ok(removed)
}

/// The cart's items joined with their current catalog entries, in the order they were added.
pub async fn cart_lines(cart_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartLine>, sqlx::Error> {
    let lines = sqlx::query_as(
        r#"
            SELECT
                cart_items.id AS item_id,
                products.id AS product_id,
                products.name AS product_name,
                products.description AS description,
                products.image_url AS image_url,
                products.price AS unit_price,
                cart_items.quantity AS quantity
            FROM cart_items
            JOIN products ON products.id = cart_items.product_id
            WHERE cart_items.cart_id = $1
            ORDER BY cart_items.id;
        "#,
    )
    .bind(cart_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}
