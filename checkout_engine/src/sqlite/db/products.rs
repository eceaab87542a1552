use sqlx::SqliteConnection;

use crate::db_types::{Money, NewProduct, Product};

const PRODUCT_COLUMNS: &str = "id, name, description, price, image_url, is_active, stock";

/// Fetches a product that can currently be sold. Inactive products are treated as missing.
pub async fn fetch_active_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let q = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND is_active = 1");
    let product = sqlx::query_as(&q).bind(id).fetch_optional(conn).await?;
    Ok(product)
}

/// The catalog is owned elsewhere. This exists so that the catalog mirror can be populated, and for tests.
pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let q = format!(
        "INSERT INTO products (name, description, price, image_url, stock) VALUES ($1, $2, $3, $4, $5) RETURNING \
         {PRODUCT_COLUMNS}"
    );
    let product = sqlx::query_as(&q)
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.image_url)
        .bind(product.stock)
        .fetch_one(conn)
        .await?;
    Ok(product)
}

pub async fn set_product_active(id: i64, active: bool, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET is_active = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(active)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_product_price(id: i64, price: Money, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET price = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(price)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
