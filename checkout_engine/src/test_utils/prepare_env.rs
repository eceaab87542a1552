//! Fresh, migrated SQLite databases for tests, with a small seeded catalog.
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{Money, NewProduct, Product},
    SqliteDatabase,
};

/// Loads `.env.test`, starts the logger and (re)creates an empty, fully migrated database at `url`.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("🚀️ Nothing to drop at {url}: {e}");
    }
    Sqlite::create_database(url).await.expect("Error creating test database");
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error connecting to test database");
    db.migrate().await.expect("Error running migrations on test database");
    db.pool().close().await;
    debug!("🚀️ Test database ready at {url}");
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/checkout_test_{}.db", dir.display(), rand::random::<u64>())
}

/// Inserts the two products most tests shop with: A at 1000.00 and B at 2500.00.
pub async fn seed_catalog(db: &SqliteDatabase) -> (Product, Product) {
    let a = NewProduct::new("Product A", Money::from_major(1000)).with_description("The first product");
    let b = NewProduct::new("Product B", Money::from_major(2500)).with_description("The second product");
    let a = db.insert_product(a).await.expect("Error inserting product A");
    let b = db.insert_product(b).await.expect("Error inserting product B");
    (a, b)
}
