//! Payment rows and their status transitions.
//!
//! Each transition is a single conditional `UPDATE ... WHERE status IN (...) RETURNING *`. If another task got there
//! first, the `WHERE` clause no longer matches, no row comes back, and the caller knows it lost the race.
use chrono::Duration;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewPayment, Payment, PaymentStatus, UserId};

pub async fn insert_payment(
    payment: NewPayment,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (payment_id, order_id, user_id, gateway, amount, currency, status, retry_count, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CASE WHEN $7 = 'successful' THEN CURRENT_TIMESTAMP ELSE NULL END)
            RETURNING *;
        "#,
    )
    .bind(payment.payment_id)
    .bind(payment.order_id)
    .bind(payment.user_id)
    .bind(payment.gateway)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(status)
    .bind(payment.retry_count)
    .fetch_one(conn)
    .await?;
    debug!("💳️ Payment {} inserted for order #{} as {}", payment.payment_id, payment.order_id, payment.status);
    Ok(payment)
}

pub async fn fetch_payment(payment_id: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE payment_id = $1")
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// Fetches the payment and takes the write lock on it.
pub async fn lock_payment(payment_id: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("UPDATE payments SET updated_at = updated_at WHERE payment_id = $1 RETURNING *")
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// The newest payment attempt for an order.
pub async fn fetch_latest_payment_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payments_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

pub async fn fetch_payments_for_user(
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

pub async fn count_open_payments_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payments WHERE order_id = $1 AND status IN ('pending', 'processing')",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Moves the payment to `successful` if it is not already in a final state. `failed` payments may still succeed: the
/// gateway is the authority, and it sometimes reports a late success after a timeout.
pub async fn try_mark_successful(
    payment_id: &str,
    transaction_id: Option<&str>,
    gateway_reference: Option<&str>,
    raw_response: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = 'successful',
                paid_at = CURRENT_TIMESTAMP,
                gateway_transaction_id = COALESCE($1, gateway_transaction_id),
                gateway_reference = COALESCE($2, gateway_reference),
                gateway_response = COALESCE($3, gateway_response),
                last_error = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE payment_id = $4 AND status IN ('pending', 'processing', 'failed')
            RETURNING *;
        "#,
    )
    .bind(transaction_id)
    .bind(gateway_reference)
    .bind(raw_response)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Moves an open payment to `failed` or `cancelled`.
pub async fn try_close_open_payment(
    payment_id: &str,
    status: PaymentStatus,
    error: &str,
    raw_response: Option<&str>,
    requires_review: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $1,
                last_error = $2,
                gateway_response = COALESCE($3, gateway_response),
                requires_review = requires_review OR $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE payment_id = $5 AND status IN ('pending', 'processing')
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(error)
    .bind(raw_response)
    .bind(requires_review)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// `pending` becomes `processing`; `processing` stays put. Either way the transaction id and response are stored.
pub async fn try_record_processing(
    payment_id: &str,
    transaction_id: Option<&str>,
    raw_response: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = 'processing',
                gateway_transaction_id = COALESCE(gateway_transaction_id, $1),
                gateway_response = COALESCE($2, gateway_response),
                updated_at = CURRENT_TIMESTAMP
            WHERE payment_id = $3 AND status IN ('pending', 'processing')
            RETURNING *;
        "#,
    )
    .bind(transaction_id)
    .bind(raw_response)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn flag_for_review(
    payment_id: &str,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET requires_review = 1, last_error = $1, updated_at = CURRENT_TIMESTAMP
            WHERE payment_id = $2
            RETURNING *;
        "#,
    )
    .bind(note)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    trace!("💳️ Payment {payment_id} flagged for review: {note}");
    Ok(payment)
}

/// Cancels every open payment for the order. Used when the order itself is cancelled.
pub async fn cancel_open_payments_for_order(
    order_id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as(
        r#"
            UPDATE payments SET status = 'cancelled', last_error = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status IN ('pending', 'processing')
            RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

pub async fn set_payment_link(payment_id: &str, link: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payments SET payment_link = $1, updated_at = CURRENT_TIMESTAMP WHERE payment_id = $2")
        .bind(link)
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_transaction_id(
    payment_id: &str,
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE payments SET gateway_transaction_id = $1, updated_at = CURRENT_TIMESTAMP
            WHERE payment_id = $2 AND gateway_transaction_id IS NULL
        "#,
    )
    .bind(transaction_id)
    .bind(payment_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_open_payments_with_tx_id(conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as(
        r#"
            SELECT * FROM payments
            WHERE status IN ('pending', 'processing') AND gateway_transaction_id IS NOT NULL
            ORDER BY id;
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

/// Fails `pending` payments older than `older_than` that never got a gateway transaction id.
pub async fn expire_stale_payments(
    older_than: Duration,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as(
        r#"
            UPDATE payments SET status = 'failed', last_error = $1, updated_at = CURRENT_TIMESTAMP
            WHERE status = 'pending'
              AND gateway_transaction_id IS NULL
              AND unixepoch('now') - unixepoch(created_at) > $2
            RETURNING *;
        "#,
    )
    .bind(error)
    .bind(older_than.num_seconds())
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

/// Deletes old `failed`/`cancelled` rows. The newest payment of each order is always kept.
pub async fn delete_old_closed_payments(older_than: Duration, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            DELETE FROM payments
            WHERE status IN ('failed', 'cancelled')
              AND unixepoch('now') - unixepoch(created_at) > $1
              AND id NOT IN (SELECT MAX(id) FROM payments GROUP BY order_id)
        "#,
    )
    .bind(older_than.num_seconds())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn count_by_status(conn: &mut SqliteConnection) -> Result<Vec<(PaymentStatus, i64)>, sqlx::Error> {
    let counts = sqlx::query_as("SELECT status, COUNT(*) FROM payments GROUP BY status").fetch_all(conn).await?;
    Ok(counts)
}

pub async fn count_stale_pending(older_than: Duration, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar(
        r#"
            SELECT COUNT(*) FROM payments
            WHERE status = 'pending'
              AND gateway_transaction_id IS NULL
              AND unixepoch('now') - unixepoch(created_at) > $1
        "#,
    )
    .bind(older_than.num_seconds())
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub async fn count_requires_review(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE requires_review = 1").fetch_one(conn).await?;
    Ok(count)
}
