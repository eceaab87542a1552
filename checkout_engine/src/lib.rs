//! Checkout Engine
//!
//! The checkout engine turns a customer's shopping cart into an immutable order, and reconciles that order's payment
//! against an external payment gateway that may be slow, unreachable, or repetitive.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). A backend implements the traits in [`mod@traits`]. You should
//!    never need to access the database directly. Instead, use the public API. The exception is the data types used
//!    in the database. These are defined in the `db_types` module and are public.
//! 2. The public API (the `*Api` types re-exported here). Carts, checkout, the payment ledger, webhook handling and the
//!    background sweeper all live here. Every API is generic over the backend and, where needed, the
//!    [`gateway::PaymentGateway`].
//! 3. Events. State changes emit [`events::PushEvent`]s and [`events::OrderPaidEvent`]s. A simple actor framework is
//!    used so that you can hook into these and perform custom actions, such as pushing updates to connected clients
//!    or sending confirmation emails, without slowing the request that caused them.
mod checkout_api;
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod gateway;
pub mod idempotency;
pub mod pricing;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use checkout_api::{
    cart_api::CartApi,
    checkout_flow_api::CheckoutFlowApi,
    errors::{CheckoutError, WebhookError},
    objects,
    order_ledger_api::OrderLedgerApi,
    payment_ledger_api::PaymentLedgerApi,
    reconcile::Reconciler,
    sweeper_api::{SweeperApi, SweeperSettings},
    webhook_api::{WebhookApi, WebhookOutcome},
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
