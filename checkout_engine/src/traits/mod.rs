//! Backend traits for the checkout engine.
//!
//! A storage backend implements [`CartManagement`], [`OrderManagement`] and [`PaymentManagement`] and thereby becomes a
//! [`CheckoutDatabase`]. The public APIs in this crate are generic over these traits, so none of them know which
//! database they are talking to.
mod cart_management;
mod checkout_database;
mod data_objects;
mod order_management;
mod payment_management;

pub use cart_management::{CartError, CartManagement, QuantityUpdate, DEFAULT_MAX_LINE_QUANTITY};
pub use checkout_database::{CheckoutDatabase, CheckoutDatabaseError, ErrorKind};
pub use data_objects::{
    CheckoutRecord,
    CheckoutRequest,
    OrderStatusChange,
    PaymentAttempt,
    PaymentStats,
    Settlement,
    SettlementOutcome,
    TransitionOutcome,
};
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
