//! Flutterwave v3 client.
//!
//! Only the two calls a hosted-checkout integration needs are covered: creating a payment link, and verifying a
//! transaction. [`signature`] holds the webhook signature helpers.
mod api;
mod config;
mod data_objects;
mod error;

pub mod signature;

pub use api::FlutterwaveApi;
pub use config::FlutterwaveConfig;
pub use data_objects::{ApiResponse, Customer, Customizations, FlwTransaction, NewPayment, PaymentLinkData};
pub use error::FlutterwaveApiError;
