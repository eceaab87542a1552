//! The public API of the checkout engine.
//!
//! Each API object wraps a backend (anything implementing [`crate::traits::CheckoutDatabase`]) and, where it needs
//! one, a [`crate::gateway::PaymentGateway`]. State changes publish events through the [`crate::events`] hooks.
pub mod cart_api;
pub mod checkout_flow_api;
pub mod errors;
pub mod objects;
pub mod order_ledger_api;
pub mod payment_ledger_api;
pub mod reconcile;
pub mod sweeper_api;
pub mod webhook_api;
