//! # Checkout server
//! The HTTP face of the checkout engine. It is responsible for:
//! * Authenticating callers with the access tokens issued by the identity service.
//! * Exposing the cart, checkout, order and payment operations of [`checkout_engine`] to those callers.
//! * Receiving payment gateway webhooks, and running the sweeper that catches the webhooks that never arrive.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information, or run
//! the binary with any argument to print the full list.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/payments/webhooks/{gateway}`: Gateway notifications. Authenticated by signature.
//! * Everything else requires a `Bearer` access token. See [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweeper_worker;

#[cfg(test)]
mod endpoint_tests;
