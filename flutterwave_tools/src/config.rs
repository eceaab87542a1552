use std::time::Duration;

use checkout_common::Secret;
use log::*;

pub const DEFAULT_BASE_URL: &str = "https://api.flutterwave.com/v3";

#[derive(Debug, Clone)]
pub struct FlutterwaveConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// Shared secret used to sign webhook deliveries.
    pub webhook_secret: Secret<String>,
    /// Where Flutterwave sends the customer after payment. The payment id is appended as a path segment.
    pub redirect_url: String,
    /// Shown on the hosted payment page.
    pub title: String,
    pub timeout: Duration,
    pub verify_cache_ttl: Duration,
}

impl Default for FlutterwaveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            redirect_url: "http://localhost:3000/payment/callback".to_string(),
            title: "Store Payment".to_string(),
            timeout: Duration::from_secs(30),
            verify_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl FlutterwaveConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("CKO_FLW_BASE_URL").unwrap_or_else(|_| {
            info!("🪛️ CKO_FLW_BASE_URL not set, using {DEFAULT_BASE_URL}");
            defaults.base_url.clone()
        });
        let secret_key = Secret::new(std::env::var("CKO_FLW_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ CKO_FLW_SECRET_KEY not set. Calls to Flutterwave will be refused");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("CKO_FLW_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ CKO_FLW_WEBHOOK_SECRET not set. Every webhook will be rejected");
            String::default()
        }));
        let redirect_url = std::env::var("CKO_FLW_REDIRECT_URL").unwrap_or_else(|_| {
            warn!("🪛️ CKO_FLW_REDIRECT_URL not set, using {}", defaults.redirect_url);
            defaults.redirect_url.clone()
        });
        let title = std::env::var("CKO_FLW_TITLE").unwrap_or(defaults.title);
        let timeout = secs_from_env("CKO_HTTP_TIMEOUT_SECS", defaults.timeout);
        let verify_cache_ttl = secs_from_env("CKO_VERIFY_CACHE_TTL_SECS", defaults.verify_cache_ttl);
        Self { base_url, secret_key, webhook_secret, redirect_url, title, timeout, verify_cache_ttl }
    }
}

fn secs_from_env(var: &str, default: Duration) -> Duration {
    match std::env::var(var).ok().map(|s| s.parse::<u64>()) {
        Some(Ok(secs)) => Duration::from_secs(secs),
        Some(Err(e)) => {
            warn!("🪛️ {var} is not a valid number of seconds ({e}). Using {}s", default.as_secs());
            default
        },
        None => default,
    }
}
