use std::{env, time::Duration as StdDuration};

use checkout_common::{parse_list, Money, Secret, DEFAULT_CURRENCY_CODE};
use checkout_engine::{
    objects::PaymentSettings,
    pricing::PricingPolicy,
    traits::DEFAULT_MAX_LINE_QUANTITY,
    SweeperSettings,
};
use chrono::Duration;
use flutterwave_tools::FlutterwaveConfig;
use log::*;

const DEFAULT_CKO_HOST: &str = "127.0.0.1";
const DEFAULT_CKO_PORT: u16 = 8360;
const DEFAULT_PENDING_PAYMENT_TIMEOUT: Duration = Duration::minutes(60);
const DEFAULT_WEBHOOK_DEDUP_TTL: StdDuration = StdDuration::from_secs(24 * 60 * 60);
const DEFAULT_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);
const DEFAULT_MAX_PAYMENT_RETRIES: i64 = 3;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The most units of one product a cart line may hold.
    pub max_line_quantity: i64,
    pub auth: AuthConfig,
    pub pricing: PricingPolicy,
    pub payments: PaymentSettings,
    pub sweeper: SweeperSettings,
    /// How long a handled webhook is remembered, so that replays can be skipped.
    pub webhook_dedup_ttl: StdDuration,
    /// How often the sweeper runs. Zero disables it.
    pub sweep_interval: StdDuration,
    pub flutterwave: FlutterwaveConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CKO_HOST.to_string(),
            port: DEFAULT_CKO_PORT,
            database_url: String::default(),
            max_line_quantity: DEFAULT_MAX_LINE_QUANTITY,
            auth: AuthConfig::default(),
            pricing: PricingPolicy::default(),
            payments: PaymentSettings::default(),
            sweeper: SweeperSettings::default(),
            webhook_dedup_ttl: DEFAULT_WEBHOOK_DEDUP_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            flutterwave: FlutterwaveConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CKO_HOST").ok().unwrap_or_else(|| DEFAULT_CKO_HOST.into());
        let port = env::var("CKO_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CKO_PORT. {e} Using the default, {DEFAULT_CKO_PORT}, instead."
                    );
                    DEFAULT_CKO_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CKO_PORT);
        let database_url = env::var("CKO_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CKO_DATABASE_URL is not set. Please set it to the URL for the checkout database.");
            String::default()
        });
        let max_line_quantity = env::var("CKO_MAX_LINE_QUANTITY")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid CKO_MAX_LINE_QUANTITY. {e}. Using {DEFAULT_MAX_LINE_QUANTITY}"))
                    .ok()
            })
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_MAX_LINE_QUANTITY);
        let auth = AuthConfig::from_env_or_default();
        let pricing = pricing_from_env();
        let payments = payment_settings_from_env();
        let sweeper = SweeperSettings {
            pending_timeout: minutes_from_env("CKO_PENDING_PAYMENT_TIMEOUT_MINS", DEFAULT_PENDING_PAYMENT_TIMEOUT),
            ..SweeperSettings::default()
        };
        let webhook_dedup_ttl = secs_from_env("CKO_WEBHOOK_DEDUP_TTL_SECS", DEFAULT_WEBHOOK_DEDUP_TTL);
        let sweep_interval = secs_from_env("CKO_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL);
        let flutterwave = FlutterwaveConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            max_line_quantity,
            auth,
            pricing,
            payments,
            sweeper,
            webhook_dedup_ttl,
            sweep_interval,
            flutterwave,
        }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity service that issues access tokens.
    pub jwt_secret: Secret<String>,
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn from_env_or_default() -> Self {
        match env::var("CKO_JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => Self::new(s),
            _ => {
                error!(
                    "🪛️ CKO_JWT_SECRET is not set. No access token can be validated, so every authenticated request \
                     will be refused."
                );
                Self::default()
            },
        }
    }
}

fn pricing_from_env() -> PricingPolicy {
    let defaults = PricingPolicy::default();
    let allowed_regions = env::var("CKO_ALLOWED_REGIONS").ok().map(|s| parse_list(&s)).unwrap_or_else(|| {
        info!("🪛️ CKO_ALLOWED_REGIONS not set. Shipping to {}", defaults.allowed_regions.join(", "));
        defaults.allowed_regions.clone()
    });
    let high_fee_zones =
        env::var("CKO_HIGH_FEE_ZONES").ok().map(|s| parse_list(&s)).unwrap_or(defaults.high_fee_zones.clone());
    let free_shipping_threshold = money_from_env("CKO_FREE_SHIPPING_THRESHOLD", defaults.free_shipping_threshold);
    let high_fee = money_from_env("CKO_HIGH_FEE", defaults.high_fee);
    let default_fee = money_from_env("CKO_DEFAULT_FEE", defaults.default_fee);
    let tax_rate_bps = env::var("CKO_TAX_RATE_BPS")
        .ok()
        .and_then(|s| {
            s.parse::<u32>()
                .map_err(|e| warn!("🪛️ CKO_TAX_RATE_BPS must be a whole number of basis points. {e}. Using no tax."))
                .ok()
        })
        .unwrap_or(defaults.tax_rate_bps);
    PricingPolicy { allowed_regions, free_shipping_threshold, high_fee_zones, high_fee, default_fee, tax_rate_bps }
}

fn payment_settings_from_env() -> PaymentSettings {
    let defaults = PaymentSettings::default();
    let currency = env::var("CKO_CURRENCY").ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
        info!("🪛️ CKO_CURRENCY not set. Charging in {DEFAULT_CURRENCY_CODE}");
        DEFAULT_CURRENCY_CODE.to_string()
    });
    let max_retries = env::var("CKO_MAX_PAYMENT_RETRIES")
        .ok()
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| {
                    warn!("🪛️ Invalid CKO_MAX_PAYMENT_RETRIES. {e}. Using {DEFAULT_MAX_PAYMENT_RETRIES}");
                })
                .ok()
        })
        .filter(|n| *n >= 0)
        .unwrap_or(DEFAULT_MAX_PAYMENT_RETRIES);
    PaymentSettings { currency: currency.trim().to_ascii_uppercase(), max_retries, ..defaults }
}

fn money_from_env(var: &str, default: Money) -> Money {
    match env::var(var).ok().map(|s| s.parse::<Money>()) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!("🪛️ {var} is not a valid amount ({e}). Using {default}");
            default
        },
        None => default,
    }
}

fn minutes_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} not set. Using the default of {} minutes", default.num_minutes()))
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid {var}. {e}. Using {} minutes", default.num_minutes()))
        })
        .ok()
        .filter(|m| *m > 0)
        .map(Duration::minutes)
        .unwrap_or(default)
}

fn secs_from_env(var: &str, default: StdDuration) -> StdDuration {
    env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid {var}. {e}. Using {}s", default.as_secs())).ok()
        })
        .map(StdDuration::from_secs)
        .unwrap_or(default)
}
