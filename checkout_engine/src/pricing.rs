//! Shipping and tax rules.
//!
//! [`PricingPolicy::compute`] is a pure function of its inputs and the policy configuration. It never touches the
//! database, so the checkout transaction can call it on the freshly-read cart subtotal, and it can be tested in
//! isolation.
use checkout_common::Money;
use log::trace;
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_ALLOWED_REGIONS: [&str; 3] = ["Lagos", "Lagos Island", "Lagos Mainland"];
pub const DEFAULT_HIGH_FEE_ZONES: [&str; 6] = ["lekki", "ajah", "victoria island", "ikoyi", "sangotedo", "epe"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("We do not ship to {0} yet")]
    UnsupportedShippingRegion(String),
    #[error("The order total is too large to be processed")]
    AmountOutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub tax: Money,
    pub total: Money,
}

#[derive(Debug, Clone)]
pub struct PricingPolicy {
    /// States (regions) we deliver to. Matched case-insensitively against the whole state name.
    pub allowed_regions: Vec<String>,
    /// Orders with a subtotal strictly above this ship for free.
    pub free_shipping_threshold: Money,
    /// Cities that attract the higher flat fee. Matched as case-insensitive substrings of the shipping city.
    pub high_fee_zones: Vec<String>,
    pub high_fee: Money,
    pub default_fee: Money,
    /// Tax rate in basis points, applied to the subtotal only.
    pub tax_rate_bps: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            allowed_regions: DEFAULT_ALLOWED_REGIONS.iter().map(|s| s.to_string()).collect(),
            free_shipping_threshold: Money::from_major(50_000),
            high_fee_zones: DEFAULT_HIGH_FEE_ZONES.iter().map(|s| s.to_string()).collect(),
            high_fee: Money::from_major(4_500),
            default_fee: Money::from_major(2_500),
            tax_rate_bps: 0,
        }
    }
}

impl PricingPolicy {
    pub fn is_region_supported(&self, state: &str) -> bool {
        let state = state.trim();
        self.allowed_regions.iter().any(|r| r.trim().eq_ignore_ascii_case(state))
    }

    pub fn shipping_fee(&self, subtotal: Money, city: &str) -> Money {
        if subtotal > self.free_shipping_threshold {
            return Money::default();
        }
        let city = city.to_lowercase();
        let high_fee_zone = self.high_fee_zones.iter().any(|z| !z.is_empty() && city.contains(&z.to_lowercase()));
        if high_fee_zone {
            self.high_fee
        } else {
            self.default_fee
        }
    }

    pub fn compute(&self, subtotal: Money, state: &str, city: &str) -> Result<PriceBreakdown, PricingError> {
        if !self.is_region_supported(state) {
            return Err(PricingError::UnsupportedShippingRegion(state.trim().to_string()));
        }
        let shipping_fee = self.shipping_fee(subtotal, city);
        let tax = subtotal.apply_basis_points(self.tax_rate_bps).ok_or(PricingError::AmountOutOfRange)?;
        let total = Money::checked_sum([subtotal, shipping_fee, tax]).ok_or(PricingError::AmountOutOfRange)?;
        trace!("🧾️ Priced {subtotal} to {state}/{city}: shipping {shipping_fee}, tax {tax}, total {total}");
        Ok(PriceBreakdown { subtotal, shipping_fee, tax, total })
    }
}
