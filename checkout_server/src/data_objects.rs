use std::fmt::Display;

use checkout_engine::{
    db_types::{OrderStatusType, PaymentMethod, ShippingInfo},
    traits::{CheckoutRequest, QuantityUpdate},
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

fn one() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToCartParams {
    pub product_id: i64,
    #[serde(default = "one")]
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityParams {
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkCartUpdate {
    pub items: Vec<QuantityUpdate>,
}

/// The body of `POST /checkout`. Prices and totals are never accepted from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutParams {
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_country: String,
    #[serde(default)]
    pub shipping_zip_code: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TryFrom<CheckoutParams> for CheckoutRequest {
    type Error = ServerError;

    fn try_from(params: CheckoutParams) -> Result<Self, Self::Error> {
        let required = [
            ("shipping_address", &params.shipping_address),
            ("shipping_city", &params.shipping_city),
            ("shipping_state", &params.shipping_state),
            ("shipping_country", &params.shipping_country),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ServerError::ValidationError(format!("{name} is required")));
        }
        Ok(CheckoutRequest {
            shipping: ShippingInfo {
                address: params.shipping_address.trim().to_string(),
                city: params.shipping_city.trim().to_string(),
                state: params.shipping_state.trim().to_string(),
                country: params.shipping_country.trim().to_string(),
                zip_code: params.shipping_zip_code.trim().to_string(),
            },
            payment_method: params.payment_method,
            customer_phone: params.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            notes: params.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusParams {
    pub status: OrderStatusType,
}
