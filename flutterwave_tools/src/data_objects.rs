use checkout_common::Money;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope around every Flutterwave response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Customer {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phonenumber: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Customizations {
    pub title: String,
    pub description: String,
}

/// Body of `POST /payments`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPayment {
    pub tx_ref: String,
    pub amount: Money,
    pub currency: String,
    pub redirect_url: String,
    pub customer: Customer,
    pub customizations: Customizations,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLinkData {
    pub link: Option<String>,
}

/// The transaction record returned by `GET /transactions/{id}/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlwTransaction {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub tx_ref: String,
    #[serde(default)]
    pub flw_ref: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: String,
    #[serde(skip)]
    pub raw: Value,
}

impl FlwTransaction {
    pub fn is_successful(&self) -> bool {
        self.status.eq_ignore_ascii_case("successful")
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: serde::Deserializer<'de> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        v => Err(serde::de::Error::custom(format!("Invalid transaction id: {v}"))),
    }
}
