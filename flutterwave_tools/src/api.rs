use std::sync::Arc;

use log::*;
use moka::future::Cache;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::FlutterwaveConfig,
    data_objects::{ApiResponse, FlwTransaction, NewPayment, PaymentLinkData},
    signature,
    FlutterwaveApiError,
};

#[derive(Clone)]
pub struct FlutterwaveApi {
    config: FlutterwaveConfig,
    client: Arc<Client>,
    verified: Cache<String, FlwTransaction>,
}

impl FlutterwaveApi {
    pub fn new(config: FlutterwaveConfig) -> Result<Self, FlutterwaveApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val =
            HeaderValue::from_str(&bearer).map_err(|e| FlutterwaveApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FlutterwaveApiError::Initialization(e.to_string()))?;
        let verified = Cache::builder().max_capacity(10_000).time_to_live(config.verify_cache_ttl).build();
        Ok(Self { config, client: Arc::new(client), verified })
    }

    pub fn config(&self) -> &FlutterwaveConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends a request and unwraps the response envelope. Anything other than a 2xx with `"status": "success"` is an
    /// error.
    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<(Option<T>, Value), FlutterwaveApiError> {
        let url = self.url(path);
        trace!("💳️ Sending Flutterwave request: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<Value>>(&text).map(|r| r.message).unwrap_or(text);
            return Err(FlutterwaveApiError::QueryError { status: status.as_u16(), message });
        }
        let raw: Value = serde_json::from_str(&text).map_err(|e| FlutterwaveApiError::JsonError(e.to_string()))?;
        let envelope = serde_json::from_value::<ApiResponse<T>>(raw.clone())
            .map_err(|e| FlutterwaveApiError::JsonError(e.to_string()))?;
        if !envelope.is_success() {
            return Err(FlutterwaveApiError::Rejected(envelope.message));
        }
        trace!("💳️ Flutterwave request successful. {}", envelope.message);
        Ok((envelope.data, raw))
    }

    /// Creates a hosted payment and returns the link to send the customer to.
    pub async fn initialize_payment(&self, payment: &NewPayment) -> Result<String, FlutterwaveApiError> {
        debug!("💳️ Initializing Flutterwave payment {} for {} {}", payment.tx_ref, payment.amount, payment.currency);
        let (data, _) = self.rest_query::<PaymentLinkData, _>(Method::POST, "/payments", Some(payment)).await?;
        let link = data.and_then(|d| d.link).filter(|l| !l.is_empty()).ok_or(FlutterwaveApiError::MissingLink)?;
        info!("💳️ Flutterwave payment {} initialized", payment.tx_ref);
        Ok(link)
    }

    /// Fetches the authoritative record of a transaction. Successful transactions are cached, since they can no
    /// longer change.
    pub async fn verify_transaction(&self, transaction_id: &str) -> Result<FlwTransaction, FlutterwaveApiError> {
        if let Some(tx) = self.verified.get(transaction_id).await {
            trace!("💳️ Transaction {transaction_id} served from the verification cache");
            return Ok(tx);
        }
        let path = format!("/transactions/{transaction_id}/verify");
        let (data, raw) = self.rest_query::<FlwTransaction, ()>(Method::GET, &path, None).await?;
        let mut tx = data.ok_or_else(|| FlutterwaveApiError::JsonError("Verify response had no data".into()))?;
        tx.raw = raw.get("data").cloned().unwrap_or(raw);
        debug!("💳️ Flutterwave reports transaction {transaction_id} ({}) as {}", tx.tx_ref, tx.status);
        if tx.is_successful() {
            self.verified.insert(transaction_id.to_string(), tx.clone()).await;
        }
        Ok(tx)
    }

    pub fn validate_signature(&self, body: &[u8], signature: &str) -> bool {
        signature::validate_signature(self.config.webhook_secret.reveal(), body, signature)
    }
}
