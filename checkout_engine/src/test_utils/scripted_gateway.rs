//! A [`PaymentGateway`] that never leaves the process. Tests script its answers up front.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use serde_json::json;

use crate::{
    db_types::Money,
    gateway::{GatewayError, GatewayTxStatus, PaymentGateway, PaymentInitRequest, PaymentLink, VerifiedTransaction},
};

#[derive(Default)]
struct Script {
    init_failures: VecDeque<GatewayError>,
    verify_failures: HashMap<String, GatewayError>,
    transactions: HashMap<String, VerifiedTransaction>,
    init_requests: Vec<PaymentInitRequest>,
    verify_calls: usize,
}

#[derive(Clone)]
pub struct ScriptedGateway {
    secret: String,
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new("webhook-secret")
    }
}

impl ScriptedGateway {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { secret: secret.into(), script: Arc::new(Mutex::new(Script::default())) }
    }

    /// The value a genuine webhook would carry in its signature header.
    pub fn signature(&self) -> String {
        self.secret.clone()
    }

    /// The next call to `initialize` fails with `err`. Queue several to fail several calls.
    pub fn fail_next_init(&self, err: GatewayError) {
        self.script.lock().unwrap().init_failures.push_back(err);
    }

    pub fn fail_verify(&self, transaction_id: &str, err: GatewayError) {
        self.script.lock().unwrap().verify_failures.insert(transaction_id.to_string(), err);
    }

    /// Registers what `verify(transaction_id)` will report.
    pub fn set_transaction(&self, transaction_id: &str, tx_ref: &str, status: GatewayTxStatus, amount: Money) {
        let tx = VerifiedTransaction {
            transaction_id: transaction_id.to_string(),
            tx_ref: tx_ref.to_string(),
            status,
            amount,
            currency: "NGN".to_string(),
            gateway_reference: Some(format!("FLW-{transaction_id}")),
            raw: json!({ "id": transaction_id, "tx_ref": tx_ref, "amount": amount, "status": status }),
        };
        self.script.lock().unwrap().transactions.insert(transaction_id.to_string(), tx);
    }

    pub fn init_requests(&self) -> Vec<PaymentInitRequest> {
        self.script.lock().unwrap().init_requests.clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.script.lock().unwrap().verify_calls
    }
}

impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "flutterwave"
    }

    async fn initialize(&self, request: PaymentInitRequest) -> Result<PaymentLink, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.init_requests.push(request.clone());
        if let Some(err) = script.init_failures.pop_front() {
            return Err(err);
        }
        Ok(PaymentLink { redirect_url: format!("https://pay.test/{}", request.tx_ref), tx_ref: request.tx_ref })
    }

    async fn verify(&self, transaction_id: &str) -> Result<VerifiedTransaction, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.verify_calls += 1;
        if let Some(err) = script.verify_failures.get(transaction_id) {
            return Err(err.clone());
        }
        script.transactions.get(transaction_id).cloned().ok_or_else(|| GatewayError::Rejected {
            status: Some(400),
            message: format!("No transaction was found for id {transaction_id}"),
        })
    }

    fn validate_signature(&self, _raw_body: &[u8], signature: &str) -> bool {
        signature == self.secret
    }
}
