//! Plugs the Flutterwave client into the engine as a [`PaymentGateway`].
use checkout_engine::gateway::{
    GatewayError,
    GatewayTxStatus,
    PaymentGateway,
    PaymentInitRequest,
    PaymentLink,
    VerifiedTransaction,
};
use flutterwave_tools::{
    Customer,
    Customizations,
    FlutterwaveApi,
    FlutterwaveApiError,
    FlutterwaveConfig,
    FlwTransaction,
    NewPayment,
};
use log::*;

pub const FLUTTERWAVE_GATEWAY: &str = "flutterwave";

#[derive(Clone)]
pub struct FlutterwaveGateway {
    api: FlutterwaveApi,
}

impl FlutterwaveGateway {
    pub fn new(config: FlutterwaveConfig) -> Result<Self, FlutterwaveApiError> {
        let api = FlutterwaveApi::new(config)?;
        Ok(Self { api })
    }

    fn new_payment(&self, request: PaymentInitRequest) -> NewPayment {
        let config = self.api.config();
        let redirect_url = format!("{}/{}", config.redirect_url.trim_end_matches('/'), request.tx_ref);
        NewPayment {
            tx_ref: request.tx_ref,
            amount: request.amount,
            currency: request.currency,
            redirect_url,
            customer: Customer {
                email: request.customer.email,
                name: request.customer.name,
                phonenumber: request.customer.phone,
            },
            customizations: Customizations {
                title: config.title.clone(),
                description: format!("Payment for order {}", request.order_number),
            },
        }
    }
}

impl PaymentGateway for FlutterwaveGateway {
    fn name(&self) -> &str {
        FLUTTERWAVE_GATEWAY
    }

    async fn initialize(&self, request: PaymentInitRequest) -> Result<PaymentLink, GatewayError> {
        let tx_ref = request.tx_ref.clone();
        let payment = self.new_payment(request);
        let redirect_url = self.api.initialize_payment(&payment).await.map_err(to_gateway_error)?;
        Ok(PaymentLink { redirect_url, tx_ref })
    }

    async fn verify(&self, transaction_id: &str) -> Result<VerifiedTransaction, GatewayError> {
        let tx = self.api.verify_transaction(transaction_id).await.map_err(to_gateway_error)?;
        Ok(to_verified_transaction(tx))
    }

    fn validate_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        self.api.validate_signature(raw_body, signature)
    }
}

fn to_gateway_error(e: FlutterwaveApiError) -> GatewayError {
    warn!("💳️ Flutterwave call failed. {e}");
    match e {
        FlutterwaveApiError::Network(msg) => GatewayError::Network(msg),
        FlutterwaveApiError::QueryError { status, message } => {
            GatewayError::Rejected { status: Some(status), message }
        },
        FlutterwaveApiError::Rejected(message) => GatewayError::Rejected { status: None, message },
        FlutterwaveApiError::MissingLink => GatewayError::MissingLink,
        FlutterwaveApiError::JsonError(msg) | FlutterwaveApiError::Initialization(msg) => {
            GatewayError::MalformedResponse(msg)
        },
    }
}

fn to_verified_transaction(tx: FlwTransaction) -> VerifiedTransaction {
    VerifiedTransaction {
        status: GatewayTxStatus::from_provider(&tx.status),
        transaction_id: tx.id,
        tx_ref: tx.tx_ref,
        amount: tx.amount,
        currency: tx.currency,
        gateway_reference: tx.flw_ref,
        raw: tx.raw,
    }
}
