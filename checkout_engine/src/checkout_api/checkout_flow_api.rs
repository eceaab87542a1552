use std::fmt::Debug;

use log::*;

use crate::{
    checkout_api::{
        errors::CheckoutError,
        objects::{CheckoutReceipt, PaymentInitiation, PaymentSettings, PaymentStatusReport},
        reconcile::Reconciler,
    },
    db_types::{Order, Payment, UserId},
    events::{EventProducers, PushEvent},
    gateway::{CustomerInfo, GatewayError, PaymentGateway, PaymentInitRequest, PaymentLink},
    pricing::PricingPolicy,
    traits::{CheckoutDatabase, CheckoutRequest, PaymentAttempt, Settlement},
};

/// `CheckoutFlowApi` turns carts into orders and gets those orders paid for.
///
/// It owns the customer-facing half of the payment flow: checkout, paying for (or retrying payment on) an existing
/// order, and polling the gateway for the outcome. Gateway-pushed notifications arrive through
/// [`crate::WebhookApi`] instead, and both paths converge on the same ledger transitions.
pub struct CheckoutFlowApi<B, G> {
    db: B,
    reconciler: Reconciler<B, G>,
    pricing: PricingPolicy,
    settings: PaymentSettings,
    producers: EventProducers,
}

impl<B, G> Debug for CheckoutFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutFlowApi")
    }
}

impl<B, G> CheckoutFlowApi<B, G>
where B: Clone
{
    pub fn new(
        db: B,
        gateway: G,
        pricing: PricingPolicy,
        settings: PaymentSettings,
        producers: EventProducers,
    ) -> Self {
        let reconciler = Reconciler::new(db.clone(), gateway, producers.clone());
        Self { db, reconciler, pricing, settings, producers }
    }

    pub fn settings(&self) -> &PaymentSettings {
        &self.settings
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }
}

impl<B, G> CheckoutFlowApi<B, G>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    /// Freezes the user's cart into an order and starts the payment.
    ///
    /// If the order is created but the gateway cannot start the payment, the payment is marked failed and the receipt
    /// carries the error. The order stays `pending` and can be paid for later without checking out again.
    pub async fn checkout(
        &self,
        user_id: UserId,
        customer: CustomerInfo,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let gateway = self.reconciler.gateway().name().to_string();
        let record = self.db.checkout(user_id, &request, &self.pricing, &gateway, &self.settings.currency).await?;
        let mut receipt = CheckoutReceipt {
            order: record.order,
            items: record.items,
            payment: record.payment,
            payment_link: None,
            payment_error: None,
        };
        if record.settled {
            let settlement = Settlement {
                payment: receipt.payment.clone(),
                order: receipt.order.clone(),
                order_changed: true,
                cart_items_cleared: receipt.items.len() as u64,
            };
            self.reconciler.ledger().notify_settlement(&settlement);
            return Ok(receipt);
        }
        self.producers.publish_push(PushEvent::order_updated(&receipt.order));
        let customer = CustomerInfo { phone: request.customer_phone.or(customer.phone), ..customer };
        match self.initiate(&receipt.order, &receipt.payment, customer).await {
            Ok(link) => receipt.payment_link = Some(link.redirect_url),
            Err(e) => {
                warn!("🧾️ Order {} was created, but its payment could not be started. {e}", receipt.order.order_number);
                receipt.payment_error = Some(e.to_string());
            },
        }
        if let Some(payment) = self.db.fetch_payment(&receipt.payment.payment_id).await? {
            receipt.payment = payment;
        }
        Ok(receipt)
    }

    /// Starts a new payment for one of the user's existing orders.
    pub async fn pay_for_order(
        &self,
        user_id: UserId,
        order_number: &str,
        customer: CustomerInfo,
    ) -> Result<PaymentInitiation, CheckoutError> {
        self.owned_order(user_id, order_number).await?;
        let attempt = PaymentAttempt::Pay { order_number: order_number.to_string() };
        self.start_attempt(attempt, customer).await
    }

    /// Retries a failed payment. The retry is a new payment row with a fresh gateway reference.
    pub async fn retry_payment(
        &self,
        user_id: UserId,
        payment_id: &str,
        customer: CustomerInfo,
    ) -> Result<PaymentInitiation, CheckoutError> {
        self.owned_payment(user_id, payment_id).await?;
        let attempt = PaymentAttempt::Retry { payment_id: payment_id.to_string() };
        self.start_attempt(attempt, customer).await
    }

    /// Reports the payment's state, asking the gateway first if the payment is still open.
    ///
    /// `transaction_id` is the gateway's id for the transaction, as handed to the customer on redirect. It comes from
    /// the client, so it is only stored once the gateway confirms that it belongs to this payment. If the gateway
    /// cannot be reached, the stored state is returned.
    pub async fn verify_payment(
        &self,
        user_id: UserId,
        payment_id: &str,
        transaction_id: Option<&str>,
    ) -> Result<PaymentStatusReport, CheckoutError> {
        let payment = self.owned_payment(user_id, payment_id).await?;
        let known_tx_id = transaction_id.map(String::from).or_else(|| payment.gateway_transaction_id.clone());
        match known_tx_id {
            Some(tx_id) if payment.status.is_open() => {
                match self.reconciler.verify_and_apply(&payment, &tx_id, None).await {
                    Ok(outcome) => debug!("💳️ Verified payment {payment_id}. It is now {}", outcome.status()),
                    Err(CheckoutError::Gateway(e)) => {
                        warn!("💳️ Could not verify payment {payment_id} with the gateway. Reporting stored state. {e}")
                    },
                    Err(e) => return Err(e),
                }
            },
            Some(_) => trace!("💳️ Payment {payment_id} is {}. No need to ask the gateway", payment.status),
            None => trace!("💳️ Payment {payment_id} has no gateway transaction yet"),
        }
        self.payment_status(user_id, payment_id).await
    }

    /// The stored state of the payment. Never contacts the gateway.
    pub async fn payment_status(
        &self,
        user_id: UserId,
        payment_id: &str,
    ) -> Result<PaymentStatusReport, CheckoutError> {
        let payment = self.owned_payment(user_id, payment_id).await?;
        let order = self
            .db
            .fetch_order_by_id(payment.order_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("Order for payment {payment_id}")))?;
        Ok(PaymentStatusReport::new(payment, &order, self.settings.max_retries))
    }

    pub async fn payment_history(&self, user_id: UserId) -> Result<Vec<Payment>, CheckoutError> {
        let payments = self.reconciler.ledger().payments_for_user(user_id).await?;
        Ok(payments)
    }

    async fn start_attempt(
        &self,
        attempt: PaymentAttempt,
        customer: CustomerInfo,
    ) -> Result<PaymentInitiation, CheckoutError> {
        let gateway = self.reconciler.gateway().name().to_string();
        let (order, payment) = self.db.create_payment_attempt(attempt, &gateway, self.settings.max_retries).await?;
        let customer = CustomerInfo {
            phone: customer.phone.or_else(|| Some(order.customer_phone.clone()).filter(|p| !p.is_empty())),
            ..customer
        };
        let link = self.initiate(&order, &payment, customer).await?;
        Ok(PaymentInitiation::new(&payment, link.redirect_url))
    }

    /// Registers the payment with the gateway. If that fails, the payment is marked failed with the reason.
    async fn initiate(
        &self,
        order: &Order,
        payment: &Payment,
        customer: CustomerInfo,
    ) -> Result<PaymentLink, CheckoutError> {
        let request = PaymentInitRequest {
            tx_ref: payment.tx_ref().to_string(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            order_number: order.order_number.clone(),
            customer,
        };
        match self.initialize_with_retries(request).await {
            Ok(link) => {
                self.reconciler.ledger().set_payment_link(&payment.payment_id, &link.redirect_url).await?;
                info!("💳️ Payment {} for order {} is ready at the gateway", payment.payment_id, order.order_number);
                Ok(link)
            },
            Err(e) => {
                let ledger = self.reconciler.ledger();
                ledger.mark_failed(&payment.payment_id, &e.to_string(), None, false).await?;
                Err(e.into())
            },
        }
    }

    async fn initialize_with_retries(&self, request: PaymentInitRequest) -> Result<PaymentLink, GatewayError> {
        let attempts = self.settings.network_attempts.max(1);
        let mut backoff = self.settings.network_backoff;
        let mut attempt = 1;
        loop {
            match self.reconciler.gateway().initialize(request.clone()).await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!("💳️ Payment gateway unreachable (attempt {attempt} of {attempts}). Retrying. {e}");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                },
                result => return result,
            }
        }
    }

    async fn owned_order(&self, user_id: UserId, order_number: &str) -> Result<Order, CheckoutError> {
        match self.db.fetch_order_by_number(order_number).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(CheckoutError::NotFound(format!("Order {order_number}"))),
        }
    }

    async fn owned_payment(&self, user_id: UserId, payment_id: &str) -> Result<Payment, CheckoutError> {
        match self.db.fetch_payment(payment_id).await? {
            Some(payment) if payment.user_id == user_id => Ok(payment),
            _ => Err(CheckoutError::NotFound(format!("Payment {payment_id}"))),
        }
    }
}
