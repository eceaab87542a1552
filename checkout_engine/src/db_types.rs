use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use checkout_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

/// Users are owned by an external identity service. The engine only ever sees their numeric id.
pub type UserId = i64;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(&'static str, String);

macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ConversionError($label, other.to_string())),
                }
            }
        }
    };
}

//--------------------------------------        Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

string_enum!(Role, "role", { User => "user", Admin => "admin" });

//--------------------------------------       Product       ---------------------------------------------------------
/// The slice of a catalog product that the checkout flow needs.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub stock: i64,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image_url: Option<String>,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Money) -> Self {
        Self { name: name.into(), description: String::default(), price, image_url: None, stock: 100 }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }
}

//--------------------------------------        Cart         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Cart {
    pub id: i64,
    pub user_id: UserId,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart item joined with the current catalog data for its product.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CartLine {
    pub item_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
}

impl CartLine {
    /// `None` if the line total does not fit in a [`Money`].
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartSnapshot {
    pub cart_id: i64,
    pub user_id: UserId,
    pub revision: i64,
    pub items: Vec<CartLine>,
    pub subtotal: Money,
    pub total_item_count: i64,
}

impl CartSnapshot {
    /// Totals the cart. Returns `None` if the subtotal is too large to represent.
    pub fn new(cart: &Cart, items: Vec<CartLine>) -> Option<Self> {
        let subtotal = Money::checked_sum(items.iter().map(CartLine::line_total).collect::<Option<Vec<_>>>()?)?;
        let total_item_count = items.iter().try_fold(0i64, |acc, i| acc.checked_add(i.quantity))?;
        let (cart_id, user_id, revision) = (cart.id, cart.user_id, cart.revision);
        Some(Self { cart_id, user_id, revision, items, subtotal, total_item_count })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Created at checkout. Waiting for payment.
    Pending,
    /// Paid (or cash on delivery confirmed) and being prepared.
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

string_enum!(OrderStatusType, "order status", {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl OrderStatusType {
    /// The status changes an administrator may make. Payment success drives `Pending -> Processing` on its own.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, Processing) |
                (Pending, Cancelled) |
                (Processing, Shipped) |
                (Processing, Cancelled) |
                (Processing, Refunded) |
                (Shipped, Delivered) |
                (Shipped, Refunded) |
                (Delivered, Refunded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Cancelled | OrderStatusType::Refunded)
    }

    /// Statuses that only make sense once the order has been paid for (cash-on-delivery orders are settled at
    /// checkout, so they qualify too).
    pub fn requires_payment(&self) -> bool {
        matches!(self, OrderStatusType::Processing | OrderStatusType::Shipped | OrderStatusType::Delivered)
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid online through the payment gateway.
    Flutterwave,
    /// Settled in cash when the goods arrive. No gateway involvement.
    CashOnDelivery,
}

string_enum!(PaymentMethod, "payment method", {
    Flutterwave => "flutterwave",
    CashOnDelivery => "cash_on_delivery",
});

impl PaymentMethod {
    pub fn uses_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Flutterwave)
    }
}

//--------------------------------------    ShippingInfo     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(default)]
    pub zip_code: String,
}

//--------------------------------------       Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    #[serde(skip)]
    pub id: i64,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatusType,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_country: String,
    pub shipping_zip_code: String,
    pub customer_phone: String,
    pub notes: String,
    pub payment_method: PaymentMethod,
    pub payment_status: bool,
    pub payment_reference: Option<String>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub tax: Money,
    pub total: Money,
    pub currency: String,
    #[serde(skip)]
    pub cart_revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn totals_are_consistent(&self) -> bool {
        self.total == self.subtotal + self.shipping_fee + self.tax
    }
}

/// Everything needed to write a new order row. Built inside the checkout transaction from the locked cart.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub shipping: ShippingInfo,
    pub customer_phone: String,
    pub notes: String,
    pub payment_method: PaymentMethod,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub tax: Money,
    pub total: Money,
    pub currency: String,
    pub cart_revision: i64,
}

//--------------------------------------     OrderItem       ---------------------------------------------------------
/// A frozen copy of a cart line. Catalog edits after checkout never reach these rows.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_price: Money,
    pub description: String,
    pub image_url: Option<String>,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Successful,
    Failed,
    Cancelled,
    Refunded,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Processing => "processing",
    Successful => "successful",
    Failed => "failed",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl PaymentStatus {
    /// No transition is permitted out of a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Successful | PaymentStatus::Cancelled | PaymentStatus::Refunded)
    }

    /// The payment is still waiting on the gateway.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }
}

//--------------------------------------      Payment        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    #[serde(skip)]
    pub id: i64,
    /// Public identifier. Doubles as the gateway transaction reference (`tx_ref`) for this attempt.
    pub payment_id: String,
    #[serde(skip)]
    pub order_id: i64,
    #[serde(skip)]
    pub user_id: UserId,
    pub gateway: String,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub gateway_transaction_id: Option<String>,
    pub gateway_reference: Option<String>,
    pub payment_link: Option<String>,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub requires_review: bool,
    #[serde(skip)]
    pub gateway_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn tx_ref(&self) -> &str {
        self.payment_id.as_str()
    }

    /// A payment can be retried if it has failed and has not used up its retries.
    pub fn can_retry(&self, max_retries: i64) -> bool {
        self.status == PaymentStatus::Failed && self.retry_count < max_retries
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_id: String,
    pub order_id: i64,
    pub user_id: UserId,
    pub gateway: String,
    pub amount: Money,
    pub currency: String,
    pub retry_count: i64,
}

impl NewPayment {
    /// Creates a payment attempt for the full order total, with a freshly generated payment id.
    pub fn for_order(order: &Order, gateway: &str, retry_count: i64) -> Self {
        Self {
            payment_id: new_payment_id(),
            order_id: order.id,
            user_id: order.user_id,
            gateway: gateway.to_string(),
            amount: order.total,
            currency: order.currency.clone(),
            retry_count,
        }
    }
}

pub fn new_payment_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
