use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use checkout_engine::{
    gateway::GatewayError,
    traits::{CartError, CheckoutDatabaseError, ErrorKind},
    CheckoutError,
    WebhookError,
};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NoRecordFound(String),
    #[error("The payment gateway could not be reached. Please try again shortly. {0}")]
    GatewayUnavailable(String),
    #[error("{0}")]
    GatewayError(String),
    #[error("The amount paid for {0} does not match the order total. The payment has been flagged for review.")]
    AmountMismatch(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl ServerError {
    /// The stable, machine-readable error code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) | Self::InvalidRequestBody(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::NoRecordFound(_) => "not_found",
            Self::GatewayUnavailable(_) => "network_error",
            Self::GatewayError(_) => "gateway_error",
            Self::AmountMismatch(_) => "amount_mismatch",
            Self::AuthenticationError(_) => "unauthorized",
            Self::InsufficientPermissions(_) => "forbidden",
            Self::InitializeError(_) | Self::BackendError(_) | Self::IOError(_) => "internal_error",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::AmountMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self.code() {
            "internal_error" => {
                error!("💻️ {self}");
                "Something went wrong on our side. Please try again later.".to_string()
            },
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message, "code": self.code() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("The access token is invalid. {0}")]
    ValidationError(String),
    #[error("The access token has expired.")]
    Expired,
    #[error("The access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
}

impl From<CheckoutDatabaseError> for ServerError {
    fn from(e: CheckoutDatabaseError) -> Self {
        match e.kind() {
            ErrorKind::Validation => Self::ValidationError(e.to_string()),
            ErrorKind::Conflict => Self::Conflict(e.to_string()),
            ErrorKind::NotFound => Self::NoRecordFound(e.to_string()),
            ErrorKind::Internal => Self::BackendError(e.to_string()),
        }
    }
}

impl From<CartError> for ServerError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::DatabaseError(_) => Self::BackendError(e.to_string()),
            CartError::InvalidQuantity(_) | CartError::QuantityLimitExceeded(_) | CartError::AmountOutOfRange => {
                Self::ValidationError(e.to_string())
            },
            CartError::ProductNotFound(_) | CartError::ItemNotFound(_) => Self::NoRecordFound(e.to_string()),
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        if e.is_retryable() {
            Self::GatewayUnavailable(e.to_string())
        } else {
            Self::GatewayError(e.to_string())
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Database(e) => e.into(),
            CheckoutError::Cart(e) => e.into(),
            CheckoutError::Gateway(e) => e.into(),
            CheckoutError::NotFound(what) => Self::NoRecordFound(format!("{what} was not found")),
        }
    }
}

impl From<WebhookError> for ServerError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::Unauthorized => Self::AuthenticationError(AuthError::ValidationError(e.to_string())),
            WebhookError::MalformedPayload(_) => Self::InvalidRequestBody(e.to_string()),
            WebhookError::PaymentNotFound(_) => Self::NoRecordFound(e.to_string()),
            WebhookError::Gateway(e) => e.into(),
            WebhookError::Database(e) => e.into(),
        }
    }
}
