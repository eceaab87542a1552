use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FlutterwaveApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    /// The request never got an answer: connection failure or timeout.
    #[error("Could not reach Flutterwave: {0}")]
    Network(String),
    #[error("Flutterwave returned HTTP {status}. {message}")]
    QueryError { status: u16, message: String },
    /// A 2xx response whose body did not say `"status": "success"`.
    #[error("Flutterwave declined the request: {0}")]
    Rejected(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Flutterwave did not return a payment link")]
    MissingLink,
}

impl FlutterwaveApiError {
    pub fn is_network_error(&self) -> bool {
        matches!(self, FlutterwaveApiError::Network(_))
    }
}

impl From<reqwest::Error> for FlutterwaveApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FlutterwaveApiError::JsonError(e.to_string())
        } else if e.is_builder() {
            FlutterwaveApiError::Initialization(e.to_string())
        } else {
            FlutterwaveApiError::Network(e.to_string())
        }
    }
}
