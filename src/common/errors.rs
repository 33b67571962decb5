//! Error types for the application

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using our BotError
pub type Result<T> = std::result::Result<T, BotError>;

/// Main error type for trading operations
#[derive(Error, Debug)]
pub enum BotError {
    /// Market data for a pair is missing or unusable this tick
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Order notional is below the exchange minimum for the pair
    #[error("Order not placed: amount ${amount:.2} is below the minimum required ${minimum:.2} for {pair}")]
    BelowMinimumNotional {
        pair: String,
        amount: Decimal,
        minimum: Decimal,
    },

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The exchange rejected the request
    #[error("Exchange error {code}: {message}")]
    Exchange { code: i64, message: String },

    /// Rate limiting errors
    #[error("Rate limit exceeded: {message}, retry after {retry_after_seconds:?} seconds")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Position state is inconsistent with the requested mutation
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// True for state-corruption faults that must halt the affected pair
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, BotError::InvariantViolation(_))
    }

    /// True for failures of a call made against the exchange
    pub fn is_exchange_failure(&self) -> bool {
        matches!(
            self,
            BotError::HttpRequest(_)
                | BotError::JsonParse(_)
                | BotError::Exchange { .. }
                | BotError::RateLimit { .. }
                | BotError::Authentication(_)
                | BotError::InvalidResponse(_)
        )
    }
}
