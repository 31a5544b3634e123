use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NegotiationError {
    /// Every instrument is locked while a non-zero delta must be absorbed.
    #[error("Cannot redistribute {delta}: every payment form is locked, unlock one to continue")]
    CannotRedistribute { delta: Decimal },

    #[error("Real discount ceiling exceeded: projected {projected}% > ceiling {ceiling}%")]
    DiscountCeilingExceeded { projected: Decimal, ceiling: Decimal },

    #[error("Real discount is locked at {locked_value}%; unlock it before editing this field")]
    RealDiscountLocked { locked_value: Decimal },

    /// An edit for another field arrived while one was being processed.
    #[error("Edit to {requested} rejected: {active} edit still in progress")]
    EditInProgress { active: String, requested: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Payment instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Installment {number} not found on instrument {instrument}")]
    InstallmentNotFound { instrument: String, number: u32 },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl NegotiationError {
    /// Stable machine-readable code surfaced to the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            NegotiationError::CannotRedistribute { .. } => "CANNOT_REDISTRIBUTE",
            NegotiationError::DiscountCeilingExceeded { .. } => "DISCOUNT_CEILING_EXCEEDED",
            NegotiationError::RealDiscountLocked { .. } => "REAL_DISCOUNT_LOCKED",
            NegotiationError::EditInProgress { .. } => "EDIT_IN_PROGRESS",
            NegotiationError::InvalidInput { .. } => "INVALID_INPUT",
            NegotiationError::InstrumentNotFound(_) => "INSTRUMENT_NOT_FOUND",
            NegotiationError::InstallmentNotFound { .. } => "INSTALLMENT_NOT_FOUND",
            NegotiationError::DateError(_) => "DATE_ERROR",
            NegotiationError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<serde_json::Error> for NegotiationError {
    fn from(e: serde_json::Error) -> Self {
        NegotiationError::SerializationError(e.to_string())
    }
}
