pub mod config;
pub mod error;
pub mod negotiation;
pub mod payment;
pub mod time_value;
pub mod types;

#[cfg(feature = "session")]
pub mod session;

#[cfg(feature = "timeline")]
pub mod timeline;

pub use config::{CeilingPolicy, NegotiationConfig};
pub use error::NegotiationError;
pub use negotiation::{Edit, EditField, EditOutcome, EditWarning, NegotiationState};
pub use payment::{InstrumentKind, InstrumentSpec, InstrumentTerms, PaymentInstrument};
pub use types::*;

/// Standard result type for all negotiation operations
pub type NegotiationResult<T> = Result<T, NegotiationError>;
