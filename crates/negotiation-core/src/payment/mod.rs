pub mod instrument;
pub mod schedule;
pub mod valuation;

pub use instrument::{InstrumentKind, InstrumentSpec, InstrumentTerms, PaymentInstrument};
pub use schedule::Installment;
