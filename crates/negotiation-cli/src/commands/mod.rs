pub mod instrument;
pub mod negotiation;
