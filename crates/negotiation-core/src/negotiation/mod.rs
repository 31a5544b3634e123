pub mod redistribution;
pub mod simulation;
pub mod solver;
pub mod state;
pub mod summary;

pub use redistribution::{redistribute, Redistribution};
pub use solver::{solve_for_real_discount, RealDiscountSolution, SolverParams};
pub use state::{Edit, EditField, EditOutcome, EditWarning, NegotiationState};
