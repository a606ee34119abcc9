//! # Cost Calculations
//!
//! Pure, deterministic functions of `(Referential, ProjectState)`. None of
//! them can fail: a selection missing from the referential contributes 0,
//! and malformed numbers are the normalization layer's job.
//!
//! ## Available Calculations
//!
//! - [`unit_cost`] - Adjusted cost per m² and works cost
//! - [`lots`] - Trade line item amounts and the ratio-total signal
//! - [`fees`] - Professional fee amounts
//! - [`opex`] - Discounted operating-cost projection
//! - [`estimate`] - Everything above plus grand totals

pub mod estimate;
pub mod fees;
pub mod lots;
pub mod opex;
pub mod unit_cost;

// Re-export commonly used types
pub use estimate::{estimate, Estimate};
pub use fees::{fee_breakdown, fee_total, FeeAmount, FeeBreakdown};
pub use lots::{lots_breakdown, LotAmount, LotsBreakdown};
pub use opex::{opex_present_value, opex_projection, OpexInput, OpexProjection, OpexYear};
pub use unit_cost::{adjusted_unit_base, works_cost, UnitCost, UnitCostDetails};
