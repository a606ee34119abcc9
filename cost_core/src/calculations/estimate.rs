//! # Estimate
//!
//! Full recomputation of every derived figure for a (referential, state)
//! pair. There is no incremental update: callers recompute after every edit.
//!
//! ## Example
//!
//! ```rust
//! use cost_core::calculations::estimate::estimate;
//! use cost_core::referential::Referential;
//! use cost_core::state::ProjectState;
//!
//! let referential = Referential::default();
//! let mut state = ProjectState::default_for(&referential);
//! state.initialize_lines(&referential);
//!
//! let result = estimate(&referential, &state);
//! assert!(result.global > result.works_cost);
//! assert!(result.lots.ratios_valid());
//! ```

use serde::{Deserialize, Serialize};

use crate::calculations::fees::{fee_breakdown, FeeBreakdown};
use crate::calculations::lots::{lots_breakdown, LotsBreakdown};
use crate::calculations::opex::{opex_projection, OpexProjection};
use crate::calculations::unit_cost::{adjusted_unit_base, UnitCost};
use crate::referential::Referential;
use crate::state::ProjectState;

/// Every derived figure for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub unit_cost: UnitCost,

    /// Capital cost (€)
    pub works_cost: f64,

    pub lots: LotsBreakdown,
    pub fees: FeeBreakdown,
    pub opex: OpexProjection,

    /// Works + fees + discounted opex (€)
    pub global: f64,

    /// Global cost per m², 0 when surface ≤ 0
    pub global_per_m2: f64,
}

/// Works cost + fee total + opex present value.
pub fn grand_total(works_cost: f64, fee_total: f64, opex_present_value: f64) -> f64 {
    works_cost + fee_total + opex_present_value
}

/// Global cost per m², guarded against non-positive surfaces.
pub fn per_area(global: f64, surface: f64) -> f64 {
    if surface > 0.0 {
        global / surface
    } else {
        0.0
    }
}

/// Compute every derived figure.
pub fn estimate(referential: &Referential, state: &ProjectState) -> Estimate {
    let unit_cost = adjusted_unit_base(referential, state);
    let works_cost = state.surface * unit_cost.base_ajustee;
    let lots = lots_breakdown(state, works_cost);
    let fees = fee_breakdown(state, works_cost);
    let opex = opex_projection(state, works_cost);
    let global = grand_total(works_cost, fees.total, opex.present_value);

    Estimate {
        unit_cost,
        works_cost,
        lots,
        fees,
        opex,
        global,
        global_per_m2: per_area(global, state.surface),
    }
}
