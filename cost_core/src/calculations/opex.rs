//! # Operating-Cost Present Value
//!
//! Discounted sum of yearly energy and maintenance costs over the project
//! horizon, with independent growth rates for the two streams:
//!
//! ```text
//! E_t  = surface × energy_per_m2 × (1 + infl_E)^(t-1)
//! M_t  = works_cost × maint_pct  × (1 + infl_M)^(t-1)
//! PV   = Σ_{t=1..N} (E_t + M_t) / (1 + r)^t
//! ```
//!
//! The sum is accumulated year by year; no closed-form annuity is used.
//!
//! ## Example
//!
//! ```rust
//! use cost_core::calculations::opex::{calculate, OpexInput};
//!
//! let input = OpexInput {
//!     surface: 1000.0,
//!     energy_per_m2: 8.0,
//!     works_cost: 2_000_000.0,
//!     maint_fraction: 0.01,
//!     inflation_energy: 0.0,
//!     inflation_maint: 0.0,
//!     discount_rate: 0.0,
//!     horizon_years: 1,
//! };
//!
//! let projection = calculate(&input);
//! assert_eq!(projection.present_value, 8_000.0 + 20_000.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::state::ProjectState;

/// Engine-ready opex parameters (rates as fractions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpexInput {
    /// Floor area in m²
    pub surface: f64,

    /// Year-1 energy cost per m²
    pub energy_per_m2: f64,

    /// Works cost the maintenance stream is based on
    pub works_cost: f64,

    /// Yearly maintenance as a fraction of works cost
    pub maint_fraction: f64,

    pub inflation_energy: f64,
    pub inflation_maint: f64,
    pub discount_rate: f64,

    /// Number of projected years, at least 1
    pub horizon_years: u32,
}

impl OpexInput {
    /// Convert a project's percentage-based parameters.
    ///
    /// The horizon is truncated to whole years, at least one.
    pub fn from_state(state: &ProjectState, works_cost: f64) -> Self {
        OpexInput {
            surface: state.surface,
            energy_per_m2: state.opex_energy_base,
            works_cost,
            maint_fraction: state.opex_maint_pct / 100.0,
            inflation_energy: state.inflation_energy / 100.0,
            inflation_maint: state.inflation_maint / 100.0,
            discount_rate: state.discount_rate / 100.0,
            horizon_years: horizon_years(state.opex_horizon),
        }
    }

    /// Year-1 energy cost
    pub fn energy_year_one(&self) -> f64 {
        self.surface * self.energy_per_m2
    }

    /// Year-1 maintenance cost
    pub fn maintenance_year_one(&self) -> f64 {
        self.works_cost * self.maint_fraction
    }
}

/// Whole number of projected years for a stored horizon.
pub fn horizon_years(opex_horizon: f64) -> u32 {
    let years = if opex_horizon.is_finite() { opex_horizon.max(1.0) } else { 1.0 };
    // saturating cast: horizons beyond u32::MAX years read as u32::MAX
    years.floor() as u32
}

/// One projected year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpexYear {
    /// 1-based year index
    pub year: u32,
    pub energy: f64,
    pub maintenance: f64,

    /// (1 + r)^t
    pub discount_factor: f64,

    /// (energy + maintenance) / discount_factor
    pub present_value: f64,
}

/// Yearly schedule and its discounted total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpexProjection {
    pub years: Vec<OpexYear>,
    pub present_value: f64,
}

/// Project the yearly costs and accumulate their present value.
pub fn calculate(input: &OpexInput) -> OpexProjection {
    let energy_one = input.energy_year_one();
    let maint_one = input.maintenance_year_one();
    let years_count = input.horizon_years.max(1);

    let mut years = Vec::new();
    let mut present_value = 0.0;
    for t in 1..=years_count {
        let growth_exp = f64::from(t - 1);
        let energy = energy_one * (1.0 + input.inflation_energy).powf(growth_exp);
        let maintenance = maint_one * (1.0 + input.inflation_maint).powf(growth_exp);
        let discount_factor = (1.0 + input.discount_rate).powf(f64::from(t));
        let year_pv = (energy + maintenance) / discount_factor;
        present_value += year_pv;
        years.push(OpexYear {
            year: t,
            energy,
            maintenance,
            discount_factor,
            present_value: year_pv,
        });
    }

    OpexProjection { years, present_value }
}

/// Yearly projection for a project.
pub fn opex_projection(state: &ProjectState, works_cost: f64) -> OpexProjection {
    calculate(&OpexInput::from_state(state, works_cost))
}

/// Discounted operating cost for a project.
pub fn opex_present_value(state: &ProjectState, works_cost: f64) -> f64 {
    opex_projection(state, works_cost).present_value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referential::Referential;

    fn base_input() -> OpexInput {
        OpexInput {
            surface: 1000.0,
            energy_per_m2: 8.0,
            works_cost: 2_330_000.0,
            maint_fraction: 0.01,
            inflation_energy: 0.02,
            inflation_maint: 0.02,
            discount_rate: 0.03,
            horizon_years: 30,
        }
    }

    #[test]
    fn test_single_year_without_rates() {
        let input = OpexInput {
            horizon_years: 1,
            inflation_energy: 0.05,
            inflation_maint: 0.07,
            discount_rate: 0.0,
            ..base_input()
        };
        let projection = calculate(&input);
        assert_eq!(projection.years.len(), 1);
        // growth only starts in year 2
        assert_eq!(projection.present_value, input.energy_year_one() + input.maintenance_year_one());
        assert!((projection.present_value - 31_300.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_streams_without_discount() {
        let input = OpexInput {
            inflation_energy: 0.0,
            inflation_maint: 0.0,
            discount_rate: 0.0,
            horizon_years: 10,
            ..base_input()
        };
        let projection = calculate(&input);
        assert!((projection.present_value - 10.0 * (8_000.0 + 23_300.0)).abs() < 1e-6);
    }

    #[test]
    fn test_discounting_matches_manual_sum() {
        let input = OpexInput {
            horizon_years: 3,
            ..base_input()
        };
        let e = 8_000.0;
        let m = 23_300.0;
        let expected = (e + m) / 1.03
            + (e * 1.02 + m * 1.02) / 1.03f64.powi(2)
            + (e * 1.02f64.powi(2) + m * 1.02f64.powi(2)) / 1.03f64.powi(3);
        let projection = calculate(&input);
        assert!((projection.present_value - expected).abs() < 1e-6);
        assert_eq!(projection.years[2].year, 3);
        assert!((projection.years[2].discount_factor - 1.03f64.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn test_independent_growth_rates() {
        let input = OpexInput {
            inflation_energy: 0.10,
            inflation_maint: 0.0,
            discount_rate: 0.0,
            horizon_years: 2,
            ..base_input()
        };
        let projection = calculate(&input);
        assert!((projection.years[1].energy - 8_800.0).abs() < 1e-9);
        assert_eq!(projection.years[1].maintenance, 23_300.0);
    }

    #[test]
    fn test_schedule_sums_to_present_value() {
        let projection = calculate(&base_input());
        assert_eq!(projection.years.len(), 30);
        let total: f64 = projection.years.iter().map(|y| y.present_value).sum();
        assert!((total - projection.present_value).abs() < 1e-6);
    }

    #[test]
    fn test_horizon_years_clamping() {
        assert_eq!(horizon_years(30.0), 30);
        assert_eq!(horizon_years(2.7), 2);
        assert_eq!(horizon_years(0.0), 1);
        assert_eq!(horizon_years(-5.0), 1);
        assert_eq!(horizon_years(f64::NAN), 1);
        assert_eq!(horizon_years(1500.9), 1500);
        assert_eq!(horizon_years(1e9), 1_000_000_000);
    }

    #[test]
    fn test_long_horizon_sums_every_year() {
        let referential = Referential::default();
        let mut state = ProjectState::default_for(&referential);
        state.opex_horizon = 1500.0;
        state.opex_maint_pct = 0.0;
        state.inflation_energy = 0.0;
        state.inflation_maint = 0.0;
        state.discount_rate = 0.0;

        let projection = opex_projection(&state, 1_000_000.0);
        assert_eq!(projection.years.len(), 1500);
        assert!((projection.present_value - 1500.0 * 12_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_horizon_input_still_projects_one_year() {
        let input = OpexInput {
            horizon_years: 0,
            ..base_input()
        };
        assert_eq!(calculate(&input).years.len(), 1);
    }

    #[test]
    fn test_from_state_converts_percentages() {
        let referential = Referential::default();
        let state = ProjectState::default_for(&referential);
        let input = OpexInput::from_state(&state, 1_000_000.0);
        assert!((input.maint_fraction - 0.01).abs() < 1e-12);
        assert!((input.inflation_energy - 0.02).abs() < 1e-12);
        assert!((input.discount_rate - 0.03).abs() < 1e-12);
        assert_eq!(input.horizon_years, 30);
        assert_eq!(input.energy_year_one(), 12_000.0);
        assert_eq!(input.maintenance_year_one(), 10_000.0);
    }

    #[test]
    fn test_present_value_shrinks_with_discount_rate() {
        let referential = Referential::default();
        let mut state = ProjectState::default_for(&referential);
        state.discount_rate = 1.0;
        let low = opex_present_value(&state, 1_000_000.0);
        state.discount_rate = 6.0;
        let high = opex_present_value(&state, 1_000_000.0);
        assert!(high < low);
    }
}
