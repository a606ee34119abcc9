//! # Adjusted Unit Base
//!
//! Per-m² cost after geography, regulatory/structural surcharges and system
//! additions:
//!
//! ```text
//! base_ajustee = base × indiceGeo × (1 + Σ surcharges) + Σ additions
//!
//! base       = typologies[typologie]
//! surcharges = reglementation + typeConstructif + contrainteSol + contrainteTerrain
//! additions  = chauffage + ventilation + ajoutPerso
//! ```
//!
//! A selection missing from the referential contributes 0. Surface does not
//! enter the unit base; see [`works_cost`] for the capital cost.
//!
//! ## Example
//!
//! ```rust
//! use cost_core::calculations::unit_cost::adjusted_unit_base;
//! use cost_core::referential::Referential;
//! use cost_core::state::ProjectState;
//!
//! let referential = Referential::default();
//! let mut state = ProjectState::default_for(&referential);
//! state.reglementation = "RE2020".to_string();
//! state.chauffage = "PAC air/eau".to_string();
//! state.ventilation = "VMC double flux".to_string();
//!
//! let unit = adjusted_unit_base(&referential, &state);
//! assert!((unit.base_ajustee - 2330.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

use crate::referential::{RateBranch, Referential};
use crate::state::ProjectState;

/// Terms of the unit base formula, kept for display and export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitCostDetails {
    /// Typology base cost (€/m²)
    pub base: f64,

    /// Geographic index
    pub indice: f64,

    /// Sum of surcharge fractions
    pub surcouts: f64,

    /// Sum of flat additions (€/m²)
    pub additions: f64,
}

/// Adjusted unit base and its breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCost {
    /// Adjusted cost per m²
    pub base_ajustee: f64,

    pub details: UnitCostDetails,
}

fn selected_rate(referential: &Referential, state: &ProjectState, branch: RateBranch) -> f64 {
    state
        .selection(branch)
        .map_or(0.0, |key| referential.rate(branch, key))
}

/// Compute the adjusted cost per m².
pub fn adjusted_unit_base(referential: &Referential, state: &ProjectState) -> UnitCost {
    let base = selected_rate(referential, state, RateBranch::Typologies);
    let indice = state.indice_geo;
    let surcouts = selected_rate(referential, state, RateBranch::Reglementation)
        + selected_rate(referential, state, RateBranch::TypeConstructif)
        + selected_rate(referential, state, RateBranch::ContrainteSol)
        + selected_rate(referential, state, RateBranch::ContrainteTerrain);
    let additions = selected_rate(referential, state, RateBranch::Chauffage)
        + selected_rate(referential, state, RateBranch::Ventilation)
        + state.ajout_perso;

    UnitCost {
        base_ajustee: base * indice * (1.0 + surcouts) + additions,
        details: UnitCostDetails {
            base,
            indice,
            surcouts,
            additions,
        },
    }
}

/// Capital (works) cost: surface × adjusted unit base.
pub fn works_cost(referential: &Referential, state: &ProjectState) -> f64 {
    state.surface * adjusted_unit_base(referential, state).base_ajustee
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_state(referential: &Referential) -> ProjectState {
        let mut state = ProjectState::default_for(referential);
        state.typologie = "Logement collectif".to_string();
        state.reglementation = "RE2020".to_string();
        state.type_constructif = "Trad béton".to_string();
        state.contrainte_sol = "Standard".to_string();
        state.contrainte_terrain = "Plat".to_string();
        state.chauffage = "PAC air/eau".to_string();
        state.ventilation = "VMC double flux".to_string();
        state.indice_geo = 1.0;
        state.ajout_perso = 0.0;
        state.surface = 1000.0;
        state
    }

    #[test]
    fn test_reference_example() {
        let referential = Referential::default();
        let state = example_state(&referential);
        let unit = adjusted_unit_base(&referential, &state);

        assert_eq!(unit.details.base, 1800.0);
        assert_eq!(unit.details.indice, 1.0);
        assert!((unit.details.surcouts - 0.20).abs() < 1e-12);
        assert_eq!(unit.details.additions, 170.0);
        assert!((unit.base_ajustee - 2330.0).abs() < 1e-9);
        assert!((works_cost(&referential, &state) - 2_330_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_keys_contribute_zero() {
        let referential = Referential::default();
        let mut state = example_state(&referential);
        state.reglementation = "RE2050".to_string();
        state.chauffage = "Poêle".to_string();
        let unit = adjusted_unit_base(&referential, &state);
        assert_eq!(unit.details.surcouts, 0.0);
        assert_eq!(unit.details.additions, 50.0);
        assert_eq!(unit.base_ajustee, 1850.0);

        state.typologie = "Hangar".to_string();
        assert_eq!(adjusted_unit_base(&referential, &state).base_ajustee, 50.0);
    }

    #[test]
    fn test_linear_in_geographic_index() {
        let referential = Referential::default();
        let mut state = example_state(&referential);
        state.indice_geo = 1.0;
        let one = adjusted_unit_base(&referential, &state);
        state.indice_geo = 2.0;
        let two = adjusted_unit_base(&referential, &state);
        state.indice_geo = 3.0;
        let three = adjusted_unit_base(&referential, &state);

        let step = two.base_ajustee - one.base_ajustee;
        assert!((three.base_ajustee - two.base_ajustee - step).abs() < 1e-9);
        assert!((step - 1800.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_surface_does_not_enter_unit_base() {
        let referential = Referential::default();
        let mut state = example_state(&referential);
        let before = adjusted_unit_base(&referential, &state);
        state.surface = 12.5;
        assert_eq!(adjusted_unit_base(&referential, &state), before);
    }

    #[test]
    fn test_monotonic_in_terms() {
        let referential = Referential::default();
        let mut state = example_state(&referential);
        let baseline = adjusted_unit_base(&referential, &state).base_ajustee;

        state.contrainte_sol = "Présence d'eau / drainage".to_string();
        let with_soil = adjusted_unit_base(&referential, &state).base_ajustee;
        assert!(with_soil >= baseline);

        state.ajout_perso = 35.0;
        let with_custom = adjusted_unit_base(&referential, &state).base_ajustee;
        assert!(with_custom >= with_soil);
        assert!((with_custom - with_soil - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_surface_has_zero_works_cost() {
        let referential = Referential::default();
        let mut state = example_state(&referential);
        state.surface = 0.0;
        assert_eq!(works_cost(&referential, &state), 0.0);
    }
}
