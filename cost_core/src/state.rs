//! # Project State
//!
//! One building's worth of inputs: the selected category per referential
//! branch, the surface, geographic index and custom addition, the trade line
//! items (lots), the fee lines (honoraires) and six operating-cost parameters.
//!
//! The opex percentages (`opexMaintPct`, `inflationEnergy`, `inflationMaint`,
//! `discountRate`) are stored as percentages and divided by 100 by the engine.
//!
//! ## Example
//!
//! ```rust
//! use cost_core::referential::Referential;
//! use cost_core::state::normalize_state;
//! use serde_json::json;
//!
//! let referential = Referential::default();
//! let state = normalize_state(&json!({ "surface": "abc", "typologie": "Tertiaire" }), &referential);
//!
//! assert_eq!(state.typologie, "Tertiaire");
//! assert_eq!(state.surface, 1000.0); // non-numeric input falls back to the default
//! assert_eq!(state.reglementation, "RT2012"); // first key of the branch
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CostError, CostResult};
use crate::numeric::{coerce_finite_or, coerce_opt_finite_or};
use crate::referential::{RateBranch, RateTable, Referential, FALLBACK_PRESET_TYPOLOGY};

/// Default surface for a new project (m²)
pub const DEFAULT_SURFACE: f64 = 1000.0;

/// Energy seed used when the referential has no cost for the heating system
pub const DEFAULT_ENERGY_BASE: f64 = 10.0;

/// Name given to a lot added by hand
pub const NEW_LOT_NAME: &str = "Nouveau lot";

/// Keys interpreted by [`normalize_state`]; anything else is kept verbatim.
const STATE_KEYS: [&str; 18] = [
    "typologie",
    "surface",
    "indiceGeo",
    "reglementation",
    "typeConstructif",
    "contrainteSol",
    "contrainteTerrain",
    "chauffage",
    "ventilation",
    "ajoutPerso",
    "opexHorizon",
    "opexEnergyBase",
    "opexMaintPct",
    "inflationEnergy",
    "inflationMaint",
    "discountRate",
    "lots",
    "honos",
];

/// A construction trade with its share of the works cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLineItem {
    pub name: String,

    /// Share of works cost in percent
    pub ratio: f64,
}

impl TradeLineItem {
    pub fn new(name: impl Into<String>, ratio: f64) -> Self {
        TradeLineItem {
            name: name.into(),
            ratio,
        }
    }

    /// Read a lot from loose JSON; non-objects are rejected.
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let name = match map.get("name") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Some(TradeLineItem {
            name,
            ratio: coerce_opt_finite_or(map.get("ratio"), 0.0),
        })
    }
}

/// Inputs for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub typologie: String,

    /// Floor area in m²
    pub surface: f64,

    /// Geographic multiplier on the base cost
    pub indice_geo: f64,

    pub reglementation: String,
    pub type_constructif: String,
    pub contrainte_sol: String,
    pub contrainte_terrain: String,
    pub chauffage: String,
    pub ventilation: String,

    /// Free-form addition in €/m²
    pub ajout_perso: f64,

    /// Projection horizon in years
    pub opex_horizon: f64,

    /// Yearly energy cost in €/m²
    pub opex_energy_base: f64,

    /// Yearly maintenance, % of works cost
    pub opex_maint_pct: f64,

    /// % per year
    pub inflation_energy: f64,

    /// % per year
    pub inflation_maint: f64,

    /// % per year
    pub discount_rate: f64,

    /// Trade line items, in display order
    pub lots: Vec<TradeLineItem>,

    /// Fee role -> fraction of works cost
    pub honos: IndexMap<String, f64>,

    /// Keys this version does not interpret
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ProjectState {
    /// Defaults derived from a referential.
    ///
    /// Selections are the first key of each branch, opex seeds come from the
    /// referential's opex bundle, lots and honos start empty.
    pub fn default_for(referential: &Referential) -> Self {
        let first = |branch: RateBranch, fallback: &str| {
            referential.first_key(branch).unwrap_or(fallback).to_string()
        };
        let opex = &referential.opex;
        let energy_base = referential
            .first_key(RateBranch::Chauffage)
            .and_then(|heating| opex.energy_eur_per_m2.get(heating))
            .copied()
            .unwrap_or(DEFAULT_ENERGY_BASE);

        ProjectState {
            typologie: first(RateBranch::Typologies, "Logement collectif"),
            surface: DEFAULT_SURFACE,
            indice_geo: 1.0,
            reglementation: first(RateBranch::Reglementation, "RE2020"),
            type_constructif: first(RateBranch::TypeConstructif, "Trad béton"),
            contrainte_sol: first(RateBranch::ContrainteSol, "Standard"),
            contrainte_terrain: first(RateBranch::ContrainteTerrain, "Plat"),
            chauffage: first(RateBranch::Chauffage, "PAC air/eau"),
            ventilation: first(RateBranch::Ventilation, "VMC double flux"),
            ajout_perso: 0.0,
            opex_horizon: f64::from(opex.horizon_years),
            opex_energy_base: energy_base,
            opex_maint_pct: opex.maintenance_pct_of_works * 100.0,
            inflation_energy: opex.inflation_energy * 100.0,
            inflation_maint: opex.inflation_maint * 100.0,
            discount_rate: opex.discount_rate * 100.0,
            lots: Vec::new(),
            honos: IndexMap::new(),
            extensions: Map::new(),
        }
    }

    /// Parse and normalize a state from JSON text.
    pub fn from_json_str(text: &str, referential: &Referential) -> CostResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| CostError::invalid_data(e.to_string()))?;
        Ok(normalize_state(&value, referential))
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Selected key for a referential branch.
    ///
    /// Fee roles are not a single selection, so `Honoraires` yields `None`.
    pub fn selection(&self, branch: RateBranch) -> Option<&str> {
        let key = match branch {
            RateBranch::Typologies => &self.typologie,
            RateBranch::Reglementation => &self.reglementation,
            RateBranch::TypeConstructif => &self.type_constructif,
            RateBranch::ContrainteSol => &self.contrainte_sol,
            RateBranch::ContrainteTerrain => &self.contrainte_terrain,
            RateBranch::Chauffage => &self.chauffage,
            RateBranch::Ventilation => &self.ventilation,
            RateBranch::Honoraires => return None,
        };
        Some(key.as_str())
    }

    /// Populate lots from the typology preset when the list is empty.
    ///
    /// Falls back to the "Logement collectif" preset, then to the first
    /// preset. Returns true when lots were populated.
    pub fn ensure_lots_initialized(&mut self, referential: &Referential) -> bool {
        if !self.lots.is_empty() {
            return false;
        }
        let preset = referential
            .preset_for(&self.typologie)
            .or_else(|| referential.preset_for(FALLBACK_PRESET_TYPOLOGY))
            .or_else(|| referential.lots_presets.values().next());
        match preset {
            Some(preset) => {
                self.lots = lots_from_preset(preset);
                !self.lots.is_empty()
            }
            None => false,
        }
    }

    /// Copy fee roles from the referential.
    ///
    /// An empty fee map receives every role; otherwise only roles missing
    /// from the state are added, user-edited fractions are kept.
    pub fn ensure_honos_initialized(&mut self, referential: &Referential) {
        if self.honos.is_empty() {
            self.honos = referential.honoraires.clone();
            return;
        }
        for (role, fraction) in &referential.honoraires {
            self.honos.entry(role.clone()).or_insert(*fraction);
        }
    }

    /// Lazily fill lots and fee lines.
    pub fn initialize_lines(&mut self, referential: &Referential) {
        self.ensure_lots_initialized(referential);
        self.ensure_honos_initialized(referential);
    }

    /// Replace the lots with the preset of the selected typology.
    pub fn apply_lots_preset(&mut self, referential: &Referential) -> CostResult<()> {
        let preset = referential
            .preset_for(&self.typologie)
            .ok_or_else(|| CostError::preset_not_found(&self.typologie))?;
        self.lots = lots_from_preset(preset);
        Ok(())
    }

    /// Append a lot and return its index.
    pub fn add_lot(&mut self, name: impl Into<String>, ratio: f64) -> usize {
        let ratio = if ratio.is_finite() { ratio } else { 0.0 };
        self.lots.push(TradeLineItem::new(name, ratio));
        self.lots.len() - 1
    }

    fn check_lot_index(&self, index: usize) -> CostResult<()> {
        if index >= self.lots.len() {
            return Err(CostError::invalid_input(
                "lots",
                index.to_string(),
                format!("Only {} lots defined", self.lots.len()),
            ));
        }
        Ok(())
    }

    /// Rename a lot and/or change its ratio; non-finite ratios become 0.
    pub fn update_lot(&mut self, index: usize, name: Option<String>, ratio: Option<f64>) -> CostResult<&TradeLineItem> {
        self.check_lot_index(index)?;
        let lot = &mut self.lots[index];
        if let Some(name) = name {
            lot.name = name;
        }
        if let Some(ratio) = ratio {
            lot.ratio = if ratio.is_finite() { ratio } else { 0.0 };
        }
        Ok(&*lot)
    }

    /// Remove the lot at `index`.
    pub fn remove_lot(&mut self, index: usize) -> CostResult<TradeLineItem> {
        self.check_lot_index(index)?;
        Ok(self.lots.remove(index))
    }

    /// Set a fee fraction, adding the role when missing; non-finite becomes 0.
    pub fn set_hono(&mut self, role: impl Into<String>, fraction: f64) {
        let fraction = if fraction.is_finite() { fraction } else { 0.0 };
        self.honos.insert(role.into(), fraction);
    }

    /// Suggested yearly energy cost per m² for the selected systems.
    ///
    /// Advisory: the state's own `opex_energy_base` is never overwritten.
    pub fn suggested_energy_base(&self, referential: &Referential) -> f64 {
        let opex = &referential.opex;
        let heating = opex
            .energy_eur_per_m2
            .get(&self.chauffage)
            .copied()
            .unwrap_or(DEFAULT_ENERGY_BASE);
        let ventilation = opex
            .ventilation_energy_adj
            .get(&self.ventilation)
            .copied()
            .unwrap_or(0.0);
        heating + ventilation
    }
}

fn lots_from_preset(preset: &RateTable) -> Vec<TradeLineItem> {
    preset
        .iter()
        .map(|(name, ratio)| TradeLineItem::new(name.clone(), *ratio))
        .collect()
}

/// Selected label; numbers are read as their label text (`2020` -> `"2020"`).
fn selection_or(map: &Map<String, Value>, key: &str, default: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

/// Repair an arbitrary value into a complete project state.
///
/// The candidate is overlaid key by key onto [`ProjectState::default_for`].
/// `lots` must be a list and `honos` a map, otherwise they are emptied.
/// Every numeric field goes through [`coerce_finite_or`] with the base
/// default as fallback, so nothing ends up NaN, infinite or silently zero.
pub fn normalize_state(candidate: &Value, referential: &Referential) -> ProjectState {
    let base = ProjectState::default_for(referential);
    let Some(map) = candidate.as_object() else {
        return base;
    };

    let number = |key: &str, default: f64| coerce_opt_finite_or(map.get(key), default);

    let lots = match map.get("lots") {
        Some(Value::Array(items)) => items.iter().filter_map(TradeLineItem::from_value).collect(),
        _ => Vec::new(),
    };
    let honos = match map.get("honos") {
        Some(Value::Object(roles)) => roles
            .iter()
            .map(|(role, fraction)| (role.clone(), coerce_finite_or(fraction, 0.0)))
            .collect(),
        _ => IndexMap::new(),
    };

    ProjectState {
        typologie: selection_or(map, "typologie", &base.typologie),
        surface: number("surface", base.surface),
        indice_geo: number("indiceGeo", base.indice_geo),
        reglementation: selection_or(map, "reglementation", &base.reglementation),
        type_constructif: selection_or(map, "typeConstructif", &base.type_constructif),
        contrainte_sol: selection_or(map, "contrainteSol", &base.contrainte_sol),
        contrainte_terrain: selection_or(map, "contrainteTerrain", &base.contrainte_terrain),
        chauffage: selection_or(map, "chauffage", &base.chauffage),
        ventilation: selection_or(map, "ventilation", &base.ventilation),
        ajout_perso: number("ajoutPerso", base.ajout_perso),
        opex_horizon: number("opexHorizon", base.opex_horizon),
        opex_energy_base: number("opexEnergyBase", base.opex_energy_base),
        opex_maint_pct: number("opexMaintPct", base.opex_maint_pct),
        inflation_energy: number("inflationEnergy", base.inflation_energy),
        inflation_maint: number("inflationMaint", base.inflation_maint),
        discount_rate: number("discountRate", base.discount_rate),
        lots,
        honos,
        extensions: map
            .iter()
            .filter(|(key, _)| !STATE_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn numeric_fields(state: &ProjectState) -> [f64; 9] {
        [
            state.surface,
            state.indice_geo,
            state.ajout_perso,
            state.opex_horizon,
            state.opex_energy_base,
            state.opex_maint_pct,
            state.inflation_energy,
            state.inflation_maint,
            state.discount_rate,
        ]
    }

    #[test]
    fn test_base_defaults_follow_referential() {
        let referential = Referential::default();
        let state = ProjectState::default_for(&referential);
        assert_eq!(state.typologie, "Logement collectif");
        assert_eq!(state.reglementation, "RT2012");
        assert_eq!(state.chauffage, "Électrique radiateurs");
        assert_eq!(state.ventilation, "VMC simple flux");
        assert_eq!(state.opex_horizon, 30.0);
        assert_eq!(state.opex_energy_base, 12.0);
        assert_eq!(state.opex_maint_pct, 1.0);
        assert_eq!(state.discount_rate, 3.0);
        assert!(state.lots.is_empty());
        assert!(state.honos.is_empty());
    }

    #[test]
    fn test_first_key_depends_on_order() {
        let mut reordered = Referential::default();
        reordered.chauffage = [("Géothermie".to_string(), 200.0), ("PAC air/eau".to_string(), 120.0)]
            .into_iter()
            .collect();
        let state = ProjectState::default_for(&reordered);
        assert_eq!(state.chauffage, "Géothermie");
        assert_eq!(state.opex_energy_base, 7.0);
    }

    #[test]
    fn test_energy_seed_fallback() {
        let mut referential = Referential::default();
        referential.opex.energy_eur_per_m2.clear();
        let state = ProjectState::default_for(&referential);
        assert_eq!(state.opex_energy_base, DEFAULT_ENERGY_BASE);
    }

    #[test]
    fn test_non_object_candidate_yields_base() {
        let referential = Referential::default();
        let base = ProjectState::default_for(&referential);
        assert_eq!(normalize_state(&json!(null), &referential), base);
        assert_eq!(normalize_state(&json!([1, 2]), &referential), base);
        assert_eq!(normalize_state(&json!("state"), &referential), base);
    }

    #[test]
    fn test_non_finite_falls_back_to_base_not_zero() {
        let referential = Referential::default();
        let state = normalize_state(
            &json!({
                "surface": "Infinity",
                "indiceGeo": "x",
                "ajoutPerso": {"a": 1},
                "opexHorizon": null,
                "opexEnergyBase": "NaN",
                "opexMaintPct": [],
                "inflationEnergy": "-inf",
                "inflationMaint": "deux",
                "discountRate": "?"
            }),
            &referential,
        );
        let base = ProjectState::default_for(&referential);
        assert_eq!(numeric_fields(&state), numeric_fields(&base));
        assert!(numeric_fields(&state).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let referential = Referential::default();
        let state = normalize_state(&json!({ "surface": "850.5", "indiceGeo": 1.15 }), &referential);
        assert_eq!(state.surface, 850.5);
        assert_eq!(state.indice_geo, 1.15);
    }

    #[test]
    fn test_candidate_overlays_shallowly() {
        let referential = Referential::default();
        let state = normalize_state(
            &json!({
                "typologie": "Scolaire",
                "chauffage": "PAC air/eau",
                "reglementation": true,
                "lots": [{"name": "Gros œuvre", "ratio": "60"}, {"ratio": 40}, "junk"],
                "honos": {"MOE Architecte": 0.12, "AMO": "n/a"}
            }),
            &referential,
        );
        assert_eq!(state.typologie, "Scolaire");
        assert_eq!(state.chauffage, "PAC air/eau");
        assert_eq!(state.reglementation, "RT2012");
        // energy seed is derived from the first heating key, not the selection
        assert_eq!(state.opex_energy_base, 12.0);
        assert_eq!(
            state.lots,
            vec![TradeLineItem::new("Gros œuvre", 60.0), TradeLineItem::new("", 40.0)]
        );
        assert_eq!(state.honos.get("MOE Architecte"), Some(&0.12));
        assert_eq!(state.honos.get("AMO"), Some(&0.0));
    }

    #[test]
    fn test_numeric_selection_kept_as_label() {
        let mut referential = Referential::default();
        referential.reglementation.insert("2020".to_string(), 0.25);
        let state = normalize_state(&json!({ "reglementation": 2020, "typeConstructif": 1.5 }), &referential);
        assert_eq!(state.reglementation, "2020");
        assert_eq!(state.type_constructif, "1.5");
        assert_eq!(state.selection(RateBranch::Reglementation), Some("2020"));
        assert_eq!(referential.rate(RateBranch::Reglementation, "2020"), 0.25);
    }

    #[test]
    fn test_wrong_kind_lines_are_emptied() {
        let referential = Referential::default();
        let state = normalize_state(&json!({ "lots": {"a": 1}, "honos": [0.1] }), &referential);
        assert!(state.lots.is_empty());
        assert!(state.honos.is_empty());
    }

    #[test]
    fn test_unknown_keys_kept() {
        let referential = Referential::default();
        let state = normalize_state(&json!({ "label": "Groupe scolaire" }), &referential);
        assert_eq!(state.extensions.get("label"), Some(&json!("Groupe scolaire")));
        assert_eq!(state.to_value()["label"], json!("Groupe scolaire"));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let referential = Referential::default();
        let mut state = normalize_state(&json!({ "surface": 420, "typologie": "Tertiaire" }), &referential);
        state.initialize_lines(&referential);
        let again = normalize_state(&state.to_value(), &referential);
        assert_eq!(state, again);
    }

    #[test]
    fn test_lots_lazy_initialization() {
        let referential = Referential::default();
        let mut state = normalize_state(&json!({ "typologie": "Tertiaire" }), &referential);
        assert!(state.ensure_lots_initialized(&referential));
        assert_eq!(state.lots.len(), 10);
        assert_eq!(state.lots[6], TradeLineItem::new("Électricité", 12.0));

        // never overwritten once populated
        state.lots[0].ratio = 99.0;
        assert!(!state.ensure_lots_initialized(&referential));
        assert_eq!(state.lots[0].ratio, 99.0);
    }

    #[test]
    fn test_lots_fall_back_to_housing_preset() {
        let referential = Referential::default();
        let mut state = normalize_state(&json!({ "typologie": "Scolaire" }), &referential);
        state.ensure_lots_initialized(&referential);
        assert_eq!(state.lots[1], TradeLineItem::new("Gros œuvre / Structure", 25.0));
    }

    #[test]
    fn test_honos_initialization_adds_missing_roles_only() {
        let referential = Referential::default();
        let mut state = normalize_state(&json!({ "honos": {"MOE Architecte": 0.08} }), &referential);
        state.ensure_honos_initialized(&referential);
        assert_eq!(state.honos.len(), referential.honoraires.len());
        assert_eq!(state.honos.get("MOE Architecte"), Some(&0.08));
        assert_eq!(state.honos.get("AMO"), Some(&0.02));

        let mut empty = ProjectState::default_for(&referential);
        empty.ensure_honos_initialized(&referential);
        assert_eq!(empty.honos, referential.honoraires);
    }

    #[test]
    fn test_apply_preset() {
        let referential = Referential::default();
        let mut state = ProjectState::default_for(&referential);
        state.add_lot(NEW_LOT_NAME, 5.0);
        state.apply_lots_preset(&referential).unwrap();
        assert_eq!(state.lots.len(), 10);

        state.typologie = "Industriel".to_string();
        let err = state.apply_lots_preset(&referential).unwrap_err();
        assert_eq!(err.error_code(), "PRESET_NOT_FOUND");
        assert_eq!(state.lots.len(), 10);
    }

    #[test]
    fn test_add_and_remove_lot() {
        let referential = Referential::default();
        let mut state = ProjectState::default_for(&referential);
        let index = state.add_lot(NEW_LOT_NAME, f64::NAN);
        assert_eq!(state.lots[index], TradeLineItem::new("Nouveau lot", 0.0));
        assert!(state.remove_lot(3).is_err());
        assert_eq!(state.remove_lot(index).unwrap().name, "Nouveau lot");
        assert!(state.lots.is_empty());
    }

    #[test]
    fn test_update_lot() {
        let referential = Referential::default();
        let mut state = ProjectState::default_for(&referential);
        state.initialize_lines(&referential);

        let lot = state.update_lot(1, Some("Structure bois".to_string()), None).unwrap();
        assert_eq!(lot, &TradeLineItem::new("Structure bois", 25.0));

        state.update_lot(1, None, Some(f64::INFINITY)).unwrap();
        assert_eq!(state.lots[1].ratio, 0.0);
        assert_eq!(state.lots[1].name, "Structure bois");

        let err = state.update_lot(10, None, Some(5.0)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_set_hono() {
        let referential = Referential::default();
        let mut state = ProjectState::default_for(&referential);
        state.initialize_lines(&referential);

        state.set_hono("AMO", 0.025);
        state.set_hono("OPC", 0.012);
        state.set_hono("BE Fluides", f64::NAN);
        assert_eq!(state.honos.get("AMO"), Some(&0.025));
        assert_eq!(state.honos.keys().last().map(String::as_str), Some("OPC"));
        assert_eq!(state.honos.get("BE Fluides"), Some(&0.0));
    }

    #[test]
    fn test_suggested_energy_base() {
        let referential = Referential::default();
        let mut state = ProjectState::default_for(&referential);
        state.chauffage = "PAC air/eau".to_string();
        state.ventilation = "VMC double flux".to_string();
        assert_eq!(state.suggested_energy_base(&referential), 7.0);

        state.chauffage = "Poêle".to_string();
        state.ventilation = "Aucune".to_string();
        assert_eq!(state.suggested_energy_base(&referential), DEFAULT_ENERGY_BASE);
        // suggestion does not touch the stored value
        assert_eq!(state.opex_energy_base, 12.0);
    }

    #[test]
    fn test_selection_lookup() {
        let referential = Referential::default();
        let state = ProjectState::default_for(&referential);
        assert_eq!(state.selection(RateBranch::ContrainteTerrain), Some("Plat"));
        assert_eq!(state.selection(RateBranch::Honoraires), None);
    }
}
