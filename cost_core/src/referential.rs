//! # Referential
//!
//! The editable table of unit costs, surcharge rates, fee fractions and trade
//! presets that drives every computation, together with its built-in default
//! values and the normalization routine that repairs arbitrary input against
//! those defaults.
//!
//! ## Structure
//!
//! ```text
//! Referential
//! ├── typologies          building type  -> base cost (€/m²)
//! ├── reglementation      regulation     -> surcharge fraction
//! ├── typeConstructif     method         -> surcharge fraction
//! ├── contrainteSol       soil           -> surcharge fraction
//! ├── contrainteTerrain   terrain        -> surcharge fraction
//! ├── chauffage           heating        -> capital addition (€/m²)
//! ├── ventilation         ventilation    -> capital addition (€/m²)
//! ├── lotsPresets         building type  -> { trade -> ratio (%) }
//! ├── honoraires          fee role       -> fraction of works cost
//! └── opex                OpexParams
//! ```
//!
//! Normalization is two-phase: the candidate is deep-merged onto the defaults
//! (candidate leaves win, unknown keys are kept), then every branch listed in
//! [`SCHEMA`] is re-checked and replaced wholesale by its default when it is
//! not an object or ends up empty.
//!
//! ## Example
//!
//! ```rust
//! use cost_core::referential::{normalize_referential, RateBranch};
//! use serde_json::json;
//!
//! let referential = normalize_referential(&json!({
//!     "typologies": { "Logement collectif": 1950 },
//!     "reglementation": {},
//!     "chauffage": "not a table"
//! }));
//!
//! assert_eq!(referential.rate(RateBranch::Typologies, "Logement collectif"), 1950.0);
//! assert_eq!(referential.rate(RateBranch::Reglementation, "RE2020"), 0.20);
//! assert_eq!(referential.rate(RateBranch::Chauffage, "PAC air/eau"), 120.0);
//! ```

use indexmap::IndexMap;
use log::debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CostError, CostResult};
use crate::numeric::{deep_merge, to_number};

/// Ordered mapping from a category label to a numeric rate.
///
/// Order is definition order; the first key of a branch is the default
/// selection for a new project.
pub type RateTable = IndexMap<String, f64>;

/// Typology used when the selected one has no preset of its own.
pub const FALLBACK_PRESET_TYPOLOGY: &str = "Logement collectif";

/// The flat rate-table branches of the referential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateBranch {
    Typologies,
    Reglementation,
    TypeConstructif,
    ContrainteSol,
    ContrainteTerrain,
    Chauffage,
    Ventilation,
    Honoraires,
}

impl RateBranch {
    pub const ALL: [RateBranch; 8] = [
        RateBranch::Typologies,
        RateBranch::Reglementation,
        RateBranch::TypeConstructif,
        RateBranch::ContrainteSol,
        RateBranch::ContrainteTerrain,
        RateBranch::Chauffage,
        RateBranch::Ventilation,
        RateBranch::Honoraires,
    ];

    /// Branch for a JSON key, if it names one
    pub fn from_key(key: &str) -> Option<Self> {
        RateBranch::ALL.into_iter().find(|branch| branch.key() == key)
    }

    /// JSON key of the branch
    pub fn key(self) -> &'static str {
        match self {
            RateBranch::Typologies => "typologies",
            RateBranch::Reglementation => "reglementation",
            RateBranch::TypeConstructif => "typeConstructif",
            RateBranch::ContrainteSol => "contrainteSol",
            RateBranch::ContrainteTerrain => "contrainteTerrain",
            RateBranch::Chauffage => "chauffage",
            RateBranch::Ventilation => "ventilation",
            RateBranch::Honoraires => "honoraires",
        }
    }
}

/// Shape expected for a top-level referential branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// Map of label -> number
    RateMap(RateBranch),
    /// Map of typology -> map of trade -> ratio
    PresetMap,
    /// The nested operating-cost bundle
    Opex,
}

impl BranchKind {
    /// JSON key of the branch
    pub fn key(self) -> &'static str {
        match self {
            BranchKind::RateMap(branch) => branch.key(),
            BranchKind::PresetMap => "lotsPresets",
            BranchKind::Opex => "opex",
        }
    }
}

/// Every required top-level branch, in serialization order.
pub const SCHEMA: [BranchKind; 10] = [
    BranchKind::RateMap(RateBranch::Typologies),
    BranchKind::RateMap(RateBranch::Reglementation),
    BranchKind::RateMap(RateBranch::TypeConstructif),
    BranchKind::RateMap(RateBranch::ContrainteSol),
    BranchKind::RateMap(RateBranch::ContrainteTerrain),
    BranchKind::RateMap(RateBranch::Chauffage),
    BranchKind::RateMap(RateBranch::Ventilation),
    BranchKind::PresetMap,
    BranchKind::RateMap(RateBranch::Honoraires),
    BranchKind::Opex,
];

const OPEX_KEYS: [&str; 7] = [
    "energyEurPerM2",
    "ventilationEnergyAdj",
    "maintenancePctOfWorks",
    "inflationEnergy",
    "inflationMaint",
    "discountRate",
    "horizonYears",
];

/// Operating-cost parameters.
///
/// Rates are fractions (0.02 = 2 %), energy costs are €/m²/year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpexParams {
    /// Heating system -> yearly energy cost per m²
    pub energy_eur_per_m2: RateTable,

    /// Ventilation system -> yearly energy adjustment per m² (may be negative)
    pub ventilation_energy_adj: RateTable,

    /// Yearly maintenance as a fraction of works cost
    pub maintenance_pct_of_works: f64,

    pub inflation_energy: f64,
    pub inflation_maint: f64,
    pub discount_rate: f64,

    /// Projection horizon, at least one year
    pub horizon_years: u32,

    /// Keys supplied by newer data that this version does not interpret
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

/// The full rate referential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referential {
    pub typologies: RateTable,
    pub reglementation: RateTable,
    pub type_constructif: RateTable,
    pub contrainte_sol: RateTable,
    pub contrainte_terrain: RateTable,
    pub chauffage: RateTable,
    pub ventilation: RateTable,
    pub lots_presets: IndexMap<String, RateTable>,
    pub honoraires: RateTable,
    pub opex: OpexParams,

    /// Top-level keys supplied by newer data that this version does not interpret
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

/// Built-in defaults, built once.
pub static DEFAULT_REFERENTIAL: Lazy<Referential> = Lazy::new(builtin_referential);

fn table(entries: &[(&str, f64)]) -> RateTable {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn builtin_referential() -> Referential {
    let mut lots_presets = IndexMap::new();
    lots_presets.insert(
        "Logement collectif".to_string(),
        table(&[
            ("Terrassements & fondations", 10.0),
            ("Gros œuvre / Structure", 25.0),
            ("Couverture-Étanchéité", 7.0),
            ("Cloisons & doublages", 10.0),
            ("Menuiseries extérieures", 10.0),
            ("Plomberie", 6.0),
            ("Électricité", 7.0),
            ("CVC (chauffage-ventilation)", 12.0),
            ("Sols & revêtements", 6.0),
            ("Finitions", 7.0),
        ]),
    );
    lots_presets.insert(
        "Tertiaire".to_string(),
        table(&[
            ("Terrassements & fondations", 9.0),
            ("Gros œuvre / Structure", 20.0),
            ("Couverture-Étanchéité", 6.0),
            ("Cloisons & doublages", 8.0),
            ("Menuiseries extérieures", 8.0),
            ("Plomberie", 6.0),
            ("Électricité", 12.0),
            ("CVC (chauffage-ventilation)", 18.0),
            ("Équipements techniques", 8.0),
            ("Finitions", 5.0),
        ]),
    );

    Referential {
        typologies: table(&[
            ("Logement collectif", 1800.0),
            ("Tertiaire", 1600.0),
            ("Scolaire", 1500.0),
            ("Maison individuelle", 1400.0),
            ("Industriel", 1100.0),
        ]),
        reglementation: table(&[("RT2012", 0.10), ("RE2020", 0.20)]),
        type_constructif: table(&[
            ("Trad béton", 0.00),
            ("Préfa béton", 0.05),
            ("Structure métal", 0.10),
            ("Construction bois", 0.15),
            ("Passif", 0.30),
        ]),
        contrainte_sol: table(&[
            ("Standard", 0.00),
            ("Sol médiocre (fondations profondes)", 0.10),
            ("Présence d'eau / drainage", 0.15),
        ]),
        contrainte_terrain: table(&[
            ("Plat", 0.00),
            ("Pente modérée", 0.05),
            ("Pente forte", 0.10),
        ]),
        chauffage: table(&[
            ("Électrique radiateurs", 50.0),
            ("Chaudière gaz", 100.0),
            ("Plancher chauffant hydraulique", 80.0),
            ("PAC air/eau", 120.0),
            ("Géothermie", 200.0),
            ("Chaudière granulés", 150.0),
        ]),
        ventilation: table(&[
            ("VMC simple flux", 20.0),
            ("VMC double flux", 50.0),
            ("Double flux thermodynamique", 80.0),
            ("CTA simple (tertiaire)", 100.0),
            ("CTA avec récupération", 150.0),
        ]),
        lots_presets,
        honoraires: table(&[
            ("MOE Architecte", 0.10),
            ("BE Structure", 0.015),
            ("BE Fluides", 0.03),
            ("BE Environnement", 0.0075),
            ("AMO", 0.02),
            ("Bureau de contrôle", 0.01),
            ("Coordonnateur SPS", 0.008),
            ("MOA interne", 0.03),
        ]),
        opex: OpexParams {
            energy_eur_per_m2: table(&[
                ("Électrique radiateurs", 12.0),
                ("Chaudière gaz", 10.0),
                ("Plancher chauffant hydraulique", 11.0),
                ("PAC air/eau", 8.0),
                ("Géothermie", 7.0),
                ("Chaudière granulés", 9.0),
            ]),
            ventilation_energy_adj: table(&[
                ("VMC simple flux", 0.0),
                ("VMC double flux", -1.0),
                ("Double flux thermodynamique", -1.5),
                ("CTA simple (tertiaire)", 2.0),
                ("CTA avec récupération", 1.0),
            ]),
            maintenance_pct_of_works: 0.01,
            inflation_energy: 0.02,
            inflation_maint: 0.02,
            discount_rate: 0.03,
            horizon_years: 30,
            extensions: Map::new(),
        },
        extensions: Map::new(),
    }
}

impl Default for Referential {
    fn default() -> Self {
        DEFAULT_REFERENTIAL.clone()
    }
}

impl Referential {
    /// Parse and normalize a referential from JSON text.
    ///
    /// Only unparsable text is an error; any parsable value is repaired.
    pub fn from_json_str(text: &str) -> CostResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| CostError::invalid_data(e.to_string()))?;
        Ok(normalize_referential(&value))
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Borrow one of the flat rate tables.
    pub fn rates(&self, branch: RateBranch) -> &RateTable {
        match branch {
            RateBranch::Typologies => &self.typologies,
            RateBranch::Reglementation => &self.reglementation,
            RateBranch::TypeConstructif => &self.type_constructif,
            RateBranch::ContrainteSol => &self.contrainte_sol,
            RateBranch::ContrainteTerrain => &self.contrainte_terrain,
            RateBranch::Chauffage => &self.chauffage,
            RateBranch::Ventilation => &self.ventilation,
            RateBranch::Honoraires => &self.honoraires,
        }
    }

    /// Mutably borrow one of the flat rate tables.
    pub fn rates_mut(&mut self, branch: RateBranch) -> &mut RateTable {
        match branch {
            RateBranch::Typologies => &mut self.typologies,
            RateBranch::Reglementation => &mut self.reglementation,
            RateBranch::TypeConstructif => &mut self.type_constructif,
            RateBranch::ContrainteSol => &mut self.contrainte_sol,
            RateBranch::ContrainteTerrain => &mut self.contrainte_terrain,
            RateBranch::Chauffage => &mut self.chauffage,
            RateBranch::Ventilation => &mut self.ventilation,
            RateBranch::Honoraires => &mut self.honoraires,
        }
    }

    /// Rate for `key` in `branch`, 0 when the key is absent.
    pub fn rate(&self, branch: RateBranch, key: &str) -> f64 {
        self.rates(branch).get(key).copied().unwrap_or(0.0)
    }

    /// First label of a branch (the default selection).
    pub fn first_key(&self, branch: RateBranch) -> Option<&str> {
        self.rates(branch).keys().next().map(String::as_str)
    }

    /// Trade preset for a typology, if one is defined.
    pub fn preset_for(&self, typologie: &str) -> Option<&RateTable> {
        self.lots_presets.get(typologie)
    }

    /// Set a rate, appending the label when it is new.
    pub fn set_rate(&mut self, branch: RateBranch, key: impl Into<String>, value: f64) -> CostResult<()> {
        let key = key.into();
        if !value.is_finite() {
            return Err(CostError::invalid_input(branch.key(), value.to_string(), "Rate must be a finite number"));
        }
        self.rates_mut(branch).insert(key, value);
        Ok(())
    }

    /// Set one lot ratio of a typology's preset, creating the preset if needed.
    pub fn set_preset_ratio(&mut self, typologie: impl Into<String>, lot: impl Into<String>, ratio: f64) -> CostResult<()> {
        if !ratio.is_finite() {
            return Err(CostError::invalid_input("lotsPresets", ratio.to_string(), "Ratio must be a finite number"));
        }
        self.lots_presets
            .entry(typologie.into())
            .or_default()
            .insert(lot.into(), ratio);
        Ok(())
    }

    /// Sum of a preset's ratios, for the "sums to 100 %" signal.
    pub fn preset_ratio_total(&self, typologie: &str) -> Option<f64> {
        self.preset_for(typologie).map(|preset| preset.values().sum())
    }
}

/// Repair an arbitrary value into a complete referential.
///
/// Non-object candidates yield the defaults unchanged. Objects are merged
/// onto the defaults, then each branch of [`SCHEMA`] is re-checked:
///
/// - rate maps keep numeric leaves (numbers or numeric strings) and are
///   replaced by their default when not an object or left empty
/// - presets keep object entries, with the same leaf rule
/// - opex scalars must be JSON numbers; `horizonYears` must also be ≥ 1
pub fn normalize_referential(candidate: &Value) -> Referential {
    let defaults = &*DEFAULT_REFERENTIAL;
    if !candidate.is_object() {
        if !candidate.is_null() {
            debug!("referential candidate is not an object, using defaults");
        }
        return defaults.clone();
    }

    let mut merged = defaults.to_value();
    deep_merge(&mut merged, candidate);
    let Value::Object(merged) = merged else {
        return defaults.clone();
    };

    let mut out = defaults.clone();
    for kind in SCHEMA {
        let key = kind.key();
        let value = merged.get(key);
        match kind {
            BranchKind::RateMap(branch) => {
                *out.rates_mut(branch) = repair_rate_table(key, value, defaults.rates(branch));
            }
            BranchKind::PresetMap => {
                out.lots_presets = repair_presets(value, &defaults.lots_presets);
            }
            BranchKind::Opex => {
                out.opex = repair_opex(value, &defaults.opex);
            }
        }
    }

    out.extensions = merged
        .iter()
        .filter(|(key, _)| !SCHEMA.iter().any(|kind| kind.key() == key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    out
}

/// Rate leaves accept numbers and numeric strings.
fn rate_leaf(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(_) => None,
        other => to_number(other).filter(|v| v.is_finite()),
    }
}

fn rate_table_from_map(branch: &str, map: &Map<String, Value>) -> RateTable {
    let mut table = RateTable::new();
    for (label, value) in map {
        match rate_leaf(value) {
            Some(rate) => {
                table.insert(label.clone(), rate);
            }
            None => debug!("dropping non-numeric rate {}.{}", branch, label),
        }
    }
    table
}

fn repair_rate_table(branch: &str, value: Option<&Value>, default: &RateTable) -> RateTable {
    let Some(map) = value.and_then(Value::as_object) else {
        debug!("referential branch '{}' is not an object, restoring defaults", branch);
        return default.clone();
    };
    let table = rate_table_from_map(branch, map);
    if table.is_empty() {
        debug!("referential branch '{}' is empty, restoring defaults", branch);
        return default.clone();
    }
    table
}

fn repair_presets(value: Option<&Value>, default: &IndexMap<String, RateTable>) -> IndexMap<String, RateTable> {
    let Some(map) = value.and_then(Value::as_object) else {
        debug!("referential branch 'lotsPresets' is not an object, restoring defaults");
        return default.clone();
    };
    let mut presets = IndexMap::new();
    for (typologie, preset) in map {
        match preset.as_object() {
            Some(lots) => {
                presets.insert(typologie.clone(), rate_table_from_map("lotsPresets", lots));
            }
            None => debug!("dropping malformed lot preset '{}'", typologie),
        }
    }
    if presets.is_empty() {
        debug!("referential branch 'lotsPresets' is empty, restoring defaults");
        return default.clone();
    }
    presets
}

fn opex_scalar(map: &Map<String, Value>, key: &str, default: f64) -> f64 {
    match map.get(key).and_then(Value::as_f64).filter(|v| v.is_finite()) {
        Some(v) => v,
        None => {
            debug!("opex.{} is not a number, restoring default {}", key, default);
            default
        }
    }
}

fn opex_horizon(map: &Map<String, Value>, default: u32) -> u32 {
    match map.get("horizonYears").and_then(Value::as_f64) {
        Some(years) if years.is_finite() && years >= 1.0 => years.round().min(u32::MAX as f64) as u32,
        _ => {
            debug!("opex.horizonYears is not a positive number, restoring default {}", default);
            default
        }
    }
}

fn repair_opex(value: Option<&Value>, default: &OpexParams) -> OpexParams {
    let Some(map) = value.and_then(Value::as_object) else {
        debug!("referential branch 'opex' is not an object, restoring defaults");
        return default.clone();
    };

    OpexParams {
        energy_eur_per_m2: repair_rate_table(
            "opex.energyEurPerM2",
            map.get("energyEurPerM2"),
            &default.energy_eur_per_m2,
        ),
        ventilation_energy_adj: repair_rate_table(
            "opex.ventilationEnergyAdj",
            map.get("ventilationEnergyAdj"),
            &default.ventilation_energy_adj,
        ),
        maintenance_pct_of_works: opex_scalar(map, "maintenancePctOfWorks", default.maintenance_pct_of_works),
        inflation_energy: opex_scalar(map, "inflationEnergy", default.inflation_energy),
        inflation_maint: opex_scalar(map, "inflationMaint", default.inflation_maint),
        discount_rate: opex_scalar(map, "discountRate", default.discount_rate),
        horizon_years: opex_horizon(map, default.horizon_years),
        extensions: map
            .iter()
            .filter(|(key, _)| !OPEX_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}
