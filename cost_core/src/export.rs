//! # Export and Import
//!
//! Interchange payloads for an estimate:
//!
//! - JSON: `{ meta, REF, STATE, RESULTS }`, see [`ExportPayload`]
//! - Delimited text (`;`): a key/value section, a blank line, then one row
//!   per trade line item with its amount rounded to the whole euro
//!
//! Import accepts the JSON shape with `REF` and/or `STATE`; each present part
//! is normalized before it replaces the caller's aggregates.
//!
//! ## Example
//!
//! ```rust
//! use cost_core::export::{build_export_payload, import_payload};
//! use cost_core::referential::Referential;
//! use cost_core::state::ProjectState;
//!
//! let referential = Referential::default();
//! let mut state = ProjectState::default_for(&referential);
//! state.initialize_lines(&referential);
//!
//! let json = build_export_payload(&referential, &state).to_json_pretty().unwrap();
//!
//! let mut imported_ref = Referential::default();
//! let mut imported_state = ProjectState::default_for(&imported_ref);
//! import_payload(&json, &mut imported_ref, &mut imported_state).unwrap();
//! assert_eq!(imported_state, state);
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::calculations::estimate::{estimate, Estimate};
use crate::calculations::lots::LotAmount;
use crate::calculations::unit_cost::UnitCostDetails;
use crate::errors::{CostError, CostResult};
use crate::numeric::round_half_up;
use crate::referential::{normalize_referential, Referential};
use crate::state::{normalize_state, ProjectState};

/// Field separator of the delimited export
pub const CSV_SEPARATOR: &str = ";";

/// Export metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    /// ISO-8601 UTC timestamp
    pub generated_at: String,
}

/// Top-line results as exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResults {
    pub base_ajustee: f64,
    pub details: UnitCostDetails,
    pub works_cost: f64,
    pub honos_total: f64,
    #[serde(rename = "opexPV")]
    pub opex_pv: f64,
    pub global: f64,
    pub global_per_m2: f64,
    pub lots_breakdown: Vec<LotAmount>,
}

impl From<&Estimate> for ExportResults {
    fn from(estimate: &Estimate) -> Self {
        ExportResults {
            base_ajustee: estimate.unit_cost.base_ajustee,
            details: estimate.unit_cost.details,
            works_cost: estimate.works_cost,
            honos_total: estimate.fees.total,
            opex_pv: estimate.opex.present_value,
            global: estimate.global,
            global_per_m2: estimate.global_per_m2,
            lots_breakdown: estimate.lots.items.clone(),
        }
    }
}

/// Full JSON export payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPayload {
    pub meta: ExportMeta,

    #[serde(rename = "REF")]
    pub referential: Referential,

    #[serde(rename = "STATE")]
    pub state: ProjectState,

    #[serde(rename = "RESULTS")]
    pub results: ExportResults,
}

impl ExportPayload {
    /// Pretty-printed JSON text.
    pub fn to_json_pretty(&self) -> CostResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the JSON payload stamped with the current time.
pub fn build_export_payload(referential: &Referential, state: &ProjectState) -> ExportPayload {
    build_export_payload_at(referential, state, Utc::now())
}

/// Build the JSON payload with an explicit timestamp.
pub fn build_export_payload_at(
    referential: &Referential,
    state: &ProjectState,
    generated_at: DateTime<Utc>,
) -> ExportPayload {
    let result = estimate(referential, state);
    ExportPayload {
        meta: ExportMeta {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        },
        referential: referential.clone(),
        state: state.clone(),
        results: ExportResults::from(&result),
    }
}

/// Quote a cell holding the separator, a quote or a line break.
fn escape_cell(cell: &str) -> String {
    if cell.contains(CSV_SEPARATOR) || cell.contains(['"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn push_row(lines: &mut Vec<String>, cells: &[&str]) {
    let escaped: Vec<String> = cells.iter().map(|cell| escape_cell(cell)).collect();
    lines.push(escaped.join(CSV_SEPARATOR));
}

/// Build the delimited text export.
pub fn build_csv(referential: &Referential, state: &ProjectState) -> String {
    let results = ExportResults::from(&estimate(referential, state));
    let mut lines = Vec::new();

    push_row(&mut lines, &["Clé", "Valeur"]);
    let rows: [(&str, String); 16] = [
        ("Typologie", state.typologie.clone()),
        ("Surface (m²)", state.surface.to_string()),
        ("Indice géographique", state.indice_geo.to_string()),
        ("Réglementation", state.reglementation.clone()),
        ("Type constructif", state.type_constructif.clone()),
        ("Contrainte sol", state.contrainte_sol.clone()),
        ("Contrainte terrain", state.contrainte_terrain.clone()),
        ("Chauffage", state.chauffage.clone()),
        ("Ventilation", state.ventilation.clone()),
        ("Ajout personnalisé (€/m²)", state.ajout_perso.to_string()),
        ("Base ajustée (€/m²)", results.base_ajustee.to_string()),
        ("Coût travaux (€)", results.works_cost.to_string()),
        ("Total honoraires (€)", results.honos_total.to_string()),
        ("OPEX actualisées (€)", results.opex_pv.to_string()),
        ("Coût global (€)", results.global.to_string()),
        ("Coût global (€/m²)", results.global_per_m2.to_string()),
    ];
    for (key, value) in &rows {
        push_row(&mut lines, &[*key, value.as_str()]);
    }

    lines.push(String::new());
    push_row(&mut lines, &["Lot", "Ratio (%)", "Montant (€)"]);
    for lot in &results.lots_breakdown {
        let ratio = lot.ratio.to_string();
        let amount = round_half_up(lot.amount).to_string();
        push_row(&mut lines, &[lot.name.as_str(), ratio.as_str(), amount.as_str()]);
    }

    lines.join("\n")
}

/// Payload parts that are `null`, `false`, `0`, `""` or NaN count as absent.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// What an import replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub referential_replaced: bool,
    pub state_replaced: bool,
}

/// Import a JSON payload into the caller's aggregates.
///
/// `REF` is normalized first so that `STATE` is normalized against the
/// imported referential; a state-only payload uses the current one. Lots and
/// fee lines are then lazily initialised. On error both aggregates are left
/// untouched.
pub fn import_payload(
    text: &str,
    referential: &mut Referential,
    state: &mut ProjectState,
) -> CostResult<ImportSummary> {
    let data: Value = serde_json::from_str(text).map_err(|e| CostError::invalid_data(e.to_string()))?;
    let Some(root) = data.as_object() else {
        return Err(CostError::invalid_data("expected a JSON object with REF and/or STATE"));
    };

    let new_ref = root.get("REF").filter(|v| is_truthy(v)).map(normalize_referential);
    let active_ref = new_ref.as_ref().unwrap_or(referential);
    let new_state = root
        .get("STATE")
        .filter(|v| is_truthy(v))
        .map(|v| normalize_state(v, active_ref));

    let summary = ImportSummary {
        referential_replaced: new_ref.is_some(),
        state_replaced: new_state.is_some(),
    };

    if let Some(new_ref) = new_ref {
        *referential = new_ref;
    }
    if let Some(new_state) = new_state {
        *state = new_state;
    }
    state.initialize_lines(referential);

    info!(
        "imported payload (referential: {}, state: {})",
        summary.referential_replaced, summary.state_replaced
    );
    Ok(summary)
}
