//! # Trade Line Items
//!
//! Splits the works cost across the project's lots. Each amount is
//! `works_cost × ratio / 100`; the ratio total is reported alongside as an
//! advisory signal and never blocks the computation.

use serde::{Deserialize, Serialize};

use crate::state::ProjectState;

/// Tolerance around 100 % for the ratio total to read as valid
pub const RATIO_TOLERANCE: f64 = 0.01;

/// True when a ratio total is within [`RATIO_TOLERANCE`] of 100 %.
pub fn ratios_sum_to_hundred(total_ratio: f64) -> bool {
    (total_ratio - 100.0).abs() < RATIO_TOLERANCE
}

/// One lot with its computed amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotAmount {
    pub name: String,

    /// Share in percent, as entered
    pub ratio: f64,

    /// Amount in €
    pub amount: f64,
}

/// Lot amounts with their totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotsBreakdown {
    pub items: Vec<LotAmount>,

    /// Sum of ratios (%)
    pub total_ratio: f64,

    /// Sum of amounts (€)
    pub sum_amount: f64,
}

impl LotsBreakdown {
    /// Advisory validity signal: do the ratios sum to 100 %?
    pub fn ratios_valid(&self) -> bool {
        ratios_sum_to_hundred(self.total_ratio)
    }
}

/// Compute lot amounts against a works cost.
pub fn lots_breakdown(state: &ProjectState, works_cost: f64) -> LotsBreakdown {
    let items: Vec<LotAmount> = state
        .lots
        .iter()
        .map(|lot| LotAmount {
            name: lot.name.clone(),
            ratio: lot.ratio,
            amount: works_cost * lot.ratio / 100.0,
        })
        .collect();
    let total_ratio = items.iter().map(|item| item.ratio).sum();
    let sum_amount = items.iter().map(|item| item.amount).sum();

    LotsBreakdown {
        items,
        total_ratio,
        sum_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referential::Referential;
    use crate::state::TradeLineItem;

    fn state_with_lots(lots: Vec<TradeLineItem>) -> ProjectState {
        let mut state = ProjectState::default_for(&Referential::default());
        state.lots = lots;
        state
    }

    #[test]
    fn test_sixty_forty_split() {
        let state = state_with_lots(vec![
            TradeLineItem::new("Gros œuvre", 60.0),
            TradeLineItem::new("Second œuvre", 40.0),
        ]);
        let breakdown = lots_breakdown(&state, 2_330_000.0);

        assert!((breakdown.items[0].amount - 1_398_000.0).abs() < 1e-6);
        assert!((breakdown.items[1].amount - 932_000.0).abs() < 1e-6);
        assert_eq!(breakdown.total_ratio, 100.0);
        assert!((breakdown.sum_amount - 2_330_000.0).abs() < 1e-6);
        assert!(breakdown.ratios_valid());
    }

    #[test]
    fn test_invalid_total_still_produces_amounts() {
        let state = state_with_lots(vec![
            TradeLineItem::new("A", 70.0),
            TradeLineItem::new("B", 45.5),
        ]);
        let breakdown = lots_breakdown(&state, 1000.0);
        assert!(!breakdown.ratios_valid());
        assert_eq!(breakdown.items[0].amount, 700.0);
        assert_eq!(breakdown.items[1].amount, 455.0);
        assert_eq!(breakdown.sum_amount, 1155.0);
    }

    #[test]
    fn test_tolerance_boundary() {
        assert!(ratios_sum_to_hundred(100.009));
        assert!(ratios_sum_to_hundred(99.995));
        assert!(!ratios_sum_to_hundred(100.02));
        assert!(!ratios_sum_to_hundred(0.0));
    }

    #[test]
    fn test_empty_lots() {
        let state = state_with_lots(Vec::new());
        let breakdown = lots_breakdown(&state, 1000.0);
        assert!(breakdown.items.is_empty());
        assert_eq!(breakdown.total_ratio, 0.0);
        assert_eq!(breakdown.sum_amount, 0.0);
    }

    #[test]
    fn test_default_presets_sum_to_hundred() {
        let referential = Referential::default();
        for typologie in referential.lots_presets.keys() {
            let total = referential.preset_ratio_total(typologie).unwrap();
            assert!(ratios_sum_to_hundred(total), "{} sums to {}", typologie, total);
        }
    }
}
