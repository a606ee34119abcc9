//! # Professional Fees
//!
//! Each fee line is a fraction of the works cost; the total is their sum.
//! Fractions are user-owned and never checked against a target.

use serde::{Deserialize, Serialize};

use crate::state::ProjectState;

/// One fee role with its amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAmount {
    pub role: String,

    /// Fraction of works cost
    pub fraction: f64,

    /// Amount in €
    pub amount: f64,
}

/// Fee amounts in line order, with their total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub lines: Vec<FeeAmount>,
    pub total: f64,
}

/// Compute every fee line against a works cost.
pub fn fee_breakdown(state: &ProjectState, works_cost: f64) -> FeeBreakdown {
    let lines: Vec<FeeAmount> = state
        .honos
        .iter()
        .map(|(role, fraction)| FeeAmount {
            role: role.clone(),
            fraction: *fraction,
            amount: fraction * works_cost,
        })
        .collect();
    let total = lines.iter().map(|line| line.amount).sum();
    FeeBreakdown { lines, total }
}

/// Σ fraction × works cost.
pub fn fee_total(state: &ProjectState, works_cost: f64) -> f64 {
    state.honos.values().map(|fraction| fraction * works_cost).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referential::Referential;

    #[test]
    fn test_single_fee_line() {
        let mut state = ProjectState::default_for(&Referential::default());
        state.honos.insert("MOE Architecte".to_string(), 0.10);
        assert!((fee_total(&state, 2_330_000.0) - 233_000.0).abs() < 1e-6);

        let breakdown = fee_breakdown(&state, 2_330_000.0);
        assert_eq!(breakdown.lines.len(), 1);
        assert_eq!(breakdown.lines[0].role, "MOE Architecte");
        assert!((breakdown.total - 233_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_roles_total() {
        let referential = Referential::default();
        let mut state = ProjectState::default_for(&referential);
        state.ensure_honos_initialized(&referential);

        // 0.10 + 0.015 + 0.03 + 0.0075 + 0.02 + 0.01 + 0.008 + 0.03 = 0.2205
        let total = fee_total(&state, 1_000_000.0);
        assert!((total - 220_500.0).abs() < 1e-6);
        assert!((fee_breakdown(&state, 1_000_000.0).total - total).abs() < 1e-6);

        let breakdown = fee_breakdown(&state, 1.0);
        let roles: Vec<&str> = breakdown.lines.iter().map(|l| l.role.as_str()).collect();
        assert_eq!(roles.first(), Some(&"MOE Architecte"));
        assert_eq!(roles.last(), Some(&"MOA interne"));
    }

    #[test]
    fn test_no_fee_lines() {
        let state = ProjectState::default_for(&Referential::default());
        assert_eq!(fee_total(&state, 1_000_000.0), 0.0);
        assert!(fee_breakdown(&state, 1_000_000.0).lines.is_empty());
    }
}
