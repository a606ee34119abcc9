//! # cost_core - Construction Cost Estimation Engine
//!
//! `cost_core` estimates the capital and lifecycle cost of a building project
//! from a referential of unit rates and a per-project state. All inputs and
//! outputs are JSON-serializable, so the referential, the state and the
//! results can be stored, exported and re-imported as plain documents.
//!
//! ## Design Philosophy
//!
//! - **Stateless engine**: Pure functions of `(Referential, ProjectState)`
//! - **Self-healing data**: Anything loaded or imported is normalized first
//! - **JSON-First**: All types implement Serialize/Deserialize
//! - **Rich Errors**: Structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use cost_core::{estimate, ProjectState, Referential};
//!
//! let referential = Referential::default();
//! let mut state = ProjectState::default_for(&referential);
//! state.initialize_lines(&referential);
//!
//! let result = estimate(&referential, &state);
//! println!("{:.0} € ({:.0} €/m²)", result.global, result.global_per_m2);
//! ```
//!
//! ## Modules
//!
//! - [`referential`] - Rate tables, presets, opex parameters and their repair
//! - [`state`] - Project inputs, lots and fee lines
//! - [`calculations`] - Unit cost, works cost, lots, fees, opex, totals
//! - [`export`] - JSON and CSV export, JSON import
//! - [`errors`] - Structured error types
//! - [`file_io`] - Persistent store with atomic saves and locking
//! - [`numeric`] - Lenient number coercion shared by the normalizers

pub mod calculations;
pub mod errors;
pub mod export;
#[cfg(not(target_arch = "wasm32"))]
pub mod file_io;
pub mod numeric;
pub mod referential;
pub mod state;

// Re-export commonly used types at crate root for convenience
pub use calculations::{estimate, Estimate};
pub use errors::{CostError, CostResult};
pub use export::{build_csv, build_export_payload, import_payload, ExportPayload, ImportSummary};
#[cfg(not(target_arch = "wasm32"))]
pub use file_io::{Store, StoreConfig, StoreLock};
pub use referential::{normalize_referential, RateBranch, Referential, DEFAULT_REFERENTIAL};
pub use state::{normalize_state, ProjectState, TradeLineItem};
