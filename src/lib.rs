//! # Reconciliation Core
//!
//! A payment reconciliation library that matches imported bank transactions
//! against expected rent payments, classifies discrepancies, and reports on
//! reconciliation health.
//!
//! ## Features
//!
//! - **Bank feed import**: Idempotent batch import with duplicate detection
//! - **Automatic matching**: Exact, rule-based and fuzzy strategies with confidence scoring
//! - **Discrepancy classification**: Partial payments, amount and date mismatches, unexpected deposits
//! - **Manual lifecycle**: Operator match and unmatch, terminal write-off, audit stamping
//! - **Reconciliation reporting**: Status summaries, missing payments, and variance reports
//! - **Storage abstraction**: Database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{Reconciler, RawTransaction, TransactionStatus};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! // This example shows basic usage - you need to implement the ReconStore trait
//! // let store = YourStoreImplementation::new();
//! // let mut reconciler = Reconciler::new(store);
//! ```

pub mod matching;
pub mod recon;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use matching::*;
pub use recon::*;
pub use traits::*;
pub use types::*;
