//! Matching module containing discrepancy classification, rule evaluation, and the matching engine

pub mod classify;
pub mod engine;
pub mod rules;

pub use classify::*;
pub use engine::*;
pub use rules::*;
