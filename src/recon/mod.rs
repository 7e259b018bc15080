//! Reconciliation module containing import, manual lifecycle and reporting

pub mod core;
pub mod import;
pub mod lifecycle;
pub mod report;

pub use core::*;
pub use import::*;
pub use lifecycle::*;
pub use report::*;
