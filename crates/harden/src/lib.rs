//! IR-to-IR transformation engine for fault-injection hardening.
//!
//! This crate hardens a typed IR module against fault-injection attacks
//! and errors by duplicating critical computations, inserting calls to the
//! companion runtime verification library, and restructuring control flow
//! with dedicated error paths.
//!
//! # Pipeline
//!
//! 1. [`classify::classify`] partitions each function's instructions into
//!    candidate sets per strategy, without mutating anything.
//! 2. [`pass::harden_module`] applies the strategy appliers in a fixed
//!    order over the pre-collected candidates, driven by
//!    [`options::HardenOptions`] (a 0–3 level plus per-strategy toggles).
//! 3. [`stats::TransformStats`] accumulates one counter per transformation
//!    and prints a structured report.
//!
//! A separate read-only pass, [`analyze::analyze_module`], reports
//! unprotected instructions without modifying the IR.
//!
//! The hardened code calls the runtime through a fixed C ABI; the call
//! surface lives in [`runtime_abi`].

pub mod analyze;
pub mod classify;
pub mod error;
pub mod mutate;
pub mod options;
pub mod pass;
pub mod runtime_abi;
pub mod stats;
pub mod strategy;

pub use analyze::{analyze_module, AnalysisReport};
pub use classify::{classify, Candidates};
pub use error::HardenError;
pub use options::{HardenLevel, HardenOptions};
pub use pass::{harden_function, harden_module};
pub use stats::TransformStats;
