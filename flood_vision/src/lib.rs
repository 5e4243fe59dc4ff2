// THEORY:
// This file is the main entry point for the `flood_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (the HTTP server and the
// visual tester).
//
// The primary goal is to export the `DamageGate` and its associated data
// structures (`AnalysisConfig`, `AnalysisRequest`, `AnalysisReport`, etc.) as the
// high-level interface for the damage engine. The building blocks in
// `core_modules` stay public so tools can run single stages, such as detection
// over local files, without going through the gate.

pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use error::{DamageError, Result};
