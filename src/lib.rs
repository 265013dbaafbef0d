//! void library crate
//!
//! Exposes the dashboard modules so the binary and the benchmarks share one
//! build of the collection and filtering code.

pub mod app;
pub mod commits;
pub mod config;
pub mod logging;
pub mod sources;
pub mod ui;
pub mod util;
