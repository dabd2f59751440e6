//! Energy-flow attribution for building dashboards.
//!
//! Turns per-meter power samples into a solar/grid decomposition per building
//! and, for buildings inside a complex, an estimate of how much of their grid
//! import was covered by sibling solar export.

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod power_flow;
pub mod site;
pub mod telemetry;
