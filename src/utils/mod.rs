//! Utility functions and helpers

pub mod telemetry;
