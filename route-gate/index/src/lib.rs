#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Keeps the current route snapshot fresh and gates probes against it.

mod gate;
mod index;
pub mod metrics;

#[cfg(test)]
mod mock;

pub use self::{
    gate::{GateError, ProbeGate, ProbeOutcome},
    index::{Config, Index, SnapshotError},
    metrics::{IndexMetrics, ProbeMetrics},
};
