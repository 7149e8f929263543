#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use route_gate_core as core;
pub use route_gate_index as index;
pub use route_gate_k8s_api as k8s;

mod api;
mod args;
mod probe;
mod render;
mod server;

pub use self::{api::Api, args::Args, probe::HttpProbe};
