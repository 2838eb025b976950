//! evalwatch - wait for the allocations of a Nomad evaluation to run and
//! pass their Consul health checks, then print what happened.

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

pub use app::run;
pub use client::{ConsulClient, NomadClient};
pub use config::Config;
