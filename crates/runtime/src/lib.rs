//! Tempo Runtime: operator library for the Tempo stack machine
//!
//! Built on the primitives of `tempo-core` (values, stacks, macros and the
//! [`Operator`](tempo_core::Operator) contract), this crate provides:
//!
//! - `mapping`: the per-series mapping pattern shared by analytic operators
//! - `geo_ops`: GEO.INTERSECTS, GEO.WITHIN, GEO.FILTER
//! - `timebox`: TIMEBOX, time-bounded execution on a worker thread
//! - `bounded`: a writer that fails once an output ceiling is reached
//! - `base58`: Base58 / Base58Check codecs and their operators
//! - `render`: SNAPSHOT and ->JSON
//! - `config`: property map (TOML + environment)
//! - `registry`: name -> operator dispatch
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod base58;
pub mod bounded;
pub mod config;
pub mod geo_ops;
pub mod mapping;
pub mod registry;
pub mod render;
pub mod timebox;

pub use base58::{B58To, Base58Error, ToB58};
pub use bounded::{BoundedWriter, sink_error};
pub use config::Properties;
pub use geo_ops::{GeoFilter, GeoIntersects, geo_within};
pub use mapping::{ClosureMapper, Mapping, SeriesMapper, apply_mapper};
pub use registry::Registry;
pub use render::{Snapshot, ToJson, snapshot, to_json};
pub use timebox::{TimeBox, active_workers};

/// Route `tracing` output to the test harness, honoring `RUST_LOG`
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
