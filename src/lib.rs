//! `arus-logger`: HTTP service that logs batches of motor current samples.
//!
//! Devices post short batches of `{sample, I}` readings. Each accepted batch
//! gets one generated id and synthetic timestamps one second apart ending at
//! the capture instant, and is written to one of six parallel log tables.
//! Read-back groups rows by batch. A separate `indicator` table keeps the
//! last known value and motor label per device.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): the
//! types below are re-exported here so that `routes/*.rs` and `store/*.rs`
//! only depend on the crate root, never on each other's internals.

pub mod config;
pub mod error;
pub mod models;
pub mod partition;
pub mod pipeline;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::AppError;
pub use models::{Batch, BatchSummary, Indicator, IndicatorUpdate, Reading, Sample};
pub use partition::Partition;
pub use store::{SharedStore, Store};
