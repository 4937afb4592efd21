//! Portfolio action engine: chain ordering, zap-in minimums, rebalance
//! arithmetic, per-protocol flow charts and transaction progress tracking.

pub mod config;
pub mod engine;
pub mod example;
pub mod model;
pub mod schema;
pub mod validate;

#[cfg(feature = "full")]
pub mod driver;
#[cfg(feature = "full")]
pub mod progress;
#[cfg(feature = "full")]
pub mod visualize;

#[cfg(feature = "wasm")]
pub mod wasm;
