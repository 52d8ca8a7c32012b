//! Error types for the CronSentry protocol layer.

mod send;
mod store;

pub use send::*;
pub use store::*;
