//! # CronSentry API
//!
//! HTTP surface of the monitor: job management, the ping endpoint hit by
//! monitored jobs, and a health probe.
//!
//! ## Route Structure
//!
//! ```text
//! /api/jobs
//!   POST   /api/jobs                      - Create job
//!   GET    /api/jobs                      - List jobs of the caller
//!   GET    /api/jobs/{id}                 - Get job
//!   PUT    /api/jobs/{id}                 - Partial update
//!   DELETE /api/jobs/{id}                 - Delete job
//!   POST   /api/jobs/{id}/pause           - Pause monitoring
//!   POST   /api/jobs/{id}/resume          - Resume monitoring
//!   GET    /api/jobs/{id}/events          - Recent events
//!   GET    /api/jobs/{id}/notifications   - Notifications raised
//!
//! /api/ping/{id}  (GET or POST)           - Check-in from a monitored job
//! /health                                 - Store probe
//! ```

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use extract::{Owner, OWNER_HEADER};
pub use routes::create_router;
pub use server::{ApiServer, ServerAddr};
pub use state::AppState;
