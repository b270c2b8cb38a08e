//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Controller transitions produce:
//!     → tracing events (structured fields: session, stage, error)
//!     → metrics.rs (start/stop/rollback counters, running gauge)
//!
//! Consumers (owned by the embedding application):
//!     → logging.rs installs a stdout subscriber on request
//!     → any `metrics` recorder/exporter
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or recorder implicitly
//! - Every log line from a start attempt carries its session ID

pub mod logging;
pub mod metrics;
