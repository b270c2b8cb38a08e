//! Lifecycle controller for an embedded proxy runtime.
//!
//! # Architecture Overview
//!
//! ```text
//!   share links ──▶ profile ──▶ runtime document (JSON)
//!                                      │
//!                                      ▼
//!                        ┌──────────────────────────┐
//!     start / stop ────▶ │   lifecycle::Controller  │
//!                        │  asset hint → env / ctx  │
//!                        │  load → build → start    │
//!                        │  rollback on failure     │
//!                        └────────────┬─────────────┘
//!                                     │ ConfigLoader / RuntimeFactory
//!                                     ▼
//!                        external proxy runtime instance
//! ```

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod profile;
pub mod runtime;

pub use config::{ControllerSettings, DocumentLoader, RuntimeDocument};
pub use lifecycle::{Controller, ControllerState, RunScope, StartError, StartOutcome};
pub use runtime::{BuildContext, ConfigLoader, RuntimeFactory, RuntimeInstance, SessionId};
