//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (controller.rs):
//!     lock → already running? return
//!     → extract asset hint → export per AssetEnvMode (env.rs)
//!     → new RunScope (scope.rs)
//!     → load document → build instance → start instance
//!     → disarm rollback guards (rollback.rs) → store as Running
//!
//! Stop (controller.rs):
//!     lock → take Running → close instance → cancel scope → restore env
//! ```
//!
//! # Design Decisions
//! - One lock covers the whole check-and-mutate sequence of start and stop
//! - Instance, scope and session live in one `Option`, so they exist together or not at all
//! - Every acquisition during start is guarded; failures release in reverse order
//! - Close errors on stop are logged, never returned; cancellation always follows

pub mod controller;
pub mod env;
pub mod rollback;
pub mod scope;

pub use controller::{Controller, ControllerState, StartError, StartOutcome};
pub use scope::RunScope;
