//! Runtime collaborator seam.
//!
//! # Data Flow
//! ```text
//! configuration document (text)
//!     → ConfigLoader::load      (document → descriptor)
//!     → RuntimeFactory::build   (BuildContext + descriptor → instance)
//!     → RuntimeInstance::start  (instance begins serving)
//!     ...
//!     → RuntimeInstance::close  (instance releases its resources)
//! ```
//!
//! # Design Decisions
//! - The proxy engine is opaque; the controller only sees these three traits
//! - Errors are associated types so the controller can hand them back untouched
//! - The asset directory travels in `BuildContext`, not only through the environment

use std::path::PathBuf;

use crate::lifecycle::scope::RunScope;

/// Unique identifier for one start attempt of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0.simple())
    }
}

/// Turns a raw configuration document into a runtime-ready descriptor.
pub trait ConfigLoader: Send + Sync {
    /// Parsed representation handed to the factory.
    type Descriptor;
    /// Loader failure, returned to the caller of `start` as-is.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the full document.
    fn load(&self, document: &str) -> Result<Self::Descriptor, Self::Error>;
}

impl<F, D, E> ConfigLoader for F
where
    F: Fn(&str) -> Result<D, E> + Send + Sync,
    E: std::error::Error + Send + Sync + 'static,
{
    type Descriptor = D;
    type Error = E;

    fn load(&self, document: &str) -> Result<D, E> {
        self(document)
    }
}

/// Everything the factory receives besides the descriptor.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Execution-context scope; cancelled when the instance is stopped or rolled back.
    pub scope: RunScope,
    /// Session this instance belongs to.
    pub session: SessionId,
    /// Asset directory hint taken from the document, if any.
    pub asset_dir: Option<PathBuf>,
}

/// Constructs runtime instances.
pub trait RuntimeFactory: Send + Sync {
    /// Descriptor type accepted by `build`.
    type Descriptor;
    /// Instance type produced by `build`.
    type Instance: RuntimeInstance<Error = Self::Error>;
    /// Construction, start and close failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build a new, not yet started, instance.
    fn build(
        &self,
        ctx: BuildContext,
        descriptor: Self::Descriptor,
    ) -> Result<Self::Instance, Self::Error>;
}

/// A constructed proxy engine.
pub trait RuntimeInstance: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Begin serving traffic.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Release everything the instance holds. Called at most once per instance.
    fn close(&mut self) -> Result<(), Self::Error>;
}
