//! Runtime lifecycle controller.
//!
//! # States
//! - Stopped: no instance, no scope (initial)
//! - Running: exactly one started instance and its scope
//!
//! # State Transitions
//! ```text
//! Stopped --start ok-->   Running
//! Stopped --start err-->  Stopped   (everything acquired is released)
//! Running --start-->      Running   (document ignored)
//! Running --stop-->       Stopped
//! Stopped --stop-->       Stopped
//! ```

use std::error::Error as StdError;
use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::document::asset_hint;
use crate::config::schema::{AssetSettings, ControllerSettings};
use crate::lifecycle::env::{apply_asset_hint, EnvOverride};
use crate::lifecycle::rollback::Armed;
use crate::lifecycle::scope::RunScope;
use crate::observability::metrics;
use crate::runtime::{BuildContext, ConfigLoader, RuntimeFactory, RuntimeInstance, SessionId};

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Stopped,
    Running,
}

/// Successful result of [`Controller::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new instance was built and started.
    Started(SessionId),
    /// An instance was already running; nothing changed.
    AlreadyRunning(SessionId),
}

impl StartOutcome {
    /// Session of the instance that is running after the call.
    pub fn session(&self) -> SessionId {
        match self {
            StartOutcome::Started(id) | StartOutcome::AlreadyRunning(id) => *id,
        }
    }
}

/// Failure of [`Controller::start`].
///
/// Each variant carries the collaborator's error unchanged; `Display` and
/// `source` are forwarded to it.
#[derive(Debug, Error)]
pub enum StartError<L, R>
where
    L: StdError + 'static,
    R: StdError + 'static,
{
    /// The config loader rejected the document.
    #[error(transparent)]
    Load(L),

    /// The factory could not construct an instance.
    #[error(transparent)]
    Build(R),

    /// The instance was constructed but failed to start.
    #[error(transparent)]
    Start(R),
}

impl<L, R> StartError<L, R>
where
    L: StdError + 'static,
    R: StdError + 'static,
{
    /// Name of the step that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            StartError::Load(_) => "load",
            StartError::Build(_) => "build",
            StartError::Start(_) => "start",
        }
    }

    /// The loader's error, if loading failed.
    pub fn loader_error(&self) -> Option<&L> {
        match self {
            StartError::Load(e) => Some(e),
            _ => None,
        }
    }

    /// The factory's or instance's error, if construction or start failed.
    pub fn runtime_error(&self) -> Option<&R> {
        match self {
            StartError::Build(e) | StartError::Start(e) => Some(e),
            StartError::Load(_) => None,
        }
    }
}

/// Everything owned while an instance runs. Exists only as a whole.
struct Running<I> {
    instance: I,
    scope: RunScope,
    session: SessionId,
    /// Restores the asset variable on drop in scoped mode.
    assets: Option<EnvOverride>,
}

impl<I: RuntimeInstance> Running<I> {
    /// Close the instance, then cancel its scope. Never fails.
    fn shutdown(mut self) {
        if let Err(e) = self.instance.close() {
            tracing::warn!(session = %self.session, error = %e, "Runtime close failed; cancelling anyway");
        }
        self.scope.cancel();
        if let Some(guard) = self.assets.take() {
            tracing::debug!(session = %self.session, key = %guard.key(), "Restoring asset environment");
        }
    }
}

/// Owns at most one runtime instance and serialises its start and stop.
///
/// `start` and `stop` block the calling thread for as long as the loader,
/// factory and instance take; concurrent callers wait on the same lock.
pub struct Controller<L, F>
where
    L: ConfigLoader,
    F: RuntimeFactory<Descriptor = L::Descriptor>,
{
    loader: L,
    factory: F,
    assets: AssetSettings,
    running: Mutex<Option<Running<F::Instance>>>,
}

impl<L, F> Controller<L, F>
where
    L: ConfigLoader,
    F: RuntimeFactory<Descriptor = L::Descriptor>,
{
    /// Create a stopped controller with default asset settings.
    pub fn new(loader: L, factory: F) -> Self {
        Self::with_assets(loader, factory, AssetSettings::default())
    }

    /// Create a stopped controller using the asset section of `settings`.
    pub fn from_settings(loader: L, factory: F, settings: &ControllerSettings) -> Self {
        Self::with_assets(loader, factory, settings.assets.clone())
    }

    /// Create a stopped controller with explicit asset settings.
    pub fn with_assets(loader: L, factory: F, assets: AssetSettings) -> Self {
        Self {
            loader,
            factory,
            assets,
            running: Mutex::new(None),
        }
    }

    /// Load `document`, build an instance from it and start it.
    ///
    /// A no-op returning [`StartOutcome::AlreadyRunning`] if an instance is
    /// already running. On error nothing acquired during the call survives,
    /// except the asset variable in `persist` mode.
    pub fn start(&self, document: &str) -> Result<StartOutcome, StartError<L::Error, F::Error>> {
        let mut slot = self.running.lock();

        if let Some(running) = slot.as_ref() {
            tracing::debug!(session = %running.session, "Runtime already running, start ignored");
            metrics::record_start("already_running");
            return Ok(StartOutcome::AlreadyRunning(running.session));
        }

        let session = SessionId::new();
        let span = tracing::info_span!("runtime_start", session = %session);
        let _entered = span.enter();

        let asset_dir = asset_hint(document);
        let assets = asset_dir
            .as_deref()
            .and_then(|dir| apply_asset_hint(self.assets.mode, &self.assets.env_var, dir));

        // Declared in acquisition order; on early return they drop in reverse.
        let scope = Armed::new("scope", RunScope::new(), |scope: RunScope| scope.cancel());

        let descriptor = self
            .loader
            .load(document)
            .map_err(|e| Self::rolled_back(StartError::Load(e)))?;

        let ctx = BuildContext {
            scope: scope.clone(),
            session,
            asset_dir,
        };
        let instance = self
            .factory
            .build(ctx, descriptor)
            .map_err(|e| Self::rolled_back(StartError::Build(e)))?;

        let mut instance = Armed::new("instance", instance, |mut instance: F::Instance| {
            if let Err(e) = instance.close() {
                tracing::warn!(error = %e, "Closing unstarted runtime failed");
            }
        });

        instance
            .start()
            .map_err(|e| Self::rolled_back(StartError::Start(e)))?;

        *slot = Some(Running {
            instance: instance.disarm(),
            scope: scope.disarm(),
            session,
            assets,
        });

        metrics::record_start("started");
        metrics::record_running(true);
        tracing::info!("Runtime started");
        Ok(StartOutcome::Started(session))
    }

    /// Close the running instance and cancel its scope. No-op when stopped.
    pub fn stop(&self) {
        let mut slot = self.running.lock();
        let Some(running) = slot.take() else {
            tracing::trace!("Stop requested while stopped");
            return;
        };

        let session = running.session;
        running.shutdown();

        metrics::record_stop();
        metrics::record_running(false);
        tracing::info!(session = %session, "Runtime stopped");
    }

    pub fn state(&self) -> ControllerState {
        if self.running.lock().is_some() {
            ControllerState::Running
        } else {
            ControllerState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    /// Session of the running instance, if any.
    pub fn session(&self) -> Option<SessionId> {
        self.running.lock().as_ref().map(|running| running.session)
    }

    fn rolled_back(
        err: StartError<L::Error, F::Error>,
    ) -> StartError<L::Error, F::Error> {
        tracing::warn!(stage = err.stage(), error = %err, "Runtime start failed, rolling back");
        metrics::record_start("failed");
        metrics::record_rollback(err.stage());
        err
    }
}

impl<L, F> fmt::Debug for Controller<L, F>
where
    L: ConfigLoader,
    F: RuntimeFactory<Descriptor = L::Descriptor>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("assets", &self.assets)
            .field(
                "session",
                &self
                    .running
                    .try_lock()
                    .map(|slot| slot.as_ref().map(|running| running.session)),
            )
            .finish_non_exhaustive()
    }
}

impl<L, F> Drop for Controller<L, F>
where
    L: ConfigLoader,
    F: RuntimeFactory<Descriptor = L::Descriptor>,
{
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            tracing::debug!(session = %running.session, "Controller dropped while running, stopping");
            running.shutdown();
            metrics::record_stop();
            metrics::record_running(false);
        }
    }
}
