//! Stub loader and runtime shared by the integration tests.

#![allow(dead_code)]

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gozar_core::{BuildContext, ConfigLoader, RunScope, RuntimeFactory, RuntimeInstance};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("loader: {0}")]
pub struct LoadError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StubError {
    #[error("build refused")]
    Build,
    #[error("start refused")]
    Start,
    #[error("close refused")]
    Close,
}

/// Counts everything the controller does to the runtime.
#[derive(Debug, Default)]
pub struct Probe {
    pub loads: AtomicUsize,
    pub builds: AtomicUsize,
    pub starts: AtomicUsize,
    pub closes: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub contexts: Mutex<Vec<BuildContext>>,
    pub documents: Mutex<Vec<String>>,
}

impl Probe {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn scopes(&self) -> Vec<RunScope> {
        self.contexts.lock().iter().map(|c| c.scope.clone()).collect()
    }
}

/// Loader returning the raw document, optionally slow or failing.
pub struct StubLoader {
    pub probe: Arc<Probe>,
    pub delay: Duration,
    pub fail: bool,
}

impl ConfigLoader for StubLoader {
    type Descriptor = String;
    type Error = LoadError;

    fn load(&self, document: &str) -> Result<String, LoadError> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        self.probe.documents.lock().push(document.to_string());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            return Err(LoadError(format!("cannot parse {} bytes", document.len())));
        }
        Ok(document.to_string())
    }
}

/// Factory whose instances record their lifecycle in a shared probe.
pub struct StubFactory<D = String> {
    pub probe: Arc<Probe>,
    pub fail_build: bool,
    pub fail_start: bool,
    pub fail_close: bool,
    _descriptor: PhantomData<fn(D)>,
}

impl<D> StubFactory<D> {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self {
            probe,
            fail_build: false,
            fail_start: false,
            fail_close: false,
            _descriptor: PhantomData,
        }
    }
}

impl<D> RuntimeFactory for StubFactory<D> {
    type Descriptor = D;
    type Instance = StubInstance;
    type Error = StubError;

    fn build(&self, ctx: BuildContext, _descriptor: D) -> Result<StubInstance, StubError> {
        self.probe.builds.fetch_add(1, Ordering::SeqCst);
        self.probe.contexts.lock().push(ctx.clone());
        if self.fail_build {
            return Err(StubError::Build);
        }
        Ok(StubInstance {
            probe: Arc::clone(&self.probe),
            scope: ctx.scope,
            fail_start: self.fail_start,
            fail_close: self.fail_close,
            started: false,
        })
    }
}

pub struct StubInstance {
    probe: Arc<Probe>,
    scope: RunScope,
    fail_start: bool,
    fail_close: bool,
    started: bool,
}

impl RuntimeInstance for StubInstance {
    type Error = StubError;

    fn start(&mut self) -> Result<(), StubError> {
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(StubError::Start);
        }
        self.started = true;
        let live = self.probe.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StubError> {
        assert!(!self.scope.is_cancelled(), "instance closed after its scope was cancelled");
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.started {
            self.started = false;
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
        }
        if self.fail_close {
            return Err(StubError::Close);
        }
        Ok(())
    }
}

pub fn loader(probe: &Arc<Probe>) -> StubLoader {
    StubLoader {
        probe: Arc::clone(probe),
        delay: Duration::ZERO,
        fail: false,
    }
}

pub fn factory(probe: &Arc<Probe>) -> StubFactory {
    StubFactory::new(Arc::clone(probe))
}
