//! Reference-counted engine lifetime.
//!
//! The engine has process-wide state that must be initialized once before
//! the first document is opened and torn down after the last one is closed.
//! [`LibraryRefCounter`] counts the clients; [`LibraryRef`] is the scoped
//! handle a client holds for as long as it needs the engine.

use crate::config::RendererConfig;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Engine init and teardown, run on the 0→1 and 1→0 transitions.
pub trait EngineLifecycle {
    fn init(&self);
    fn destroy(&self);
}

/// The `pdf-x-core` engine, configured from the environment.
#[derive(Debug, Default)]
pub struct EngineLibrary;

impl EngineLifecycle for EngineLibrary {
    fn init(&self) {
        let config = RendererConfig::from_env();
        pdf_x_core::library::init_library(config.engine);
    }

    fn destroy(&self) {
        pdf_x_core::library::destroy_library();
    }
}

pub struct LibraryRefCounter<L: EngineLifecycle> {
    lifecycle: L,
    active_clients: Mutex<usize>,
}

impl<L: EngineLifecycle> LibraryRefCounter<L> {
    pub const fn new(lifecycle: L) -> Self {
        LibraryRefCounter {
            lifecycle,
            active_clients: Mutex::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.active_clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a client, initializing the engine for the first one.
    pub fn acquire(&self) -> LibraryRef<'_, L> {
        self.retain();
        LibraryRef { counter: self }
    }

    /// Raw increment; pair with [`LibraryRefCounter::release`].
    pub fn retain(&self) {
        let mut active = self.lock();
        if *active == 0 {
            log::debug!("initializing engine");
            self.lifecycle.init();
        }
        *active += 1;
    }

    /// Unregisters a client, tearing the engine down after the last one.
    pub fn release(&self) {
        let mut active = self.lock();
        if *active == 0 {
            log::error!("library released more often than acquired");
            return;
        }
        *active -= 1;
        if *active == 0 {
            log::debug!("destroying engine");
            self.lifecycle.destroy();
        }
    }

    pub fn is_initialized(&self) -> bool {
        *self.lock() > 0
    }

    pub fn active_clients(&self) -> usize {
        *self.lock()
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }
}

/// One client's claim on the engine; released exactly once, on drop.
#[must_use = "dropping the reference releases the library"]
pub struct LibraryRef<'a, L: EngineLifecycle> {
    counter: &'a LibraryRefCounter<L>,
}

impl<L: EngineLifecycle> Drop for LibraryRef<'_, L> {
    fn drop(&mut self) {
        self.counter.release();
    }
}

static LIBRARY: LibraryRefCounter<EngineLibrary> = LibraryRefCounter::new(EngineLibrary);

/// The process-wide counter guarding the engine.
pub fn library() -> &'static LibraryRefCounter<EngineLibrary> {
    &LIBRARY
}
