//! Readiness flags shared between the link tasks and the duty-cycle loop.
//!
//! Each flag has one producer (a link task marking its subsystem quiescent)
//! and one consumer (the cycle loop). The split handle pair keeps those
//! roles apart in the type system: a setter can only raise the flag, while
//! the watcher reads, clears, and force-raises it.

use portable_atomic::{AtomicBool, Ordering};

/// Const-initializable readiness flag, safe to place in a `static`.
#[derive(Debug)]
pub struct ReadyFlag {
    state: AtomicBool,
}

impl ReadyFlag {
    #[must_use]
    pub const fn new(initial: bool) -> Self {
        Self {
            state: AtomicBool::new(initial),
        }
    }

    /// Producer-side handle.
    #[must_use]
    pub const fn setter(&self) -> ReadySetter<'_> {
        ReadySetter { state: &self.state }
    }

    /// Consumer-side handle.
    #[must_use]
    pub const fn watcher(&self) -> ReadyWatcher<'_> {
        ReadyWatcher { state: &self.state }
    }
}

/// Raises the flag when the producing subsystem finishes its work.
#[derive(Copy, Clone, Debug)]
pub struct ReadySetter<'a> {
    state: &'a AtomicBool,
}

impl ReadySetter<'_> {
    pub fn set_ready(&self) {
        self.state.store(true, Ordering::Release);
    }
}

/// Observes the flag and manages its lifecycle across duty cycles.
#[derive(Copy, Clone, Debug)]
pub struct ReadyWatcher<'a> {
    state: &'a AtomicBool,
}

impl ReadyWatcher<'_> {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }

    /// Lowers the flag before handing work to the producer.
    pub fn clear(&self) {
        self.state.store(false, Ordering::Release);
    }

    /// Raises the flag on the producer's behalf, used when a readiness wait
    /// gives up on a stuck subsystem.
    pub fn force_ready(&self) {
        self.state.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setter_and_watcher_share_state() {
        let flag = ReadyFlag::new(false);
        let setter = flag.setter();
        let watcher = flag.watcher();

        assert!(!watcher.is_ready());
        setter.set_ready();
        assert!(watcher.is_ready());
        watcher.clear();
        assert!(!watcher.is_ready());
        watcher.force_ready();
        assert!(watcher.is_ready());
    }

    #[test]
    fn initial_state_is_preserved() {
        assert!(ReadyFlag::new(true).watcher().is_ready());
        assert!(!ReadyFlag::new(false).watcher().is_ready());
    }
}
