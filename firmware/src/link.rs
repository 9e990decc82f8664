//! Shared plumbing between the node's tasks.
//!
//! The two serial tasks and the duty-cycle loop exchange exactly three
//! things: publish requests toward the modem, completed fix reports back
//! from the GPS, and the acquire/abort command that starts a one-shot.
//! Everything else crosses task boundaries through the readiness flags in
//! `node-core`.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_sync::signal::Signal;
use heapless::{String, Vec};
use node_core::gps::MAX_FIX;
use node_core::modem::MAX_PAYLOAD;
use portable_atomic::{AtomicBool, Ordering};

/// Depth of the publish queue: one telemetry and one position payload can
/// be outstanding in the same cycle.
pub const PUBLISH_QUEUE_DEPTH: usize = 2;

/// The GPS task reports at most one outcome per acquisition.
pub const FIX_QUEUE_DEPTH: usize = 1;

#[cfg(target_os = "none")]
type LinkMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type LinkMutex = NoopRawMutex;

pub type PayloadBytes = Vec<u8, MAX_PAYLOAD>;

/// Payload handed from the cycle loop to the modem task.
#[derive(Clone, Debug)]
pub struct PublishRequest {
    pub payload: PayloadBytes,
}

impl PublishRequest {
    /// `None` when `bytes` exceeds what the modem link accepts.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Vec::from_slice(bytes).ok().map(|payload| Self { payload })
    }
}

pub type PublishQueue = Channel<LinkMutex, PublishRequest, PUBLISH_QUEUE_DEPTH>;
pub type PublishSender<'a> = Sender<'a, LinkMutex, PublishRequest, PUBLISH_QUEUE_DEPTH>;
pub type PublishReceiver<'a> = Receiver<'a, LinkMutex, PublishRequest, PUBLISH_QUEUE_DEPTH>;

/// Outcome of a one-shot acquisition, handed to the cycle loop.
#[derive(Clone, Debug)]
pub enum FixReport {
    Fix(String<MAX_FIX>),
    TimedOut,
}

pub type FixQueue = Channel<LinkMutex, FixReport, FIX_QUEUE_DEPTH>;
pub type FixSender<'a> = Sender<'a, LinkMutex, FixReport, FIX_QUEUE_DEPTH>;
pub type FixReceiver<'a> = Receiver<'a, LinkMutex, FixReport, FIX_QUEUE_DEPTH>;

/// Command from the cycle loop to the GPS task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AcquireCommand {
    Start,
    Abort,
}

pub type AcquireSignal = Signal<LinkMutex, AcquireCommand>;

/// Pauses a serial task's receive path across deep sleep.
///
/// While closed, the owning task stops draining its UART; whatever arrives
/// in the meantime sits in (and may fall out of) the hardware FIFO, which
/// is the intended lossy behavior during sleep.
#[derive(Debug)]
pub struct RxGate {
    open: AtomicBool,
}

impl Default for RxGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RxGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn pause(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn resume(&self) {
        self.open.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_starts_open_and_toggles() {
        let gate = RxGate::new();
        assert!(gate.is_open());
        gate.pause();
        assert!(!gate.is_open());
        gate.resume();
        assert!(gate.is_open());
    }

    #[test]
    fn publish_request_respects_the_payload_bound() {
        assert!(PublishRequest::from_bytes(b"{}").is_some());
        let oversized = [0u8; MAX_PAYLOAD + 1];
        assert!(PublishRequest::from_bytes(&oversized).is_none());
    }
}
