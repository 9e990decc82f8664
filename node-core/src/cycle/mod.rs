//! Duty-cycle policy helpers.
//!
//! The firmware loop owns the clock and the sleep; these types keep the
//! decisions (when to fix, when to stop waiting for stragglers) pure and
//! host-testable. Instants are generic so tests can drive the policy with a
//! mock clock, the same way the firmware drives it with `embassy_time`.

use core::ops::Add;

use crate::flags::ReadyWatcher;

/// Samples folded into one published power average.
pub const POWER_WINDOW: usize = 10;

/// Duty cycles between GPS acquisitions.
pub const GPS_PERIOD_CYCLES: u32 = 120;

/// Seconds granted to in-flight work before the node sleeps anyway.
pub const READY_TIMEOUT_SECS: u64 = 60;

/// Seconds spent in deep sleep between cycles.
pub const SLEEP_INTERVAL_SECS: u64 = 30;

/// Tunables for one deployment.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CycleConfig {
    pub window_size: usize,
    pub gps_period: u32,
    pub ready_timeout_secs: u64,
    pub sleep_interval_secs: u64,
}

impl CycleConfig {
    pub const DEFAULT: Self = Self {
        window_size: POWER_WINDOW,
        gps_period: GPS_PERIOD_CYCLES,
        ready_timeout_secs: READY_TIMEOUT_SECS,
        sleep_interval_secs: SLEEP_INTERVAL_SECS,
    };
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Countdown deciding which cycles start a GPS acquisition.
#[derive(Debug)]
pub struct GpsCadence {
    period: u32,
    remaining: u32,
}

impl GpsCadence {
    /// A zero period disables acquisitions entirely.
    #[must_use]
    pub const fn new(period: u32) -> Self {
        Self {
            period,
            remaining: period,
        }
    }

    /// Advances one duty cycle; `true` means an acquisition is due now.
    pub fn tick(&mut self) -> bool {
        if self.period == 0 {
            return false;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.remaining = self.period;
            return true;
        }
        false
    }
}

/// Result of polling a [`ReadinessWait`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WaitStatus {
    /// Both subsystems are quiescent; flags untouched.
    Ready,
    /// Still waiting; poll again later.
    Pending,
    /// Deadline passed. Both flags were forced ready so the node sleeps
    /// regardless of a stuck subsystem; late completions are abandoned.
    TimedOut,
}

/// Deadline-bound rendezvous between the cycle loop and its two background
/// producers.
#[derive(Copy, Clone, Debug)]
pub struct ReadinessWait<TInstant> {
    deadline: TInstant,
}

impl<TInstant> ReadinessWait<TInstant>
where
    TInstant: Copy + Ord,
{
    pub fn begin<D>(now: TInstant, timeout: D) -> Self
    where
        TInstant: Add<D, Output = TInstant>,
    {
        Self {
            deadline: now + timeout,
        }
    }

    /// Checks both flags against the deadline.
    pub fn poll(
        &self,
        link: &ReadyWatcher<'_>,
        fix: &ReadyWatcher<'_>,
        now: TInstant,
    ) -> WaitStatus {
        if link.is_ready() && fix.is_ready() {
            return WaitStatus::Ready;
        }
        if now >= self.deadline {
            link.force_ready();
            fix.force_ready();
            return WaitStatus::TimedOut;
        }
        WaitStatus::Pending
    }
}
