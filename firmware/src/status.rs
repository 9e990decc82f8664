#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics track duty-cycle progress and the latest power
//! readings so any task can log a consistent snapshot without touching
//! shared mutable state directly.

use node_core::power::PowerSample;
use portable_atomic::{AtomicI32, AtomicU32, Ordering};

/// Duty cycles completed since boot.
static CYCLE_COUNT: AtomicU32 = AtomicU32::new(0);
/// Payloads acknowledged by the broker since boot.
static PUBLISH_COUNT: AtomicU32 = AtomicU32::new(0);
/// GPS fixes assembled since boot.
static FIX_COUNT: AtomicU32 = AtomicU32::new(0);
/// Modem resequences observed since boot.
static RESEQUENCE_COUNT: AtomicU32 = AtomicU32::new(0);
/// Most recent battery rail voltage, millivolts.
static BATTERY_MV: AtomicI32 = AtomicI32::new(0);
/// Most recent solar rail voltage, millivolts.
static SOLAR_MV: AtomicI32 = AtomicI32::new(0);

/// Point-in-time view of the node's counters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub cycles: u32,
    pub publishes: u32,
    pub fixes: u32,
    pub resequences: u32,
    pub battery_mv: i32,
    pub solar_mv: i32,
}

pub fn record_cycle() -> u32 {
    CYCLE_COUNT.fetch_add(1, Ordering::Relaxed) + 1
}

pub fn record_publish() {
    PUBLISH_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn record_fix() {
    FIX_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn record_resequence() {
    RESEQUENCE_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Stores the latest rail voltages, truncated to whole millivolts.
#[allow(clippy::cast_possible_truncation)]
pub fn record_power(sample: &PowerSample) {
    BATTERY_MV.store(sample.battery.voltage_mv as i32, Ordering::Relaxed);
    SOLAR_MV.store(sample.solar.voltage_mv as i32, Ordering::Relaxed);
}

#[must_use]
pub fn snapshot() -> StatusSnapshot {
    StatusSnapshot {
        cycles: CYCLE_COUNT.load(Ordering::Relaxed),
        publishes: PUBLISH_COUNT.load(Ordering::Relaxed),
        fixes: FIX_COUNT.load(Ordering::Relaxed),
        resequences: RESEQUENCE_COUNT.load(Ordering::Relaxed),
        battery_mv: BATTERY_MV.load(Ordering::Relaxed),
        solar_mv: SOLAR_MV.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use node_core::power::RailSample;

    use super::*;

    #[test]
    fn power_sample_is_truncated_to_millivolts() {
        let sample = PowerSample {
            solar: RailSample {
                voltage_mv: 5123.7,
                current_ma: 0.0,
            },
            battery: RailSample {
                voltage_mv: 4001.2,
                current_ma: 0.0,
            },
        };
        record_power(&sample);
        let snapshot = snapshot();
        assert_eq!(snapshot.solar_mv, 5123);
        assert_eq!(snapshot.battery_mv, 4001);
    }
}
