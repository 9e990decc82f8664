//! Power rail sampling and windowed averaging.
//!
//! The node samples its solar and battery rails once per duty cycle and
//! publishes the mean of a fixed-size window, stamped with wall-clock time
//! from whatever [`TimeSource`] the platform provides.

use heapless::String;

/// Room for a `YY/MM/DD,HH:MM:SS` stamp.
pub const TIMESTAMP_LEN: usize = 20;

/// Wall-clock stamp attached to completed windows.
pub type Timestamp = String<TIMESTAMP_LEN>;

/// Wall-clock source used to stamp completed windows.
pub trait TimeSource {
    fn timestamp(&mut self) -> Timestamp;
}

/// [`TimeSource`] yielding an empty stamp, for hosts without an RTC.
#[derive(Debug, Default)]
pub struct NoopTime;

impl TimeSource for NoopTime {
    fn timestamp(&mut self) -> Timestamp {
        Timestamp::new()
    }
}

/// Instantaneous reading from one INA219-monitored rail.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RailSample {
    pub voltage_mv: f32,
    pub current_ma: f32,
}

/// One sample across both rails.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PowerSample {
    pub solar: RailSample,
    pub battery: RailSample,
}

/// Charger status pins read alongside the rails.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PowerFlags {
    pub is_charging: bool,
    pub power_good: bool,
}

/// Mean of one completed sampling window.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerAverage {
    pub solar: RailSample,
    pub battery: RailSample,
    pub sampled_at: Timestamp,
}

/// Accumulates [`PowerSample`]s and yields one mean per `N` samples.
#[derive(Debug)]
pub struct AveragingWindow<const N: usize> {
    solar_v: f32,
    solar_i: f32,
    battery_v: f32,
    battery_i: f32,
    count: usize,
}

impl<const N: usize> Default for AveragingWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AveragingWindow<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            solar_v: 0.0,
            solar_i: 0.0,
            battery_v: 0.0,
            battery_i: 0.0,
            count: 0,
        }
    }

    /// Samples accumulated toward the current window.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Folds one sample in. On the `N`th sample the window empties itself
    /// and returns the stamped mean; otherwise returns `None`.
    pub fn accumulate(
        &mut self,
        sample: PowerSample,
        clock: &mut impl TimeSource,
    ) -> Option<PowerAverage> {
        self.solar_v += sample.solar.voltage_mv;
        self.solar_i += sample.solar.current_ma;
        self.battery_v += sample.battery.voltage_mv;
        self.battery_i += sample.battery.current_ma;
        self.count += 1;

        if self.count < N {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let divisor = N as f32;
        let average = PowerAverage {
            solar: RailSample {
                voltage_mv: self.solar_v / divisor,
                current_ma: self.solar_i / divisor,
            },
            battery: RailSample {
                voltage_mv: self.battery_v / divisor,
                current_ma: self.battery_i / divisor,
            },
            sampled_at: clock.timestamp(),
        };
        *self = Self::new();
        Some(average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock;

    impl TimeSource for FixedClock {
        fn timestamp(&mut self) -> Timestamp {
            let mut stamp = Timestamp::new();
            stamp.push_str("24/05/17,10:54:45").unwrap();
            stamp
        }
    }

    fn sample(v: f32, i: f32) -> PowerSample {
        PowerSample {
            solar: RailSample {
                voltage_mv: v,
                current_ma: i,
            },
            battery: RailSample {
                voltage_mv: v / 2.0,
                current_ma: -i,
            },
        }
    }

    #[test]
    fn window_yields_stamped_mean_on_nth_sample() {
        let mut window = AveragingWindow::<4>::new();
        let mut clock = FixedClock;

        for n in 0..3 {
            assert!(window.accumulate(sample(4000.0, 100.0), &mut clock).is_none());
            assert_eq!(window.len(), n + 1);
        }

        let average = window
            .accumulate(sample(8000.0, 500.0), &mut clock)
            .unwrap();
        assert!((average.solar.voltage_mv - 5000.0).abs() < f32::EPSILON);
        assert!((average.solar.current_ma - 200.0).abs() < f32::EPSILON);
        assert!((average.battery.voltage_mv - 2500.0).abs() < f32::EPSILON);
        assert!((average.battery.current_ma + 200.0).abs() < f32::EPSILON);
        assert_eq!(average.sampled_at.as_str(), "24/05/17,10:54:45");
    }

    #[test]
    fn window_resets_after_completion() {
        let mut window = AveragingWindow::<2>::new();
        let mut clock = FixedClock;

        window.accumulate(sample(1.0, 1.0), &mut clock);
        assert!(window.accumulate(sample(3.0, 3.0), &mut clock).is_some());
        assert!(window.is_empty());

        // A fresh window averages only its own samples.
        window.accumulate(sample(10.0, 10.0), &mut clock);
        let average = window.accumulate(sample(20.0, 20.0), &mut clock).unwrap();
        assert!((average.solar.voltage_mv - 15.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_window_yields_nothing() {
        let mut window = AveragingWindow::<10>::new();
        let mut clock = NoopTime;

        for _ in 0..9 {
            assert!(window.accumulate(sample(1.0, 1.0), &mut clock).is_none());
        }
        assert_eq!(window.len(), 9);
    }
}
