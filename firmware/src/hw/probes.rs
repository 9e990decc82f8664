//! Bit-banged DHT22 probes behind a switched power rail.
//!
//! The single-wire protocol is timing driven: the host holds the line low
//! to request a reading, then the sensor clocks out 40 bits where the high
//! pulse width encodes the bit value. The 40-bit exchange runs inside a
//! critical section so an interrupt cannot stretch a pulse mid-read.

use embassy_rp::gpio::{Flex, Level, Output, Pull};
use embassy_time::{Duration, Instant, Timer, block_for};
use node_core::payload::{ClimateReading, ClimateSnapshot};

/// Attempts per probe before giving up on this cycle.
const READ_RETRIES: usize = 10;
/// DHT22 power-on stabilization.
const SETTLE: Duration = Duration::from_secs(2);
/// Gap between retry attempts; the sensor needs time between requests.
const RETRY_GAP: Duration = Duration::from_millis(500);

/// Pulse longer than this is a 1 bit (nominal: 26-28 us low, 70 us high).
const ONE_THRESHOLD_US: u64 = 50;
const EDGE_TIMEOUT_US: u64 = 120;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProbeError {
    /// The sensor never produced the expected edge.
    Timeout,
    /// The parity byte disagreed with the data.
    Checksum,
}

/// Enclosure and outside probes sharing one switched rail.
pub struct ClimateProbes {
    enclosure: Flex<'static>,
    outside: Flex<'static>,
    rail: Output<'static>,
}

impl ClimateProbes {
    #[must_use]
    pub fn new(enclosure: Flex<'static>, outside: Flex<'static>, rail: Output<'static>) -> Self {
        Self {
            enclosure,
            outside,
            rail,
        }
    }

    /// Powers the probes, reads both, and powers them back down.
    ///
    /// A probe that fails all its retries contributes zeroed readings; the
    /// publish still goes out with whatever data this cycle produced.
    pub async fn read(&mut self) -> ClimateSnapshot {
        self.rail.set_high();
        Timer::after(SETTLE).await;

        let enclosure = Self::read_with_retries(&mut self.enclosure).await;
        let outside = Self::read_with_retries(&mut self.outside).await;
        self.rail.set_low();

        if enclosure.is_err() {
            defmt::warn!("probes: enclosure read failed");
        }
        if outside.is_err() {
            defmt::warn!("probes: outside read failed");
        }

        ClimateSnapshot {
            enclosure: enclosure.unwrap_or_default(),
            outside: outside.unwrap_or_default(),
        }
    }

    async fn read_with_retries(pin: &mut Flex<'static>) -> Result<ClimateReading, ProbeError> {
        let mut last = Err(ProbeError::Timeout);
        for _ in 0..READ_RETRIES {
            last = Self::read_once(pin);
            if last.is_ok() {
                return last;
            }
            Timer::after(RETRY_GAP).await;
        }
        last
    }

    fn read_once(pin: &mut Flex<'static>) -> Result<ClimateReading, ProbeError> {
        // Start request: >1 ms low, then release and let the pull-up win.
        pin.set_as_output();
        pin.set_low();
        block_for(Duration::from_millis(2));
        pin.set_as_input();
        pin.set_pull(Pull::Up);

        let raw = critical_section::with(|_| -> Result<u64, ProbeError> {
            // Sensor response preamble: 80 us low, 80 us high.
            wait_for(pin, Level::Low)?;
            wait_for(pin, Level::High)?;
            wait_for(pin, Level::Low)?;

            let mut raw: u64 = 0;
            for _ in 0..40 {
                wait_for(pin, Level::High)?;
                let rose = Instant::now();
                wait_for(pin, Level::Low)?;
                let high_us = rose.elapsed().as_micros();
                raw = (raw << 1) | u64::from(high_us > ONE_THRESHOLD_US);
            }
            Ok(raw)
        })?;

        decode(raw)
    }
}

fn wait_for(pin: &Flex<'static>, level: Level) -> Result<(), ProbeError> {
    let deadline = Instant::now() + Duration::from_micros(EDGE_TIMEOUT_US);
    let target = level == Level::High;
    while pin.is_high() != target {
        if Instant::now() >= deadline {
            return Err(ProbeError::Timeout);
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn decode(raw: u64) -> Result<ClimateReading, ProbeError> {
    let bytes = [
        (raw >> 32) as u8,
        (raw >> 24) as u8,
        (raw >> 16) as u8,
        (raw >> 8) as u8,
        raw as u8,
    ];
    let sum = bytes[0]
        .wrapping_add(bytes[1])
        .wrapping_add(bytes[2])
        .wrapping_add(bytes[3]);
    if sum != bytes[4] {
        return Err(ProbeError::Checksum);
    }

    let humidity_raw = u16::from_be_bytes([bytes[0], bytes[1]]);
    let temperature_raw = u16::from_be_bytes([bytes[2], bytes[3]]);
    // Top bit of the temperature word is the sign.
    let magnitude = f32::from(temperature_raw & 0x7FFF) / 10.0;
    let temperature_c = if temperature_raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    };

    Ok(ClimateReading {
        temperature_c,
        humidity_pct: f32::from(humidity_raw) / 10.0,
    })
}
