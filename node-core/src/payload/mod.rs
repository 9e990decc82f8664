//! Published payload construction.
//!
//! Two documents leave the node: the telemetry payload (climate probes plus
//! the averaged power window) and the position payload (the raw NMEA fix
//! record). Field order is part of the broker-side contract and is fixed by
//! the emission order here.

pub mod json;

use core::fmt::{self, Write};

use heapless::String;

use crate::power::{PowerAverage, PowerFlags};
use json::JsonWriter;

/// Payload text buffer, sized to what the modem link accepts.
pub const MAX_PAYLOAD_TEXT: usize = crate::modem::MAX_PAYLOAD;

pub type PayloadText = String<MAX_PAYLOAD_TEXT>;

/// One humidity/temperature probe reading.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Both probes, in emission order: enclosure first, outside second.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClimateSnapshot {
    pub enclosure: ClimateReading,
    pub outside: ClimateReading,
}

/// Payload construction failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PayloadError {
    /// The document outgrew [`MAX_PAYLOAD_TEXT`].
    BufferFull,
}

impl From<fmt::Error> for PayloadError {
    fn from(_: fmt::Error) -> Self {
        Self::BufferFull
    }
}

/// Builds the per-cycle telemetry document.
pub fn telemetry_payload(
    climate: &ClimateSnapshot,
    power: &PowerAverage,
    flags: PowerFlags,
) -> Result<PayloadText, PayloadError> {
    let mut text = PayloadText::new();
    write_telemetry(&mut text, climate, power, flags)?;
    Ok(text)
}

#[allow(clippy::cast_possible_truncation)]
fn write_telemetry<W: Write>(
    out: &mut W,
    climate: &ClimateSnapshot,
    power: &PowerAverage,
    flags: PowerFlags,
) -> fmt::Result {
    let mut w = JsonWriter::new(out);
    w.open_object()?;
    w.key("dht22")?;
    w.open_array()?;
    for probe in [&climate.enclosure, &climate.outside] {
        w.open_object()?;
        w.key("t")?;
        w.number(probe.temperature_c)?;
        w.key("rh")?;
        w.number(probe.humidity_pct)?;
        w.close_object()?;
    }
    w.close_array()?;
    w.key("power")?;
    w.open_object()?;
    w.key("Vsol")?;
    w.integer(power.solar.voltage_mv as i32)?;
    w.key("Isol")?;
    w.integer(power.solar.current_ma as i32)?;
    w.key("Vbat")?;
    w.integer(power.battery.voltage_mv as i32)?;
    w.key("Ibat")?;
    w.integer(power.battery.current_ma as i32)?;
    w.key("is_charging")?;
    w.boolean(flags.is_charging)?;
    w.key("pgood")?;
    w.boolean(flags.power_good)?;
    w.close_object()?;
    w.close_object()
}

/// Builds the position document around a completed fix record.
pub fn position_payload(fix: &str) -> Result<PayloadText, PayloadError> {
    let mut text = PayloadText::new();
    let mut w = JsonWriter::new(&mut text);
    w.open_object()?;
    w.key("gps")?;
    w.string(fix)?;
    w.close_object()?;
    Ok(text)
}
