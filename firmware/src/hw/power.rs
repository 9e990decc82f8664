//! INA219 rail monitors and charger status pins.
//!
//! Two INA219s share the I2C bus: one on the solar input, one on the
//! battery. Both run the default continuous shunt+bus configuration with a
//! 0.1 ohm shunt calibrated for a 100 uA/bit current LSB.

use embassy_rp::gpio::Input;
use embassy_rp::i2c::{self, Blocking, I2c};
use embassy_rp::peripherals::I2C0;
use node_core::power::{PowerFlags, PowerSample, RailSample};

const SOLAR_ADDR: u16 = 0x40;
const BATTERY_ADDR: u16 = 0x41;

const REG_CONFIG: u8 = 0x00;
const REG_BUS_VOLTAGE: u8 = 0x02;
const REG_CURRENT: u8 = 0x04;
const REG_CALIBRATION: u8 = 0x05;

/// 32 V range, +/-320 mV PGA, 12-bit conversions, continuous shunt+bus.
const CONFIG_WORD: u16 = 0x399F;
/// trunc(0.04096 / (100 uA * 0.1 ohm))
const CALIBRATION_WORD: u16 = 4096;

const BUS_LSB_MV: f32 = 4.0;
const CURRENT_LSB_MA: f32 = 0.1;

/// Both rail monitors plus the charger's open-drain status pins.
pub struct PowerMonitor {
    bus: I2c<'static, I2C0, Blocking>,
    charging: Input<'static>,
    power_good: Input<'static>,
}

impl PowerMonitor {
    /// Configures and calibrates both devices.
    pub fn new(
        bus: I2c<'static, I2C0, Blocking>,
        charging: Input<'static>,
        power_good: Input<'static>,
    ) -> Result<Self, i2c::Error> {
        let mut monitor = Self {
            bus,
            charging,
            power_good,
        };
        for addr in [SOLAR_ADDR, BATTERY_ADDR] {
            monitor.write_register(addr, REG_CONFIG, CONFIG_WORD)?;
            monitor.write_register(addr, REG_CALIBRATION, CALIBRATION_WORD)?;
        }
        Ok(monitor)
    }

    fn write_register(&mut self, addr: u16, reg: u8, value: u16) -> Result<(), i2c::Error> {
        let [hi, lo] = value.to_be_bytes();
        self.bus.blocking_write(addr, &[reg, hi, lo])
    }

    fn read_register(&mut self, addr: u16, reg: u8) -> Result<u16, i2c::Error> {
        let mut raw = [0u8; 2];
        self.bus.blocking_write_read(addr, &[reg], &mut raw)?;
        Ok(u16::from_be_bytes(raw))
    }

    fn read_rail(&mut self, addr: u16) -> Result<RailSample, i2c::Error> {
        let bus_raw = self.read_register(addr, REG_BUS_VOLTAGE)?;
        // Bits 2:0 are status flags; the voltage lives in 15:3.
        let voltage_mv = f32::from(bus_raw >> 3) * BUS_LSB_MV;

        #[allow(clippy::cast_possible_wrap)]
        let current_raw = self.read_register(addr, REG_CURRENT)? as i16;
        let current_ma = f32::from(current_raw) * CURRENT_LSB_MA;

        Ok(RailSample {
            voltage_mv,
            current_ma,
        })
    }

    /// Reads both rails back to back.
    pub fn sample(&mut self) -> Result<PowerSample, i2c::Error> {
        Ok(PowerSample {
            solar: self.read_rail(SOLAR_ADDR)?,
            battery: self.read_rail(BATTERY_ADDR)?,
        })
    }

    /// Instantaneous charger state; both pins are active low.
    #[must_use]
    pub fn flags(&self) -> PowerFlags {
        PowerFlags {
            is_charging: self.charging.is_low(),
            power_good: self.power_good.is_low(),
        }
    }
}
