//! Hardware-independent core of the pollen telemetry node.
//!
//! Everything reactive lives here: serial line assembly, the AT command
//! sequencer and BC660 link rules, GPS fix assembly, power averaging, JSON
//! payload construction, and the duty-cycle policy helpers. The firmware
//! crate binds these to RP2040 peripherals; the emulator drives them against
//! a scripted modem. No I/O happens in this crate, so the whole state space
//! is exercisable from host tests.

#![no_std]

pub mod cycle;
pub mod flags;
pub mod gps;
pub mod line;
pub mod modem;
pub mod payload;
pub mod power;
pub mod sequencer;
