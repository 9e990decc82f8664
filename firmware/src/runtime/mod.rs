use core::cell::RefCell;

use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp as hal;
use embassy_rp::gpio::{Flex, Input, Level, Output, Pull};
use embassy_rp::i2c::{Config as I2cConfig, I2c};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use node_core::flags::ReadyFlag;

use crate::hw;
use crate::hw::power::PowerMonitor;
use crate::hw::probes::ClimateProbes;
use crate::hw::rtc::RtcHandle;
use crate::link::{AcquireSignal, FixQueue, PublishQueue, RxGate};

mod cycle_task;
mod gps_task;
mod modem_task;

pub(super) static PUBLISH_QUEUE: PublishQueue = Channel::new();
pub(super) static FIX_QUEUE: FixQueue = Channel::new();
pub(super) static ACQUIRE: AcquireSignal = Signal::new();

/// Raised by the modem task when a publish finishes; lowered by the cycle
/// loop when it queues one.
pub(super) static LINK_READY: ReadyFlag = ReadyFlag::new(true);
/// Raised by the GPS task when an acquisition concludes; lowered by the
/// cycle loop when it starts one.
pub(super) static FIX_READY: ReadyFlag = ReadyFlag::new(true);

pub(super) static MODEM_RX_GATE: RxGate = RxGate::new();
pub(super) static GPS_RX_GATE: RxGate = RxGate::new();

pub(super) static SHARED_RTC: hw::rtc::SharedRtc = Mutex::new(RefCell::new(None));

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = hal::init(hal::config::Config::default());

    defmt::info!("pollen node boot");

    // The modem boots noisy; hold it in reset and let the banner pass
    // before any task starts parsing lines.
    let mut modem_reset = Output::new(p.PIN_2, Level::High);
    hw::modem_reset_pulse(&mut modem_reset).await;

    let (modem_rx, modem_tx) = hw::modem_uart(p.UART0, p.PIN_0, p.PIN_1);
    let (gps_rx, _gps_tx) = hw::gps_uart(p.UART1, p.PIN_8, p.PIN_9);

    hw::rtc::install(&SHARED_RTC, hal::rtc::Rtc::new(p.RTC));

    let i2c = I2c::new_blocking(p.I2C0, p.PIN_5, p.PIN_4, I2cConfig::default());
    let charging = Input::new(p.PIN_10, Pull::Up);
    let power_good = Input::new(p.PIN_11, Pull::Up);
    let monitor =
        PowerMonitor::new(i2c, charging, power_good).expect("INA219 calibration failed");

    let probes = ClimateProbes::new(
        Flex::new(p.PIN_13),
        Flex::new(p.PIN_15),
        Output::new(p.PIN_14, Level::Low),
    );

    let gps_power = Output::new(p.PIN_22, Level::Low);
    let led = Output::new(p.PIN_25, Level::Low);

    spawner
        .spawn(modem_task::run(
            modem_rx,
            modem_tx,
            PUBLISH_QUEUE.receiver(),
            LINK_READY.setter(),
            RtcHandle::new(&SHARED_RTC),
        ))
        .expect("failed to spawn modem task");

    spawner
        .spawn(gps_task::run(
            gps_rx,
            gps_power,
            &ACQUIRE,
            FIX_QUEUE.sender(),
            FIX_READY.setter(),
        ))
        .expect("failed to spawn GPS task");

    spawner
        .spawn(cycle_task::run(
            monitor,
            probes,
            RtcHandle::new(&SHARED_RTC),
            PUBLISH_QUEUE.sender(),
            &ACQUIRE,
            FIX_QUEUE.receiver(),
            LINK_READY.watcher(),
            FIX_READY.watcher(),
            led,
        ))
        .expect("failed to spawn cycle task");

    core::future::pending::<()>().await;
}
