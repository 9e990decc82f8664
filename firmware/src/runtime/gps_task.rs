use embassy_futures::select::{Either, select};
use embassy_rp::gpio::Output;
use embassy_rp::uart::BufferedUartRx;
use embassy_time::Timer;
use embedded_io_async::Read;
use node_core::flags::ReadySetter;
use node_core::gps::{FixAssembler, FixOutcome, ReceiverPower};
use node_core::line::LineReceiver;

use super::GPS_RX_GATE;
use crate::link::{AcquireCommand, AcquireSignal, FixReport, FixSender};
use crate::status;

/// NMEA caps sentences at 82 characters.
const GPS_LINE_CAP: usize = 96;

/// GPS power rail switch.
struct RailPower {
    rail: Output<'static>,
}

impl ReceiverPower for RailPower {
    fn power_on(&mut self) {
        self.rail.set_high();
    }

    fn power_off(&mut self) {
        self.rail.set_low();
    }
}

#[embassy_executor::task]
pub async fn run(
    mut rx: BufferedUartRx,
    rail: Output<'static>,
    commands: &'static AcquireSignal,
    fixes: FixSender<'static>,
    ready: ReadySetter<'static>,
) -> ! {
    let mut assembler = FixAssembler::new();
    let mut receiver = LineReceiver::<GPS_LINE_CAP>::new();
    let mut power = RailPower { rail };

    let mut ingress = [0u8; 64];
    loop {
        while !GPS_RX_GATE.is_open() {
            Timer::after_millis(50).await;
        }

        match select(rx.read(&mut ingress), commands.wait()).await {
            Either::First(Ok(count)) if count > 0 => {
                for &byte in &ingress[..count] {
                    let Some(line) = receiver.push(byte) else {
                        continue;
                    };
                    if line.is_truncated() {
                        defmt::warn!("gps: truncated sentence");
                    }
                    match assembler.on_line(line.as_str(), &mut power) {
                        Some(FixOutcome::Ready) => {
                            status::record_fix();
                            defmt::info!("gps: fix assembled");
                            if let Some(record) = assembler.take_fix() {
                                fixes.send(FixReport::Fix(record)).await;
                            }
                            ready.set_ready();
                        }
                        Some(FixOutcome::TimedOut) => {
                            defmt::warn!("gps: acquisition exhausted its budget");
                            fixes.send(FixReport::TimedOut).await;
                            ready.set_ready();
                        }
                        None => {}
                    }
                }
            }
            Either::First(Ok(_)) => {}
            Either::First(Err(_)) => {
                defmt::warn!("gps: UART read error");
                Timer::after_millis(5).await;
            }
            Either::Second(AcquireCommand::Start) => {
                defmt::info!("gps: one-shot acquisition armed");
                assembler.acquire_once(&mut power);
            }
            Either::Second(AcquireCommand::Abort) => {
                if assembler.is_acquiring() {
                    defmt::warn!("gps: acquisition aborted before sleep");
                    assembler.abort(&mut power);
                    ready.set_ready();
                }
            }
        }
    }
}
