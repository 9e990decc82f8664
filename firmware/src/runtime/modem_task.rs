use embassy_futures::select::{Either, select};
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embassy_time::Timer;
use embedded_io_async::{Read, Write};
use heapless::Vec;
use node_core::flags::ReadySetter;
use node_core::line::LineReceiver;
use node_core::modem::{MAX_PAYLOAD, ModemEvent, ModemLink};
use node_core::sequencer::LinkTransport;

use super::MODEM_RX_GATE;
use crate::hw::rtc::RtcHandle;
use crate::link::{PublishReceiver, PublishRequest};
use crate::status;

/// AT responses are short; URCs and echoes fit comfortably.
const MODEM_LINE_CAP: usize = 128;

/// Payload plus the longest command and both terminators.
const FRAME_CAP: usize = MAX_PAYLOAD + 64;

/// Collects everything the link rules emit for one received line, so the
/// pure state machine never blocks on the UART.
struct TxFrame {
    bytes: Vec<u8, FRAME_CAP>,
}

impl TxFrame {
    const fn new() -> Self {
        Self { bytes: Vec::new() }
    }
}

impl LinkTransport for TxFrame {
    fn send(&mut self, bytes: &[u8]) {
        if self.bytes.extend_from_slice(bytes).is_err() {
            defmt::warn!("modem: tx frame overflow, dropping {=usize} bytes", bytes.len());
        }
    }
}

#[embassy_executor::task]
pub async fn run(
    mut rx: BufferedUartRx,
    mut tx: BufferedUartTx,
    requests: PublishReceiver<'static>,
    ready: ReadySetter<'static>,
    mut rtc: RtcHandle,
) -> ! {
    let mut modem = ModemLink::new();
    let mut receiver = LineReceiver::<MODEM_LINE_CAP>::new();
    let mut frame = TxFrame::new();

    modem.probe(&mut frame);
    flush(&mut tx, &mut frame).await;

    let mut ingress = [0u8; 64];
    loop {
        while !MODEM_RX_GATE.is_open() {
            Timer::after_millis(50).await;
        }

        // One payload at a time: while an exchange is in flight, leave new
        // requests in the channel so they cannot clobber the stored payload.
        let busy = modem.is_publishing();
        let next_request = async {
            if busy {
                core::future::pending::<PublishRequest>().await
            } else {
                requests.receive().await
            }
        };

        match select(rx.read(&mut ingress), next_request).await {
            Either::First(Ok(count)) if count > 0 => {
                for &byte in &ingress[..count] {
                    let Some(line) = receiver.push(byte) else {
                        continue;
                    };
                    if line.is_truncated() {
                        defmt::warn!("modem: truncated line");
                    }
                    let event = modem.on_line(line.as_str(), &mut frame, &mut rtc);
                    flush(&mut tx, &mut frame).await;
                    let Some(event) = event else {
                        continue;
                    };
                    handle_event(event, &modem);
                    if event == ModemEvent::PublishComplete {
                        // Chain the next queued payload; only an empty
                        // queue releases the cycle loop's rendezvous.
                        if let Ok(request) = requests.try_receive() {
                            start_publish(&mut modem, &request, &mut frame, &ready);
                            flush(&mut tx, &mut frame).await;
                        } else {
                            ready.set_ready();
                        }
                    }
                }
            }
            Either::First(Ok(_)) => {}
            Either::First(Err(_)) => {
                defmt::warn!("modem: UART read error");
                Timer::after_millis(5).await;
            }
            Either::Second(request) => {
                start_publish(&mut modem, &request, &mut frame, &ready);
                flush(&mut tx, &mut frame).await;
            }
        }
    }
}

fn start_publish(
    modem: &mut ModemLink,
    request: &PublishRequest,
    frame: &mut TxFrame,
    ready: &ReadySetter<'static>,
) {
    if modem.publish(&request.payload, frame).is_err() {
        // Too large for the link; drop it rather than wedge the cycle
        // loop's rendezvous.
        defmt::warn!("modem: rejected publish request");
        ready.set_ready();
    }
}

fn handle_event(event: ModemEvent, modem: &ModemLink) {
    match event {
        ModemEvent::Registered => defmt::info!("modem: registered"),
        ModemEvent::PayloadSent => defmt::debug!("modem: payload sent"),
        ModemEvent::PublishComplete => {
            status::record_publish();
            defmt::info!("modem: publish complete");
        }
        ModemEvent::Resequenced => {
            status::record_resequence();
            defmt::warn!(
                "modem: error response, resequencing ({=u32} since boot)",
                modem.resequence_count()
            );
        }
    }
}

async fn flush(tx: &mut BufferedUartTx, frame: &mut TxFrame) {
    let data = frame.bytes.as_slice();
    let mut written = 0usize;

    while written < data.len() {
        match tx.write(&data[written..]).await {
            Ok(count) if count > 0 => written += count,
            Ok(_) => {}
            Err(_) => {
                defmt::warn!("modem: UART write error");
                Timer::after_millis(5).await;
                break;
            }
        }
    }

    if tx.flush().await.is_err() {
        defmt::warn!("modem: UART flush error");
    }
    frame.bytes.clear();
}
