use embassy_rp::gpio::Output;
use embassy_time::{Duration, Instant, Timer};
use node_core::cycle::{CycleConfig, GpsCadence, POWER_WINDOW, ReadinessWait, WaitStatus};
use node_core::flags::ReadyWatcher;
use node_core::payload::{position_payload, telemetry_payload};
use node_core::power::AveragingWindow;

use super::{GPS_RX_GATE, MODEM_RX_GATE};
use crate::hw::power::PowerMonitor;
use crate::hw::probes::ClimateProbes;
use crate::hw::rtc::RtcHandle;
use crate::hw::sleep;
use crate::link::{AcquireCommand, AcquireSignal, FixReport, FixReceiver, PublishRequest, PublishSender};
use crate::status;

/// Liveness blink cadence while waiting on the readiness flags.
const WAIT_POLL: Duration = Duration::from_millis(250);

#[allow(clippy::too_many_arguments)]
#[embassy_executor::task]
pub async fn run(
    mut monitor: PowerMonitor,
    mut probes: ClimateProbes,
    mut clock: RtcHandle,
    publish: PublishSender<'static>,
    acquire: &'static AcquireSignal,
    fixes: FixReceiver<'static>,
    link_ready: ReadyWatcher<'static>,
    fix_ready: ReadyWatcher<'static>,
    mut led: Output<'static>,
) -> ! {
    let config = CycleConfig::DEFAULT;
    let mut window = AveragingWindow::<POWER_WINDOW>::new();
    let mut cadence = GpsCadence::new(config.gps_period);

    loop {
        let cycle = status::record_cycle();
        led.set_high();
        defmt::info!("cycle {=u32} start", cycle);

        match monitor.sample() {
            Ok(sample) => {
                status::record_power(&sample);
                if let Some(average) = window.accumulate(sample, &mut clock) {
                    defmt::info!("cycle: power window complete");
                    let climate = probes.read().await;
                    match telemetry_payload(&climate, &average, monitor.flags()) {
                        Ok(payload) => {
                            queue_publish(&publish, &link_ready, payload.as_bytes()).await;
                        }
                        Err(_) => defmt::warn!("cycle: telemetry payload overflow"),
                    }
                }
            }
            Err(_) => defmt::warn!("cycle: power sample failed"),
        }

        if cadence.tick() {
            fix_ready.clear();
            acquire.signal(AcquireCommand::Start);
        }

        // Rendezvous with the modem and GPS tasks before sleeping. Late
        // work is abandoned at the deadline; whatever a straggler finishes
        // afterwards waits for the next cycle.
        let wait = ReadinessWait::begin(
            Instant::now(),
            Duration::from_secs(config.ready_timeout_secs),
        );
        loop {
            while let Ok(report) = fixes.try_receive() {
                match report {
                    FixReport::Fix(record) => match position_payload(&record) {
                        Ok(payload) => {
                            queue_publish(&publish, &link_ready, payload.as_bytes()).await;
                        }
                        Err(_) => defmt::warn!("cycle: position payload overflow"),
                    },
                    FixReport::TimedOut => defmt::warn!("cycle: no fix this acquisition"),
                }
            }

            match wait.poll(&link_ready, &fix_ready, Instant::now()) {
                WaitStatus::Ready => break,
                WaitStatus::TimedOut => {
                    defmt::warn!("cycle: readiness timeout, sleeping anyway");
                    acquire.signal(AcquireCommand::Abort);
                    break;
                }
                WaitStatus::Pending => {
                    led.toggle();
                    Timer::after(WAIT_POLL).await;
                }
            }
        }

        led.set_low();
        let snapshot = status::snapshot();
        defmt::info!(
            "cycle {=u32} done: {=u32} publishes, {=u32} fixes, {=u32} resequences, vbat {=i32} mV",
            snapshot.cycles,
            snapshot.publishes,
            snapshot.fixes,
            snapshot.resequences,
            snapshot.battery_mv
        );

        MODEM_RX_GATE.pause();
        GPS_RX_GATE.pause();
        sleep::deep_sleep(Duration::from_secs(config.sleep_interval_secs)).await;
        MODEM_RX_GATE.resume();
        GPS_RX_GATE.resume();
    }
}

async fn queue_publish(
    publish: &PublishSender<'static>,
    link_ready: &ReadyWatcher<'static>,
    bytes: &[u8],
) {
    let Some(request) = PublishRequest::from_bytes(bytes) else {
        defmt::warn!("cycle: payload does not fit a publish request");
        return;
    };
    link_ready.clear();
    publish.send(request).await;
}
