//! Bench harness: drives the shared modem link against a scripted BC660
//! session and prints the wire transcript.
//!
//! Usage: `node-emulator [clean|flaky]` (default: clean).

mod session;

use std::process::ExitCode;

use node_core::payload::{ClimateReading, ClimateSnapshot, telemetry_payload};
use node_core::power::{PowerAverage, PowerFlags, RailSample, Timestamp};

use crate::session::{Profile, Session};

fn sample_payload() -> Vec<u8> {
    let climate = ClimateSnapshot {
        enclosure: ClimateReading {
            temperature_c: 21.5,
            humidity_pct: 40.2,
        },
        outside: ClimateReading {
            temperature_c: 15.0,
            humidity_pct: 60.0,
        },
    };
    let power = PowerAverage {
        solar: RailSample {
            voltage_mv: 5.0,
            current_ma: 120.0,
        },
        battery: RailSample {
            voltage_mv: 4.0,
            current_ma: -30.0,
        },
        sampled_at: Timestamp::new(),
    };
    let flags = PowerFlags {
        is_charging: true,
        power_good: true,
    };
    telemetry_payload(&climate, &power, flags)
        .expect("sample payload fits the link bounds")
        .as_bytes()
        .to_vec()
}

fn main() -> ExitCode {
    let profile = match std::env::args().nth(1).as_deref() {
        None => Profile::Clean,
        Some(name) => match Profile::parse(name) {
            Some(profile) => profile,
            None => {
                eprintln!("unknown profile {name:?}; expected \"clean\" or \"flaky\"");
                return ExitCode::from(2);
            }
        },
    };

    let report = Session::new(profile).run(&sample_payload());

    for entry in &report.transcript {
        println!("{entry}");
    }
    println!(
        "session complete: {} payload(s) delivered, {} resequence(s)",
        report.published.len(),
        report.resequences
    );

    ExitCode::SUCCESS
}
