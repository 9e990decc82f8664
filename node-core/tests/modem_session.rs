use node_core::line::LineReceiver;
use node_core::modem::{
    ClockStamp, END_OF_DATA, ModemEvent, ModemLink, NoopRtc, PublishError, RtcSync,
};
use node_core::sequencer::LinkTransport;

/// Captures everything the link writes toward the modem.
#[derive(Default)]
struct Wire {
    sent: Vec<u8>,
}

impl LinkTransport for Wire {
    fn send(&mut self, bytes: &[u8]) {
        self.sent.extend_from_slice(bytes);
    }
}

impl Wire {
    fn take_lines(&mut self) -> Vec<String> {
        let raw = core::mem::take(&mut self.sent);
        String::from_utf8(raw)
            .unwrap()
            .split("\r\n")
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[derive(Default)]
struct CapturedRtc {
    stamps: Vec<ClockStamp>,
}

impl RtcSync for CapturedRtc {
    fn sync(&mut self, stamp: ClockStamp) {
        self.stamps.push(stamp);
    }
}

#[test]
fn registration_runs_bring_up_and_syncs_the_clock() {
    let mut modem = ModemLink::new();
    let mut wire = Wire::default();
    let mut rtc = CapturedRtc::default();

    modem.probe(&mut wire);
    assert_eq!(wire.take_lines(), ["ATI"]);

    assert_eq!(modem.on_line("+CEREG: 5", &mut wire, &mut rtc), None);
    assert_eq!(wire.take_lines(), ["AT+QSCLK=0"]);

    assert_eq!(modem.on_line("OK", &mut wire, &mut rtc), None);
    assert_eq!(wire.take_lines(), ["AT+QIDNSCFG=0,\"8.8.8.8\""]);

    assert_eq!(modem.on_line("OK", &mut wire, &mut rtc), None);
    assert_eq!(wire.take_lines(), ["AT+CCLK?"]);

    assert_eq!(
        modem.on_line("+CCLK: \"24/05/17,10:54:45+08\"", &mut wire, &mut rtc),
        None
    );
    assert_eq!(wire.take_lines(), ["AT+CSQ"]);
    assert_eq!(rtc.stamps.len(), 1);
    assert_eq!(rtc.stamps[0].year, 24);
    assert_eq!(rtc.stamps[0].hour, 10);

    assert_eq!(
        modem.on_line("+CSQ: 21,0", &mut wire, &mut rtc),
        Some(ModemEvent::Registered)
    );
    assert!(modem.is_registered());
    assert!(wire.take_lines().is_empty());
}

#[test]
fn registration_line_rewinds_an_in_flight_bring_up() {
    let mut modem = ModemLink::new();
    let mut wire = Wire::default();

    modem.on_line("+CEREG: 5", &mut wire, &mut NoopRtc);
    modem.on_line("OK", &mut wire, &mut NoopRtc);
    wire.take_lines();

    // The network dropped and re-registered: start over from the top.
    modem.on_line("+CEREG: 5", &mut wire, &mut NoopRtc);
    assert_eq!(wire.take_lines(), ["AT+QSCLK=0"]);
}

fn bring_up(modem: &mut ModemLink, wire: &mut Wire) {
    modem.on_line("+CEREG: 5", wire, &mut NoopRtc);
    modem.on_line("OK", wire, &mut NoopRtc);
    modem.on_line("OK", wire, &mut NoopRtc);
    modem.on_line("+CCLK: \"24/05/17,10:54:45+08\"", wire, &mut NoopRtc);
    let registered = modem.on_line("+CSQ: 21,0", wire, &mut NoopRtc);
    assert_eq!(registered, Some(ModemEvent::Registered));
    wire.take_lines();
}

#[test]
fn publish_walks_the_mqtt_exchange_and_sends_the_payload_once() {
    let mut modem = ModemLink::new();
    let mut wire = Wire::default();
    bring_up(&mut modem, &mut wire);

    let payload = br#"{"gps":"$GPRMC,1\n$GPGGA,2"}"#;
    modem.publish(payload, &mut wire).unwrap();
    assert_eq!(wire.take_lines(), ["AT+QMTOPEN=0,\"137.135.83.217\",1883"]);

    assert_eq!(modem.on_line("+QMTOPEN: 0,0", &mut wire, &mut NoopRtc), None);
    assert_eq!(wire.take_lines(), ["AT+QMTCONN=0,\"pollen-bc660\""]);

    assert_eq!(
        modem.on_line("+QMTCONN: 0,0,0", &mut wire, &mut NoopRtc),
        None
    );
    assert_eq!(wire.take_lines(), ["AT+QMTPUB=0,0,0,0,\"/pollen\""]);

    assert_eq!(
        modem.on_line(">", &mut wire, &mut NoopRtc),
        Some(ModemEvent::PayloadSent)
    );
    let mut expected = payload.to_vec();
    expected.push(END_OF_DATA);
    assert_eq!(wire.sent, expected);
    wire.sent.clear();

    // A second prompt must not resend the payload.
    assert_eq!(modem.on_line(">", &mut wire, &mut NoopRtc), None);
    assert!(wire.sent.is_empty());

    assert_eq!(
        modem.on_line("+QMTPUB: 0,0,0", &mut wire, &mut NoopRtc),
        None
    );
    assert_eq!(wire.take_lines(), ["AT+QMTDISC=0"]);

    assert_eq!(
        modem.on_line("+QMTDISC: 0,0", &mut wire, &mut NoopRtc),
        Some(ModemEvent::PublishComplete)
    );
}

#[test]
fn publish_while_an_exchange_is_in_flight_is_refused() {
    let mut modem = ModemLink::new();
    let mut wire = Wire::default();
    bring_up(&mut modem, &mut wire);

    let telemetry = br#"{"dht22":[]}"#;
    modem.publish(telemetry, &mut wire).unwrap();
    assert!(modem.is_publishing());
    modem.on_line("+QMTOPEN: 0,0", &mut wire, &mut NoopRtc);
    wire.take_lines();

    // A second payload mid-exchange must not clobber the first.
    assert_eq!(
        modem.publish(br#"{"gps":"x"}"#, &mut wire),
        Err(PublishError::Busy)
    );
    assert!(wire.sent.is_empty());

    modem.on_line("+QMTCONN: 0,0,0", &mut wire, &mut NoopRtc);
    wire.take_lines();
    modem.on_line(">", &mut wire, &mut NoopRtc);
    let mut expected = telemetry.to_vec();
    expected.push(END_OF_DATA);
    assert_eq!(wire.sent, expected);
    wire.sent.clear();

    modem.on_line("+QMTPUB: 0,0,0", &mut wire, &mut NoopRtc);
    assert_eq!(
        modem.on_line("+QMTDISC: 0,0", &mut wire, &mut NoopRtc),
        Some(ModemEvent::PublishComplete)
    );
    assert!(!modem.is_publishing());
    wire.take_lines();

    // With the exchange closed the deferred payload goes through.
    modem.publish(br#"{"gps":"x"}"#, &mut wire).unwrap();
    assert_eq!(wire.take_lines(), ["AT+QMTOPEN=0,\"137.135.83.217\",1883"]);
}

#[test]
fn error_mid_publish_resets_and_a_retry_succeeds() {
    let mut modem = ModemLink::new();
    let mut wire = Wire::default();
    bring_up(&mut modem, &mut wire);

    modem.publish(b"{}", &mut wire).unwrap();
    modem.on_line("+QMTOPEN: 0,0", &mut wire, &mut NoopRtc);
    wire.take_lines();

    assert_eq!(
        modem.on_line("ERROR", &mut wire, &mut NoopRtc),
        Some(ModemEvent::Resequenced)
    );
    assert_eq!(wire.take_lines(), ["AT+QRST=1"]);
    assert_eq!(modem.resequence_count(), 1);
    assert!(!modem.is_registered());

    // The modem reboots and re-registers; the next cycle retries.
    bring_up(&mut modem, &mut wire);
    modem.publish(b"{}", &mut wire).unwrap();
    assert_eq!(wire.take_lines(), ["AT+QMTOPEN=0,\"137.135.83.217\",1883"]);
}

#[test]
fn byte_stream_drives_the_link_through_the_line_receiver() {
    let mut modem = ModemLink::new();
    let mut wire = Wire::default();
    let mut receiver = LineReceiver::<128>::new();

    let stream = b"RDY\r\n+CEREG: 5\r\nOK\r\nOK\r\n";
    let mut source = stream.iter().copied();
    let mut events = Vec::new();
    while let Some(line) = receiver.feed(&mut source) {
        events.push(modem.on_line(line.as_str(), &mut wire, &mut NoopRtc));
    }

    assert_eq!(events, [None, None, None, None]);
    assert_eq!(
        wire.take_lines(),
        ["AT+QSCLK=0", "AT+QIDNSCFG=0,\"8.8.8.8\"", "AT+CCLK?"]
    );
}
