//! BC660 NB-IoT link rules.
//!
//! [`ModemLink`] owns the two command sequencers (network bring-up and MQTT
//! publish) and the line-matching rules around them: error recovery, network
//! clock extraction, registration handling, and the `>` payload prompt.
//! Transmission goes through the caller-supplied [`LinkTransport`], so the
//! same rules run against a UART on target and a scripted session on the
//! host.

pub mod clock;

use heapless::Vec;

pub use clock::{ClockParseError, ClockStamp, parse_clock};

use crate::sequencer::{
    COMMAND_TERMINATOR, CommandEntry, CommandSequencer, LinkTransport, SequencerEvent,
};

/// Largest JSON payload accepted for publication.
pub const MAX_PAYLOAD: usize = 512;

/// Byte closing an MQTT payload after the `>` prompt (SUB/Ctrl-Z).
pub const END_OF_DATA: u8 = 0x1A;

/// Commands taking the modem from cold boot to a registered, clock-synced
/// link. Runs whenever the network reports home registration.
pub const BRING_UP_TABLE: &[CommandEntry] = &[
    CommandEntry::new("AT+QSCLK=0", "OK"),
    CommandEntry::new("AT+QIDNSCFG=0,\"8.8.8.8\"", "OK"),
    CommandEntry::new("AT+CCLK?", "+CCLK:"),
    CommandEntry::new("AT+CSQ", "+CSQ:"),
];

/// MQTT open/connect/publish/disconnect exchange, one payload per run.
pub const PUBLISH_TABLE: &[CommandEntry] = &[
    CommandEntry::new("AT+QMTOPEN=0,\"137.135.83.217\",1883", "+QMTOPEN: 0,0"),
    CommandEntry::new("AT+QMTCONN=0,\"pollen-bc660\"", "+QMTCONN: 0,0"),
    CommandEntry::new("AT+QMTPUB=0,0,0,0,\"/pollen\"", "+QMTPUB: 0,0"),
    CommandEntry::new("AT+QMTDISC=0", "+QMTDISC: 0,0"),
];

const IDENTIFY_COMMAND: &str = "ATI";
const RESET_COMMAND: &str = "AT+QRST=1";
const ERROR_PREFIX: &str = "ERROR";
const CLOCK_PREFIX: &str = "+CCLK: ";
const REGISTERED_PREFIX: &str = "+CEREG: 5";
const PAYLOAD_PROMPT: &str = ">";

/// Sink for network time reported by the modem.
pub trait RtcSync {
    fn sync(&mut self, stamp: ClockStamp);
}

/// [`RtcSync`] that discards updates, for hosts without a clock to set.
#[derive(Debug, Default)]
pub struct NoopRtc;

impl RtcSync for NoopRtc {
    fn sync(&mut self, _stamp: ClockStamp) {}
}

/// State transition surfaced by [`ModemLink::on_line`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModemEvent {
    /// Bring-up finished: registered, DNS configured, clock synced.
    Registered,
    /// The publish exchange finished and the session was closed.
    PublishComplete,
    /// `ERROR` observed; both sequences rewound and a modem reset issued.
    Resequenced,
    /// Payload bytes were written after the `>` prompt.
    PayloadSent,
}

/// The payload handed to [`ModemLink::publish`] was rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PublishError {
    /// Payload exceeds [`MAX_PAYLOAD`] bytes.
    PayloadTooLarge { len: usize },
    /// A publish exchange is already in flight; retry after it completes.
    Busy,
}

/// Line-driven BC660 state machine.
pub struct ModemLink {
    bring_up: CommandSequencer,
    publish: CommandSequencer,
    payload: Vec<u8, MAX_PAYLOAD>,
    payload_pending: bool,
    publishing: bool,
    resequence_count: u32,
}

impl Default for ModemLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ModemLink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bring_up: CommandSequencer::new(BRING_UP_TABLE),
            publish: CommandSequencer::new(PUBLISH_TABLE),
            payload: Vec::new(),
            payload_pending: false,
            publishing: false,
            resequence_count: 0,
        }
    }

    /// `true` once the bring-up table has run to completion.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.bring_up.is_complete()
    }

    /// Times the unconditional `ERROR` recovery has fired since boot.
    #[must_use]
    pub const fn resequence_count(&self) -> u32 {
        self.resequence_count
    }

    /// `true` while a publish exchange is in flight. [`ModemLink::publish`]
    /// refuses new payloads until the exchange completes or an `ERROR`
    /// tears it down.
    #[must_use]
    pub const fn is_publishing(&self) -> bool {
        self.publishing
    }

    /// Sends the identify probe, the first traffic after a hardware reset.
    pub fn probe(&mut self, link: &mut impl LinkTransport) {
        link.send(IDENTIFY_COMMAND.as_bytes());
        link.send(COMMAND_TERMINATOR.as_bytes());
    }

    /// Stores `payload` and starts the publish exchange from its first
    /// command. The payload itself goes out later, when the modem answers
    /// `AT+QMTPUB` with its `>` prompt. One payload at a time: while an
    /// exchange is in flight, further publishes return [`PublishError::Busy`]
    /// rather than clobber the stored payload.
    pub fn publish(
        &mut self,
        payload: &[u8],
        link: &mut impl LinkTransport,
    ) -> Result<(), PublishError> {
        if self.publishing {
            return Err(PublishError::Busy);
        }
        self.payload.clear();
        self.payload
            .extend_from_slice(payload)
            .map_err(|_| PublishError::PayloadTooLarge {
                len: payload.len(),
            })?;
        self.payload_pending = true;
        self.publishing = true;
        self.publish.rewind();
        self.publish.advance(link);
        Ok(())
    }

    /// Applies the link rules to one received line.
    ///
    /// Rule order is load-bearing: error recovery first, then clock
    /// extraction, registration, the two in-flight matches, and finally the
    /// payload prompt. At most one event is reported per line.
    pub fn on_line(
        &mut self,
        line: &str,
        link: &mut impl LinkTransport,
        rtc: &mut impl RtcSync,
    ) -> Option<ModemEvent> {
        if line.starts_with(ERROR_PREFIX) {
            // Unconditional recovery: rewind everything and reboot the
            // modem. A pending payload stays stored so the retried publish
            // run still delivers it.
            self.bring_up.rewind();
            self.publish.rewind();
            self.publishing = false;
            self.resequence_count = self.resequence_count.saturating_add(1);
            link.send(RESET_COMMAND.as_bytes());
            link.send(COMMAND_TERMINATOR.as_bytes());
            return Some(ModemEvent::Resequenced);
        }

        if let Some(rest) = line.strip_prefix(CLOCK_PREFIX) {
            if let Ok(stamp) = parse_clock(rest) {
                rtc.sync(stamp);
            }
            // No return: the same line acknowledges AT+CCLK? below.
        }

        if line.starts_with(REGISTERED_PREFIX) {
            self.bring_up.rewind();
            self.bring_up.advance(link);
            return None;
        }

        if let Some(SequencerEvent::Complete) = self.bring_up.observe(line, link) {
            return Some(ModemEvent::Registered);
        }

        if let Some(SequencerEvent::Complete) = self.publish.observe(line, link) {
            self.publishing = false;
            return Some(ModemEvent::PublishComplete);
        }

        if line == PAYLOAD_PROMPT && self.payload_pending {
            link.send(&self.payload);
            link.send(&[END_OF_DATA]);
            self.payload_pending = false;
            return Some(ModemEvent::PayloadSent);
        }

        None
    }
}
