//! Scripted BC660 session for bench-testing the modem link.
//!
//! The emulator plays the modem side of the wire: it answers each command
//! the link transmits with the responses a live BC660 produces, including
//! the `>` payload prompt and, in the flaky profile, one injected `ERROR`
//! followed by the post-reset registration URC.

use std::collections::VecDeque;

use node_core::modem::{END_OF_DATA, ModemEvent, ModemLink, NoopRtc};
use node_core::sequencer::LinkTransport;

/// Response behavior of the scripted modem.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Profile {
    /// Every exchange succeeds on the first attempt.
    Clean,
    /// The first `AT+QMTOPEN` fails with `ERROR`, exercising the reset and
    /// resequence path before the session succeeds.
    Flaky,
}

impl Profile {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "clean" => Some(Self::Clean),
            "flaky" => Some(Self::Flaky),
            _ => None,
        }
    }
}

/// What the session observed end to end.
pub struct SessionReport {
    /// Wire traffic, one line per entry, prefixed with `>>` (to the modem)
    /// or `<<` (from the modem).
    pub transcript: Vec<String>,
    /// Payload bodies delivered after `>` prompts.
    pub published: Vec<Vec<u8>>,
    /// Resequences the link performed.
    pub resequences: u32,
}

#[derive(Default)]
struct Wire {
    bytes: Vec<u8>,
}

impl LinkTransport for Wire {
    fn send(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}

/// One scripted conversation between the link and the emulated modem.
pub struct Session {
    modem: ModemLink,
    wire: Wire,
    fail_next_open: bool,
    awaiting_payload: bool,
    inbox: VecDeque<String>,
    transcript: Vec<String>,
    published: Vec<Vec<u8>>,
    registered: bool,
    publish_done: bool,
}

impl Session {
    pub fn new(profile: Profile) -> Self {
        Self {
            modem: ModemLink::new(),
            wire: Wire::default(),
            fail_next_open: profile == Profile::Flaky,
            awaiting_payload: false,
            inbox: VecDeque::new(),
            transcript: Vec::new(),
            published: Vec::new(),
            registered: false,
            publish_done: false,
        }
    }

    /// Runs boot, registration, and one publish of `payload` to completion.
    pub fn run(mut self, payload: &[u8]) -> SessionReport {
        self.modem.probe(&mut self.wire);
        self.pump();
        self.deliver("+CEREG: 5");
        self.pump();
        assert!(self.registered, "bring-up did not complete");

        self.modem
            .publish(payload, &mut self.wire)
            .expect("payload within link bounds");
        self.pump();

        if !self.publish_done {
            // The flaky profile rebooted the modem mid-exchange; the next
            // duty cycle re-registers and retries the publish.
            self.deliver("+CEREG: 5");
            self.pump();
            self.modem
                .publish(payload, &mut self.wire)
                .expect("payload within link bounds");
            self.pump();
        }
        assert!(self.publish_done, "publish did not complete");

        SessionReport {
            transcript: self.transcript,
            published: self.published,
            resequences: self.modem.resequence_count(),
        }
    }

    /// Queues a URC the modem emits on its own.
    fn deliver(&mut self, line: &str) {
        self.inbox.push_back(line.to_owned());
    }

    /// Alternates between answering outgoing traffic and feeding queued
    /// responses into the link until the wire goes quiet.
    fn pump(&mut self) {
        loop {
            self.answer_outgoing();
            let Some(line) = self.inbox.pop_front() else {
                break;
            };
            self.transcript.push(format!("<< {line}"));
            let event = self.modem.on_line(&line, &mut self.wire, &mut NoopRtc);
            match event {
                Some(ModemEvent::Registered) => self.registered = true,
                Some(ModemEvent::PublishComplete) => self.publish_done = true,
                Some(ModemEvent::Resequenced) => self.registered = false,
                _ => {}
            }
        }
    }

    /// Consumes wire bytes the link transmitted and queues the scripted
    /// responses.
    fn answer_outgoing(&mut self) {
        let bytes = std::mem::take(&mut self.wire.bytes);
        let mut rest = bytes.as_slice();

        while !rest.is_empty() {
            if self.awaiting_payload {
                let Some(end) = rest.iter().position(|&b| b == END_OF_DATA) else {
                    panic!("payload missing its end-of-data byte");
                };
                let body = rest[..end].to_vec();
                self.transcript
                    .push(format!(">> {}", String::from_utf8_lossy(&body)));
                self.published.push(body);
                self.awaiting_payload = false;
                self.inbox.push_back("+QMTPUB: 0,0,0".to_owned());
                rest = &rest[end + 1..];
                continue;
            }

            let text = String::from_utf8_lossy(rest);
            let Some((command, tail_len)) = text
                .split_once("\r\n")
                .map(|(cmd, tail)| (cmd.to_owned(), tail.len()))
            else {
                panic!("partial command on the wire: {text}");
            };
            rest = &rest[rest.len() - tail_len..];

            self.transcript.push(format!(">> {command}"));
            for response in self.respond(&command) {
                self.inbox.push_back(response);
            }
        }
    }

    /// The scripted modem's response table.
    fn respond(&mut self, command: &str) -> Vec<String> {
        let owned = |lines: &[&str]| lines.iter().map(|&l| l.to_owned()).collect::<Vec<_>>();

        match command {
            "ATI" => owned(&["Quectel", "BC660K-GL", "OK"]),
            "AT+QSCLK=0" | "AT+QIDNSCFG=0,\"8.8.8.8\"" => owned(&["OK"]),
            "AT+CCLK?" => owned(&["+CCLK: \"24/05/17,10:54:45+08\"", "OK"]),
            "AT+CSQ" => owned(&["+CSQ: 21,0", "OK"]),
            "AT+QMTOPEN=0,\"137.135.83.217\",1883" => {
                if self.fail_next_open {
                    self.fail_next_open = false;
                    owned(&["ERROR"])
                } else {
                    owned(&["OK", "+QMTOPEN: 0,0"])
                }
            }
            "AT+QMTCONN=0,\"pollen-bc660\"" => owned(&["OK", "+QMTCONN: 0,0,0"]),
            "AT+QMTPUB=0,0,0,0,\"/pollen\"" => {
                self.awaiting_payload = true;
                owned(&[">"])
            }
            "AT+QMTDISC=0" => owned(&["+QMTDISC: 0,0"]),
            // Reboot acknowledgement; the caller delivers the +CEREG URC
            // once the "modem" is back up.
            "AT+QRST=1" => owned(&["OK"]),
            other => {
                eprintln!("session: unscripted command {other:?}");
                owned(&["ERROR"])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_profile_publishes_once_without_resequencing() {
        let report = Session::new(Profile::Clean).run(b"{\"gps\":\"x\"}");
        assert_eq!(report.resequences, 0);
        assert_eq!(report.published, [b"{\"gps\":\"x\"}".to_vec()]);
    }

    #[test]
    fn flaky_profile_recovers_after_one_reset() {
        let report = Session::new(Profile::Flaky).run(b"{}");
        assert_eq!(report.resequences, 1);
        assert_eq!(report.published, [b"{}".to_vec()]);
        assert!(
            report
                .transcript
                .iter()
                .any(|entry| entry == ">> AT+QRST=1")
        );
    }
}
