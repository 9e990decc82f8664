//! Generic AT command sequencer.
//!
//! Walks an ordered table of command/expected-response pairs over a
//! half-duplex link, advancing only when the in-flight entry is
//! acknowledged. The modem link owns two instances: one for network
//! bring-up, one for the MQTT publish exchange.

/// Terminator appended to every transmitted command.
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// Transmit seam for sequenced commands.
///
/// Implementations queue bytes toward the modem; they must not block.
pub trait LinkTransport {
    fn send(&mut self, bytes: &[u8]);
}

/// One step of a command table: the text to send and the response prefix
/// that acknowledges it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandEntry {
    pub command: &'static str,
    pub expect: &'static str,
}

impl CommandEntry {
    #[must_use]
    pub const fn new(command: &'static str, expect: &'static str) -> Self {
        Self { command, expect }
    }
}

/// Progress report from [`CommandSequencer::advance`] and
/// [`CommandSequencer::observe`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequencerEvent {
    /// The entry at `index` was transmitted and is now awaiting its
    /// acknowledgement.
    Sent { index: usize },
    /// Every table entry has been acknowledged. Reported exactly once per
    /// run; a [`CommandSequencer::rewind`] arms it again.
    Complete,
}

/// Drives one command table to completion.
#[derive(Debug)]
pub struct CommandSequencer {
    table: &'static [CommandEntry],
    index: usize,
    in_flight: Option<usize>,
    complete: bool,
}

impl CommandSequencer {
    #[must_use]
    pub const fn new(table: &'static [CommandEntry]) -> Self {
        Self {
            table,
            index: 0,
            in_flight: None,
            complete: false,
        }
    }

    /// `true` once the final entry has been acknowledged.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Index of the command awaiting acknowledgement, if any.
    #[must_use]
    pub const fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    /// Restarts the table from the first entry.
    pub fn rewind(&mut self) {
        self.index = 0;
        self.in_flight = None;
        self.complete = false;
    }

    /// Transmits the entry at the current index, or reports completion when
    /// the table is exhausted. No-op after completion.
    pub fn advance(&mut self, link: &mut impl LinkTransport) -> Option<SequencerEvent> {
        if self.complete {
            return None;
        }
        if self.index >= self.table.len() {
            self.complete = true;
            self.in_flight = None;
            return Some(SequencerEvent::Complete);
        }

        let entry = &self.table[self.index];
        link.send(entry.command.as_bytes());
        link.send(COMMAND_TERMINATOR.as_bytes());
        self.in_flight = Some(self.index);
        Some(SequencerEvent::Sent { index: self.index })
    }

    /// Feeds one received line. When it acknowledges the in-flight command
    /// the index moves past that entry and the next command goes out
    /// immediately; unrelated lines are ignored.
    pub fn observe(&mut self, line: &str, link: &mut impl LinkTransport) -> Option<SequencerEvent> {
        let sent = self.in_flight?;
        if line.starts_with(self.table[sent].expect) {
            self.index = sent + 1;
            self.in_flight = None;
            return self.advance(link);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingLink {
        sent: heapless::Vec<u8, 256>,
    }

    impl RecordingLink {
        fn new() -> Self {
            Self {
                sent: heapless::Vec::new(),
            }
        }

        fn take_text(&mut self) -> heapless::String<256> {
            let mut text = heapless::String::new();
            for &byte in &self.sent {
                text.push(byte as char).unwrap();
            }
            self.sent.clear();
            text
        }
    }

    impl LinkTransport for RecordingLink {
        fn send(&mut self, bytes: &[u8]) {
            self.sent.extend_from_slice(bytes).unwrap();
        }
    }

    const TABLE: &[CommandEntry] = &[
        CommandEntry::new("AT+ONE", "OK"),
        CommandEntry::new("AT+TWO", "+TWO:"),
        CommandEntry::new("AT+THREE", "OK"),
    ];

    #[test]
    fn table_runs_to_completion_exactly_once() {
        let mut sequencer = CommandSequencer::new(TABLE);
        let mut link = RecordingLink::new();

        assert_eq!(
            sequencer.advance(&mut link),
            Some(SequencerEvent::Sent { index: 0 })
        );
        assert_eq!(link.take_text(), "AT+ONE\r\n");

        assert_eq!(
            sequencer.observe("OK", &mut link),
            Some(SequencerEvent::Sent { index: 1 })
        );
        assert_eq!(link.take_text(), "AT+TWO\r\n");

        assert_eq!(
            sequencer.observe("+TWO: 1,2", &mut link),
            Some(SequencerEvent::Sent { index: 2 })
        );
        assert_eq!(link.take_text(), "AT+THREE\r\n");

        assert_eq!(
            sequencer.observe("OK", &mut link),
            Some(SequencerEvent::Complete)
        );
        assert!(sequencer.is_complete());

        // Completion reports once; further traffic changes nothing.
        assert_eq!(sequencer.advance(&mut link), None);
        assert_eq!(sequencer.observe("OK", &mut link), None);
        assert!(link.take_text().is_empty());
    }

    #[test]
    fn unrelated_lines_never_retransmit() {
        let mut sequencer = CommandSequencer::new(TABLE);
        let mut link = RecordingLink::new();

        sequencer.advance(&mut link);
        link.take_text();

        assert_eq!(sequencer.observe("+CEREG: 5", &mut link), None);
        assert_eq!(sequencer.observe("RDY", &mut link), None);
        assert!(link.take_text().is_empty());
        assert_eq!(sequencer.in_flight(), Some(0));
    }

    #[test]
    fn observe_without_in_flight_is_inert() {
        let mut sequencer = CommandSequencer::new(TABLE);
        let mut link = RecordingLink::new();

        assert_eq!(sequencer.observe("OK", &mut link), None);
        assert!(link.take_text().is_empty());
    }

    #[test]
    fn rewind_restarts_from_any_index() {
        let mut sequencer = CommandSequencer::new(TABLE);
        let mut link = RecordingLink::new();

        sequencer.advance(&mut link);
        sequencer.observe("OK", &mut link);
        link.take_text();
        assert_eq!(sequencer.in_flight(), Some(1));

        sequencer.rewind();
        assert_eq!(sequencer.in_flight(), None);
        assert!(!sequencer.is_complete());

        assert_eq!(
            sequencer.advance(&mut link),
            Some(SequencerEvent::Sent { index: 0 })
        );
        assert_eq!(link.take_text(), "AT+ONE\r\n");
    }

    #[test]
    fn empty_table_completes_immediately() {
        let mut sequencer = CommandSequencer::new(&[]);
        let mut link = RecordingLink::new();

        assert_eq!(
            sequencer.advance(&mut link),
            Some(SequencerEvent::Complete)
        );
        assert_eq!(sequencer.advance(&mut link), None);
    }
}
