//! GPS fix assembly from NMEA sentences.
//!
//! A fix record pairs one valid `$GPRMC` sentence with the `$GPGGA` that
//! follows it. The assembler also runs the one-shot acquisition budget: the
//! receiver is powered only while an acquisition is armed, and gives up
//! after a fixed number of position sentences without a completed record.

use heapless::String;
use winnow::token::{literal, take_till};
use winnow::{ModalResult, Parser};

/// Sentence carrying position and fix status.
pub const POSITION_PREFIX: &str = "$GPRMC";

/// Sentence carrying fix quality, appended to complete a record.
pub const QUALITY_PREFIX: &str = "$GPGGA";

/// Position sentences observed before a one-shot acquisition gives up.
/// The receiver emits one per second, so this is roughly a minute.
pub const ONE_SHOT_BUDGET: u16 = 60;

/// Room for two NMEA sentences (82 bytes each at most) plus separator.
pub const MAX_FIX: usize = 192;

/// Switches the receiver's power rail.
pub trait ReceiverPower {
    fn power_on(&mut self);
    fn power_off(&mut self);
}

/// [`ReceiverPower`] that drives nothing, for hosts and tests.
#[derive(Debug, Default)]
pub struct NoopReceiverPower;

impl ReceiverPower for NoopReceiverPower {
    fn power_on(&mut self) {}
    fn power_off(&mut self) {}
}

/// Terminal result of a one-shot acquisition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FixOutcome {
    /// A complete record was assembled; fetch it with
    /// [`FixAssembler::take_fix`].
    Ready,
    /// The sentence budget ran out without a valid fix.
    TimedOut,
}

fn field<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_till(0.., |c| c == ',').parse_next(input)
}

fn rmc_status<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    let _ = literal(POSITION_PREFIX).parse_next(input)?;
    let _ = ','.parse_next(input)?;
    let _ = field(input)?;
    let _ = ','.parse_next(input)?;
    field(input)
}

/// `true` when a position sentence reports an active fix (status `A`).
fn fix_valid(line: &str) -> bool {
    let mut input = line;
    matches!(rmc_status.parse_next(&mut input), Ok("A"))
}

/// Builds fix records from a stream of NMEA lines.
#[derive(Debug, Default)]
pub struct FixAssembler {
    record: String<MAX_FIX>,
    valid: bool,
    ready: bool,
    one_shot: Option<u16>,
}

impl FixAssembler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            record: String::new(),
            valid: false,
            ready: false,
            one_shot: None,
        }
    }

    /// Powers the receiver and arms a one-shot acquisition with a budget of
    /// [`ONE_SHOT_BUDGET`] position sentences.
    pub fn acquire_once(&mut self, power: &mut impl ReceiverPower) {
        self.one_shot = Some(ONE_SHOT_BUDGET);
        self.ready = false;
        self.valid = false;
        self.record.clear();
        power.power_on();
    }

    /// Cancels an armed acquisition and powers the receiver down.
    pub fn abort(&mut self, power: &mut impl ReceiverPower) {
        if self.one_shot.take().is_some() {
            power.power_off();
        }
    }

    /// `true` while an acquisition is armed.
    #[must_use]
    pub const fn is_acquiring(&self) -> bool {
        self.one_shot.is_some()
    }

    /// `true` when a completed record is waiting to be taken.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// The assembled record, without clearing readiness.
    #[must_use]
    pub fn fix(&self) -> Option<&str> {
        self.ready.then_some(self.record.as_str())
    }

    /// Returns the assembled record and clears readiness.
    pub fn take_fix(&mut self) -> Option<String<MAX_FIX>> {
        if !self.ready {
            return None;
        }
        self.ready = false;
        self.valid = false;
        Some(core::mem::take(&mut self.record))
    }

    /// Feeds one NMEA line.
    ///
    /// Position sentences restart the record (or clear it when the status
    /// field is not `A`) and charge the one-shot budget; a quality sentence
    /// completes the record only when a valid position precedes it. Other
    /// sentence types pass through untouched.
    pub fn on_line(&mut self, line: &str, power: &mut impl ReceiverPower) -> Option<FixOutcome> {
        if line.starts_with(POSITION_PREFIX) {
            if let Some(remaining) = self.one_shot.as_mut() {
                *remaining -= 1;
                if *remaining == 0 {
                    self.one_shot = None;
                    power.power_off();
                    return Some(FixOutcome::TimedOut);
                }
            }
            if !fix_valid(line) {
                self.record.clear();
                self.valid = false;
                return None;
            }
            self.record.clear();
            let _ = self.record.push_str(line);
            let _ = self.record.push('\n');
            self.valid = true;
            self.ready = false;
            return None;
        }

        if self.valid && line.starts_with(QUALITY_PREFIX) {
            let _ = self.record.push_str(line);
            self.valid = false;
            self.ready = true;
            if self.one_shot.take().is_some() {
                power.power_off();
                return Some(FixOutcome::Ready);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RMC_VALID: &str = "$GPRMC,105445.00,A,5231.21,N,01323.52,E,0.04,77.52,250524,,,A*57";
    const RMC_VOID: &str = "$GPRMC,105445.00,V,,,,,,,250524,,,N*7E";
    const GGA: &str = "$GPGGA,105445.00,5231.21,N,01323.52,E,1,08,1.01,44.4,M,45.5,M,,*47";

    #[test]
    fn record_is_rmc_newline_gga() {
        let mut assembler = FixAssembler::new();
        let mut power = NoopReceiverPower;

        assert!(assembler.on_line(RMC_VALID, &mut power).is_none());
        assert!(!assembler.is_ready());
        assert!(assembler.on_line(GGA, &mut power).is_none());
        assert!(assembler.is_ready());

        let record = assembler.take_fix().unwrap();
        let (rmc, gga) = record.split_once('\n').unwrap();
        assert_eq!(rmc, RMC_VALID);
        assert_eq!(gga, GGA);

        // Taking the fix clears readiness.
        assert!(assembler.take_fix().is_none());
    }

    #[test]
    fn void_status_never_readies() {
        let mut assembler = FixAssembler::new();
        let mut power = NoopReceiverPower;

        assembler.on_line(RMC_VOID, &mut power);
        assembler.on_line(GGA, &mut power);
        assert!(!assembler.is_ready());
        assert!(assembler.fix().is_none());
    }

    #[test]
    fn void_status_discards_previous_valid_position() {
        let mut assembler = FixAssembler::new();
        let mut power = NoopReceiverPower;

        assembler.on_line(RMC_VALID, &mut power);
        assembler.on_line(RMC_VOID, &mut power);
        assembler.on_line(GGA, &mut power);
        assert!(!assembler.is_ready());
    }

    #[test]
    fn quality_without_position_is_ignored() {
        let mut assembler = FixAssembler::new();
        let mut power = NoopReceiverPower;

        assert!(assembler.on_line(GGA, &mut power).is_none());
        assert!(!assembler.is_ready());
    }

    #[test]
    fn unrelated_sentences_pass_through() {
        let mut assembler = FixAssembler::new();
        let mut power = NoopReceiverPower;

        assembler.on_line(RMC_VALID, &mut power);
        assembler.on_line("$GPGSV,3,1,11,03,03,111,00*74", &mut power);
        assembler.on_line(GGA, &mut power);
        assert!(assembler.is_ready());
    }

    struct PowerLog {
        on: u32,
        off: u32,
    }

    impl ReceiverPower for PowerLog {
        fn power_on(&mut self) {
            self.on += 1;
        }
        fn power_off(&mut self) {
            self.off += 1;
        }
    }

    #[test]
    fn one_shot_times_out_exactly_once() {
        let mut assembler = FixAssembler::new();
        let mut power = PowerLog { on: 0, off: 0 };

        assembler.acquire_once(&mut power);
        assert_eq!(power.on, 1);
        assert!(assembler.is_acquiring());

        for _ in 0..usize::from(ONE_SHOT_BUDGET) - 1 {
            assert_eq!(assembler.on_line(RMC_VOID, &mut power), None);
        }
        assert_eq!(
            assembler.on_line(RMC_VOID, &mut power),
            Some(FixOutcome::TimedOut)
        );
        assert_eq!(power.off, 1);
        assert!(!assembler.is_acquiring());

        // Budget disarmed: further sentences are plain assembly again.
        assert_eq!(assembler.on_line(RMC_VOID, &mut power), None);
        assert_eq!(power.off, 1);
    }

    #[test]
    fn truncated_position_sentence_still_charges_the_budget() {
        use crate::line::LineReceiver;

        // Overflow a tight receiver to get a genuinely truncated line.
        let mut receiver = LineReceiver::<24>::new();
        let mut line = None;
        for &byte in RMC_VOID.as_bytes() {
            line = receiver.push(byte);
        }
        let line = line.or_else(|| receiver.push(b'\n')).unwrap();
        assert!(line.is_truncated());

        let mut assembler = FixAssembler::new();
        let mut power = PowerLog { on: 0, off: 0 };
        assembler.acquire_once(&mut power);

        // Prefix matching still applies to what survived the cut.
        assert_eq!(assembler.on_line(line.as_str(), &mut power), None);
        for _ in 0..usize::from(ONE_SHOT_BUDGET) - 2 {
            assert_eq!(assembler.on_line(RMC_VOID, &mut power), None);
        }
        assert_eq!(
            assembler.on_line(RMC_VOID, &mut power),
            Some(FixOutcome::TimedOut)
        );
    }

    #[test]
    fn one_shot_fix_powers_down_and_reports_ready() {
        let mut assembler = FixAssembler::new();
        let mut power = PowerLog { on: 0, off: 0 };

        assembler.acquire_once(&mut power);
        assembler.on_line(RMC_VALID, &mut power);
        assert_eq!(
            assembler.on_line(GGA, &mut power),
            Some(FixOutcome::Ready)
        );
        assert_eq!(power.off, 1);
        assert!(assembler.take_fix().is_some());
    }

    #[test]
    fn abort_powers_down_once() {
        let mut assembler = FixAssembler::new();
        let mut power = PowerLog { on: 0, off: 0 };

        assembler.acquire_once(&mut power);
        assembler.abort(&mut power);
        assembler.abort(&mut power);
        assert_eq!(power.off, 1);
        assert!(!assembler.is_acquiring());
    }
}
