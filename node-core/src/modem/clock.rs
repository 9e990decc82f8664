//! Network clock extraction from the `+CCLK:` response line.

use winnow::combinator::opt;
use winnow::token::take;
use winnow::{ModalResult, Parser};

/// Calendar timestamp reported by the network, two-digit year.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClockStamp {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// The clock line did not carry a `yy/MM/dd,hh:mm:ss` timestamp.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClockParseError;

fn two_digits(input: &mut &str) -> ModalResult<u8> {
    take(2usize).try_map(str::parse::<u8>).parse_next(input)
}

fn stamp(input: &mut &str) -> ModalResult<ClockStamp> {
    let _ = opt('"').parse_next(input)?;
    let year = two_digits(input)?;
    let _ = '/'.parse_next(input)?;
    let month = two_digits(input)?;
    let _ = '/'.parse_next(input)?;
    let day = two_digits(input)?;
    let _ = ','.parse_next(input)?;
    let hour = two_digits(input)?;
    let _ = ':'.parse_next(input)?;
    let minute = two_digits(input)?;
    let _ = ':'.parse_next(input)?;
    let second = two_digits(input)?;
    Ok(ClockStamp {
        year,
        month,
        day,
        hour,
        minute,
        second,
    })
}

/// Parses the timestamp portion of a `+CCLK:` line. The timezone suffix and
/// any trailing text are ignored; the leading quote is optional.
pub fn parse_clock(text: &str) -> Result<ClockStamp, ClockParseError> {
    let mut input = text;
    stamp.parse_next(&mut input).map_err(|_| ClockParseError)
}
