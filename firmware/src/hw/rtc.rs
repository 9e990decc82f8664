//! On-chip RTC shared between the modem task (network time sync) and the
//! cycle task (window timestamps).

use core::cell::RefCell;
use core::fmt::Write;

use embassy_rp::peripherals::RTC;
use embassy_rp::rtc::{DateTime, DayOfWeek, Rtc};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use node_core::modem::{ClockStamp, RtcSync};
use node_core::power::{TimeSource, Timestamp};

pub type SharedRtc = Mutex<ThreadModeRawMutex, RefCell<Option<Rtc<'static, RTC>>>>;

/// Places the initialized RTC into its shared slot.
pub fn install(slot: &'static SharedRtc, rtc: Rtc<'static, RTC>) {
    slot.lock(|cell| cell.borrow_mut().replace(rtc));
}

/// Cheap cloneable handle onto the shared RTC.
#[derive(Copy, Clone)]
pub struct RtcHandle {
    slot: &'static SharedRtc,
}

impl RtcHandle {
    #[must_use]
    pub const fn new(slot: &'static SharedRtc) -> Self {
        Self { slot }
    }
}

impl RtcSync for RtcHandle {
    fn sync(&mut self, stamp: ClockStamp) {
        let datetime = DateTime {
            year: 2000 + u16::from(stamp.year),
            month: stamp.month,
            day: stamp.day,
            day_of_week: day_of_week(stamp.year, stamp.month, stamp.day),
            hour: stamp.hour,
            minute: stamp.minute,
            second: stamp.second,
        };
        self.slot.lock(|cell| {
            if let Some(rtc) = cell.borrow_mut().as_mut() {
                if rtc.set_datetime(datetime).is_err() {
                    defmt::warn!("rtc: rejected network time");
                }
            }
        });
    }
}

impl TimeSource for RtcHandle {
    fn timestamp(&mut self) -> Timestamp {
        let mut stamp = Timestamp::new();
        let now = self.slot.lock(|cell| {
            cell.borrow_mut()
                .as_mut()
                .and_then(|rtc| rtc.now().ok())
        });
        if let Some(now) = now {
            let _ = write!(
                stamp,
                "{:02}/{:02}/{:02},{:02}:{:02}:{:02}",
                now.year % 100,
                now.month,
                now.day,
                now.hour,
                now.minute,
                now.second
            );
        }
        stamp
    }
}

/// Sakamoto's method over the two-digit year (2000-based, always a leap
/// century so no correction term is needed).
fn day_of_week(year: u8, month: u8, day: u8) -> DayOfWeek {
    const OFFSETS: [u16; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
    let mut y = u16::from(year) + 2000;
    let m = usize::from(month.clamp(1, 12));
    if m < 3 {
        y -= 1;
    }
    let index = (y + y / 4 - y / 100 + y / 400 + OFFSETS[m - 1] + u16::from(day)) % 7;
    match index {
        0 => DayOfWeek::Sunday,
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        _ => DayOfWeek::Saturday,
    }
}
