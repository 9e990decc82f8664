//! Low-power wait between duty cycles.
//!
//! The executor parks the core in WFE whenever no task is runnable, so with
//! every task pending on a timer this await is the node's deep-sleep window.
//! Both serial interrupt sources are masked for its duration: modem URCs and
//! GPS sentence chatter would otherwise wake the core on every byte. What
//! arrives while masked sits in (and may fall out of) the UART FIFOs, which
//! is acceptable loss; the rx tasks resynchronize on the next line
//! terminator. Switching to the dormant clock source would cut the floor
//! further but belongs below the HAL seam, not here.

use embassy_rp::interrupt::{self, InterruptExt};
use embassy_time::{Duration, Timer};

pub async fn deep_sleep(interval: Duration) {
    interrupt::UART0_IRQ.disable();
    interrupt::UART1_IRQ.disable();

    Timer::after(interval).await;

    unsafe {
        interrupt::UART0_IRQ.enable();
        interrupt::UART1_IRQ.enable();
    }
}
