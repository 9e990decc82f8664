//! RP2040 peripheral bring-up for the telemetry node.
//!
//! Pin assignment (Pico):
//! - UART0 GPIO0/GPIO1: BC660 modem, 115200 baud
//! - UART1 GPIO8/GPIO9: GPS receiver, 9600 baud
//! - GPIO2: modem reset (active low)
//! - GPIO22: GPS power rail
//! - GPIO13/GPIO15: DHT22 data, GPIO14: probe power rail
//! - I2C0 GPIO4/GPIO5: INA219 pair
//! - GPIO10: charger CHG, GPIO11: charger PGOOD (both active low)
//! - GPIO25: onboard LED

pub mod power;
pub mod probes;
pub mod rtc;
pub mod sleep;

use embassy_rp as hal;
use embassy_rp::Peri;
use embassy_rp::gpio::Output;
use embassy_rp::uart::{BufferedUart, BufferedUartRx, BufferedUartTx, Config as UartConfig};
use embassy_time::Timer;
use static_cell::StaticCell;

const MODEM_BAUD: u32 = 115_200;
const GPS_BAUD: u32 = 9_600;

const MODEM_UART_BUFFER_SIZE: usize = 256;
const GPS_UART_BUFFER_SIZE: usize = 256;

hal::bind_interrupts!(pub struct Irqs {
    UART0_IRQ => hal::uart::BufferedInterruptHandler<hal::peripherals::UART0>;
    UART1_IRQ => hal::uart::BufferedInterruptHandler<hal::peripherals::UART1>;
});

static MODEM_TX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();
static MODEM_RX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();
static GPS_TX_BUFFER: StaticCell<[u8; GPS_UART_BUFFER_SIZE]> = StaticCell::new();
static GPS_RX_BUFFER: StaticCell<[u8; GPS_UART_BUFFER_SIZE]> = StaticCell::new();

/// Brings up the modem UART and hands back its halves.
pub fn modem_uart(
    uart: Peri<'static, hal::peripherals::UART0>,
    tx_pin: Peri<'static, hal::peripherals::PIN_0>,
    rx_pin: Peri<'static, hal::peripherals::PIN_1>,
) -> (BufferedUartRx, BufferedUartTx) {
    let mut config = UartConfig::default();
    config.baudrate = MODEM_BAUD;

    let uart = BufferedUart::new(
        uart,
        tx_pin,
        rx_pin,
        Irqs,
        MODEM_TX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]),
        MODEM_RX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]),
        config,
    );
    uart.split()
}

/// Brings up the GPS UART. The transmit half exists only to satisfy the
/// peripheral; the receiver is never written to.
pub fn gps_uart(
    uart: Peri<'static, hal::peripherals::UART1>,
    tx_pin: Peri<'static, hal::peripherals::PIN_8>,
    rx_pin: Peri<'static, hal::peripherals::PIN_9>,
) -> (BufferedUartRx, BufferedUartTx) {
    let mut config = UartConfig::default();
    config.baudrate = GPS_BAUD;

    let uart = BufferedUart::new(
        uart,
        tx_pin,
        rx_pin,
        Irqs,
        GPS_TX_BUFFER.init([0; GPS_UART_BUFFER_SIZE]),
        GPS_RX_BUFFER.init([0; GPS_UART_BUFFER_SIZE]),
        config,
    );
    uart.split()
}

/// Holds the BC660 in reset and releases it, then waits out its boot
/// banner so the first sequenced command lands on a listening modem.
pub async fn modem_reset_pulse(reset: &mut Output<'static>) {
    reset.set_low();
    Timer::after_millis(500).await;
    reset.set_high();
    Timer::after_secs(5).await;
}
