//! PulsePin — serial-commanded timed outputs
//!
//! Reads newline-terminated commands from UART0 and pulses the board's
//! output pins HIGH for a fixed hold time. One cooperative loop drains the
//! UART, handles completed lines, and ticks every channel; nothing in the
//! loop blocks, so held pins expire on time regardless of serial traffic.

#![no_std]
#![no_main]

#[cfg(not(any(feature = "board-xiao", feature = "board-devkit")))]
compile_error!("select a board feature: `xiao` or `devkit`");

use esp_backtrace as _;

esp_bootloader_esp_idf::esp_app_desc!();

use embassy_time::{Duration, Instant, Timer};
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{self, Uart};

use pulsepin::board::{self, NUM_OUTPUTS};
use pulsepin::comm::Controller;
use pulsepin::command::CommandConfig;
use pulsepin::defaults::SERIAL_BAUD;
use pulsepin::output::TimedOutputs;
use pulsepin::protocol::{self, VERSION};

/// Delay between loop iterations; bounds expiry jitter
const POLL_INTERVAL_MS: u64 = 1;

/// Milliseconds since boot, truncated to the controller's `u32` clock.
fn now_ms() -> u32 {
    (Instant::now().as_millis() & 0xFFFF_FFFF) as u32
}

#[esp_rtos::main]
async fn main(_spawner: embassy_executor::Spawner) {
    // On the DevKitC UART0 is the command port; keep log lines off it
    #[cfg(feature = "board-xiao")]
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(size: 32 * 1024);

    // Start the RTOS — requires timer + software interrupt
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    log::info!("PulsePin v{} starting on {}", VERSION, board::BOARD_NAME);

    // ── Outputs ──────────────────────────────────────────────────────

    let cfg = OutputConfig::default();

    #[cfg(feature = "board-xiao")]
    let pins: [(u8, Output<'static>); NUM_OUTPUTS] = [
        (6, Output::new(peripherals.GPIO6, Level::Low, cfg)),
        (5, Output::new(peripherals.GPIO5, Level::Low, cfg)),
        (4, Output::new(peripherals.GPIO4, Level::Low, cfg)),
        (3, Output::new(peripherals.GPIO3, Level::Low, cfg)),
        (2, Output::new(peripherals.GPIO2, Level::Low, cfg)),
    ];

    #[cfg(all(feature = "board-devkit", not(feature = "board-xiao")))]
    let pins: [(u8, Output<'static>); NUM_OUTPUTS] = [
        (5, Output::new(peripherals.GPIO5, Level::Low, cfg)),
        (4, Output::new(peripherals.GPIO4, Level::Low, cfg)),
        (2, Output::new(peripherals.GPIO2, Level::Low, cfg)),
    ];

    let outputs = TimedOutputs::new(pins).expect("Output init failed");
    log::info!("Outputs {:?} initialized LOW", board::OUTPUT_PINS);

    // ── Serial ───────────────────────────────────────────────────────

    let uart_config = uart::Config::default().with_baudrate(SERIAL_BAUD);

    #[cfg(feature = "board-xiao")]
    let mut serial = Uart::new(peripherals.UART0, uart_config)
        .expect("UART init failed")
        .with_rx(peripherals.GPIO44)
        .with_tx(peripherals.GPIO43);

    #[cfg(all(feature = "board-devkit", not(feature = "board-xiao")))]
    let mut serial = Uart::new(peripherals.UART0, uart_config)
        .expect("UART init failed")
        .with_rx(peripherals.GPIO3)
        .with_tx(peripherals.GPIO1);

    log::info!(
        "Serial on GPIO{} (rx) / GPIO{} (tx) at {} baud",
        board::UART_RX_PIN,
        board::UART_TX_PIN,
        SERIAL_BAUD
    );

    let mut controller = Controller::new(outputs, CommandConfig::new());

    if protocol::write_banner(
        &mut serial,
        board::BOARD_NAME,
        controller.outputs().pins(),
        controller.config(),
    )
    .is_err()
    {
        log::warn!("Banner write failed");
    }

    // ── Polling loop ─────────────────────────────────────────────────

    let mut rx_buf = [0u8; 32];

    loop {
        if serial.read_ready() {
            match serial.read(&mut rx_buf) {
                Ok(len) => {
                    if controller.receive(&rx_buf[..len], now_ms(), &mut serial).is_err() {
                        log::warn!("Serial reply write failed");
                    }
                }
                Err(e) => log::warn!("UART read error: {:?}", e),
            }
        }

        if controller.tick(now_ms(), &mut serial).is_err() {
            log::warn!("Serial reply write failed");
        }

        Timer::after(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}
