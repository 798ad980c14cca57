//! Katabasis - Feeder Gate Controller Firmware
//!
//! Main firmware binary for the RP2040 retrofit board. Drives a
//! winch-lowered feeder gate between its home switch and two timed
//! positions, runs the randomized feed schedule, and keeps itself
//! honest with a hardware watchdog.
//!
//! Boot order matters: the watchdog starts first, the parameter page
//! loads next, the paired motor drive is verified, and only then does
//! the control loop spawn.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel as AdcChannel, Config as AdcConfig, InterruptHandler as AdcInterruptHandler};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{UART0, UART1};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::uart::{
    BufferedInterruptHandler, Config as UartConfig, InterruptHandler as UartInterruptHandler, Uart,
};
use embassy_time::Delay;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use katabasis_core::config::ParamStore;
use katabasis_core::control::Controller;
use katabasis_drivers::winch::{Winch, WinchConfig};
use katabasis_hal_rp2040::flash::ParamFlash;
use katabasis_hal_rp2040::inputs::TriggerInputs;
use katabasis_hal_rp2040::watchdog::HardwareWatchdog;

mod adapters;
mod channels;
mod sync;
mod tasks;

/// Firmware version, reported on the console at boot.
pub const FIRMWARE_VERSION: u16 = 4;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    UART1_IRQ => UartInterruptHandler<UART1>;
    ADC_IRQ_FIFO => AdcInterruptHandler;
});

// Static cells for console UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Katabasis firmware starting...");

    let p = embassy_rp::init(Default::default());

    // Watchdog first: the rest of boot runs under its deadline
    let mut watchdog = HardwareWatchdog::start(p.WATCHDOG);

    // Parameter page: configuration plus this boot's PRNG seed from
    // the entropy ring
    let mut store = ParamStore::new(ParamFlash::new(p.FLASH));
    let config = store.load();
    let seed = store.take_seed();
    info!(
        "Config loaded: p1={} p2={} feeds/week={}",
        config.p1_timeout, config.p2_timeout, config.feeds_per_week
    );

    // Console UART, 19200 8N1 like the loom's line driver expects
    let mut console_config = UartConfig::default();
    console_config.baudrate = 19_200;
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let console_uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, console_config)
        .into_buffered(Irqs, tx_buf, rx_buf);

    info!("Console UART initialized");

    // Paired drive check, strictly before the control loop. The drive
    // hangs off UART1 behind its own power relay.
    let mut drive_power = Output::new(p.PIN_6, Level::Low);
    let mut drive_config = UartConfig::default();
    drive_config.baudrate = 19_200;
    let mut drive_uart = Uart::new(
        p.UART1,
        p.PIN_4,
        p.PIN_5,
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        drive_config,
    );

    let outcome = sync::run(&mut drive_uart, &mut drive_power, &mut watchdog).await;
    info!("Drive check: {:?}", outcome);
    if outcome == sync::Outcome::ConfigUpdated {
        // Fail safe: never run a control loop against a drive that
        // took new configuration this boot. Hold here unfed until the
        // watchdog resets the board.
        warn!("Drive config updated, holding for watchdog reset");
        loop {
            cortex_m::asm::wfe();
        }
    }

    // Winch relays: direction pair, throttle switch, brake switch
    let forward = adapters::Relay::new(Output::new(p.PIN_2, Level::Low));
    let reverse = adapters::Relay::new(Output::new(p.PIN_3, Level::Low));
    let throttle_sw = adapters::Relay::new(Output::new(p.PIN_7, Level::Low));
    let brake_sw = adapters::Relay::new(Output::new(p.PIN_8, Level::Low));

    // Control voltages: one PWM slice, A = throttle, B = brake, RC
    // filtered on the board
    let mut pwm_config = PwmConfig::default();
    pwm_config.top = 255;
    let (throttle_out, brake_out) =
        Pwm::new_output_ab(p.PWM_SLICE7, p.PIN_14, p.PIN_15, pwm_config).split();
    let throttle = adapters::ControlVoltageOut::new(throttle_out.unwrap());
    let brake = adapters::ControlVoltageOut::new(brake_out.unwrap());

    let winch = Winch::new(
        forward,
        reverse,
        throttle_sw,
        brake_sw,
        throttle,
        brake,
        Delay,
        watchdog,
        WinchConfig::default(),
    );

    info!("Winch outputs initialized");

    // Trigger switches, pulled up, closed = low
    let triggers = TriggerInputs::new(
        Input::new(p.PIN_10, Pull::Up),
        Input::new(p.PIN_11, Pull::Up),
        Input::new(p.PIN_12, Pull::Up),
    );

    // Battery sense divider on ADC0
    let adc = Adc::new(p.ADC, Irqs, AdcConfig::default());
    let vbat = AdcChannel::new_pin(p.PIN_26, Pull::None);

    // Fault/low-battery indicator
    let indicator = Output::new(p.PIN_25, Level::Low);

    let console_pin = config.console_pin;
    let controller = Controller::new(config, seed);

    spawner.spawn(tasks::tick_task()).unwrap();
    spawner
        .spawn(tasks::control_task(
            controller, store, winch, triggers, adc, vbat, indicator,
        ))
        .unwrap();
    spawner
        .spawn(tasks::console_task(console_uart, console_pin))
        .unwrap();

    info!("All tasks spawned, firmware running");

    // Main task idles from here on. It stays alive so the drive power
    // relay pin above keeps its configuration.
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
