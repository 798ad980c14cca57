//! Console task
//!
//! Owns the console UART and all text rendering. Bytes go through the
//! protocol session (which handles PIN gating and the idle lockout);
//! accepted events become requests to the control task, and replies
//! come back as typed snapshots rendered here.

use core::fmt::Write as _;

use defmt::*;
use embassy_rp::uart::BufferedUart;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read, Write};
use heapless::String;

use katabasis_core::config::{Config, Field};
use katabasis_protocol::console::{ConsoleEvent, Echo, Session, HELP};

use crate::channels::{ConsoleReply, ConsoleRequest, CONSOLE_REPLY, CONSOLE_REQ};
use crate::FIRMWARE_VERSION;

/// UART poll period; also the session's idle-tick granularity.
const POLL_MS: u64 = 100;
/// Session idle ticks represented by one poll timeout (10ms ticks).
const POLL_IDLE_TICKS: u16 = (POLL_MS / 10) as u16;

/// Console task - byte pump and renderer.
#[embassy_executor::task]
pub async fn console_task(mut uart: BufferedUart<'static>, initial_pin: u16) {
    info!("Console task started");

    let mut session = Session::new();
    // The gate PIN follows the config; updated when a set goes through
    let mut pin = initial_pin;

    let mut line: String<128> = String::new();
    let _ = write!(line, "Info: Boot v{}\r\n", FIRMWARE_VERSION);
    let _ = uart.write_all(line.as_bytes()).await;

    let mut byte = [0u8; 1];
    loop {
        match with_timeout(Duration::from_millis(POLL_MS), uart.read(&mut byte)).await {
            Ok(Ok(n)) if n > 0 => {
                let step = session.feed(byte[0], pin);
                emit_echo(&mut uart, step.echo).await;
                if let Some(event) = step.event {
                    handle_event(&mut uart, event, &mut pin).await;
                }
            }
            Ok(_) => {
                // Read error or empty read: drop the byte on the floor,
                // the session state is still consistent
            }
            Err(_) => {
                if session.idle(POLL_IDLE_TICKS) {
                    let _ = uart.write_all(b"\r\nIdle Timeout\r\n").await;
                }
            }
        }
    }
}

async fn emit_echo(uart: &mut BufferedUart<'static>, echo: Echo) {
    match echo {
        Echo::None => {}
        Echo::Byte(b) => {
            let _ = uart.write_all(&[b]).await;
        }
        Echo::Text(text) => {
            let _ = uart.write_all(text.as_bytes()).await;
        }
        Echo::Newline => {
            let _ = uart.write_all(b"\r\n").await;
        }
    }
}

async fn handle_event(uart: &mut BufferedUart<'static>, event: ConsoleEvent, pin: &mut u16) {
    let request = match event {
        ConsoleEvent::Authenticated => {
            info!("console unlocked");
            return;
        }
        ConsoleEvent::Help => {
            let _ = uart.write_all(HELP.as_bytes()).await;
            return;
        }
        ConsoleEvent::Get(field) => ConsoleRequest::Get(field),
        ConsoleEvent::Set(field, value) => ConsoleRequest::Set(field, value),
        ConsoleEvent::Status => ConsoleRequest::Status,
        ConsoleEvent::Values => ConsoleRequest::Values,
        ConsoleEvent::Raise => ConsoleRequest::Raise,
        ConsoleEvent::Lower => ConsoleRequest::Lower,
    };

    let expects_reply = request.expects_reply();
    CONSOLE_REQ.send(request).await;
    if !expects_reply {
        return;
    }

    match CONSOLE_REPLY.receive().await {
        ConsoleReply::Value(field, value) => {
            if field == Field::ConsolePin {
                *pin = value;
            }
            let mut line: String<128> = String::new();
            let _ = write!(line, "{} = {}\r\n", field.name(), value);
            let _ = uart.write_all(line.as_bytes()).await;
        }
        ConsoleReply::Status {
            state,
            fault,
            decivolts,
        } => {
            let mut line: String<128> = String::new();
            let _ = write!(line, "State: {}", state.label());
            if fault {
                let _ = line.push_str(" [Fault]");
            }
            let _ = write!(line, " Batt: {}.{}V\r\n", decivolts / 10, decivolts % 10);
            let _ = uart.write_all(line.as_bytes()).await;
        }
        ConsoleReply::Values(config) => {
            print_values(uart, &config).await;
        }
    }
}

async fn print_values(uart: &mut BufferedUart<'static>, config: &Config) {
    for field in Field::ALL {
        // The PIN is write-only from the console
        if field == Field::ConsolePin {
            continue;
        }
        let mut line: String<128> = String::new();
        let _ = write!(line, "{} = {}\r\n", field.name(), config.get(field));
        let _ = uart.write_all(line.as_bytes()).await;
    }
}
