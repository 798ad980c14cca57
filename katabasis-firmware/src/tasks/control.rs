//! Control task
//!
//! The single-threaded main loop: wakes on the tick signal, runs one
//! control pass per detected counter change (any number of missed
//! ticks coalesces into one pass), drains console requests, and ends
//! every iteration at the watchdog-service point regardless of branch.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::adc::{Adc, Async, Channel as AdcChannel};
use embassy_rp::gpio::{Level, Output};
use embassy_time::Delay;
use portable_atomic::Ordering;

use katabasis_core::config::ParamStore;
use katabasis_core::control::Controller;
use katabasis_core::input::TriggerDebouncer;
use katabasis_core::state::Trigger;
use katabasis_core::traits::TriggerPort;
use katabasis_drivers::sense;
use katabasis_drivers::winch::Winch;
use katabasis_hal_rp2040::flash::ParamFlash;
use katabasis_hal_rp2040::inputs::TriggerInputs;
use katabasis_hal_rp2040::watchdog::HardwareWatchdog;

use crate::adapters::{ControlVoltageOut, Relay};
use crate::channels::{ConsoleReply, ConsoleRequest, CONSOLE_REPLY, CONSOLE_REQ, TICKS, TICK_SIGNAL};

/// The fully wired winch drive.
pub type GateWinch = Winch<Relay, ControlVoltageOut, Delay, HardwareWatchdog>;

/// Battery sample every 256th pass, not every tick.
const BATTERY_CADENCE_MASK: u32 = 0xff;

/// Control task - the tick-dispatch loop.
#[embassy_executor::task]
pub async fn control_task(
    mut controller: Controller,
    mut store: ParamStore<ParamFlash<'static>>,
    mut winch: GateWinch,
    mut triggers: TriggerInputs<'static>,
    mut adc: Adc<'static, Async>,
    mut vbat: AdcChannel<'static>,
    mut indicator: Output<'static>,
) {
    info!("Control task started");

    let mut debouncer = TriggerDebouncer::new();
    let mut last_seen = TICKS.load(Ordering::Relaxed);
    let mut pass: u32 = 0;

    loop {
        match select(TICK_SIGNAL.wait(), CONSOLE_REQ.receive()).await {
            Either::First(()) => {
                let now = TICKS.load(Ordering::Relaxed);
                if now != last_seen {
                    // One pass per detected change; a stalled loop
                    // catches up with a single pass rather than
                    // replaying missed ticks
                    last_seen = now;
                    pass = pass.wrapping_add(1);

                    let before = controller.state();
                    let edges = debouncer.update(triggers.read());
                    if edges != 0 {
                        debug!("triggers {=u8:x} in {:?}", edges, before);
                    }
                    controller.poll(edges, debouncer.home_seated(), &mut winch);
                    if controller.state() != before {
                        info!(
                            "state {:?} -> {:?} (fault={})",
                            before,
                            controller.state(),
                            controller.fault()
                        );
                    }

                    if pass & BATTERY_CADENCE_MASK == 0 {
                        if let Ok(sample) = adc.read(&mut vbat).await {
                            controller.update_battery(sense::normalize_sample(sample));
                        }
                    }

                    indicator.set_level(if controller.indicator_active() {
                        Level::High
                    } else {
                        Level::Low
                    });
                }
            }
            Either::Second(request) => {
                handle_request(request, &mut controller, &mut store, &mut winch, &debouncer)
                    .await;
            }
        }

        // Every iteration, every branch, ends here
        winch.service_watchdog();
    }
}

async fn handle_request(
    request: ConsoleRequest,
    controller: &mut Controller,
    store: &mut ParamStore<ParamFlash<'static>>,
    winch: &mut GateWinch,
    debouncer: &TriggerDebouncer,
) {
    match request {
        ConsoleRequest::Get(field) => {
            let value = controller.config().get(field);
            CONSOLE_REPLY.send(ConsoleReply::Value(field, value)).await;
        }
        ConsoleRequest::Set(field, value) => {
            controller.set_field(field, value);
            store.save(field, value);
            info!("config {:?} = {}", field, value);
            CONSOLE_REPLY.send(ConsoleReply::Value(field, value)).await;
        }
        ConsoleRequest::Status => {
            CONSOLE_REPLY
                .send(ConsoleReply::Status {
                    state: controller.state(),
                    fault: controller.fault(),
                    decivolts: controller.battery().decivolts(),
                })
                .await;
        }
        ConsoleRequest::Values => {
            CONSOLE_REPLY
                .send(ConsoleReply::Values(*controller.config()))
                .await;
        }
        ConsoleRequest::Raise => {
            info!("console: raise");
            controller.dispatch(Trigger::Up, debouncer.home_seated(), winch);
        }
        ConsoleRequest::Lower => {
            info!("console: lower");
            controller.dispatch(
                Trigger::Down { forced: true },
                debouncer.home_seated(),
                winch,
            );
        }
    }
}
