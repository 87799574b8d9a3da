//! Mesh sensor node: host simulation runner.
//!
//! Wires the real event loop, dispatcher, sensor poller and drivers to the
//! simulated adapters and runs a scripted session.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    Simulated adapters                          │
//! │  SimStack  SimModels  SimFlash  LogDisplay  PushButtons<SimPin>│
//! │  SimCounter ─▶ LeTimer        SimMcp9808 ─▶ I2cDriver          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  EventLoop: drain · SensorPoller · wait · dispatch     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `meshnode [server|client] [seconds]`
#![deny(unused_must_use)]

use anyhow::{Context, Result, anyhow, bail};
use log::{LevelFilter, info};

use meshnode::adapters::display::LogDisplay;
use meshnode::adapters::flash::SimFlash;
use meshnode::adapters::log_sink;
use meshnode::adapters::sim_counter::SimCounter;
use meshnode::adapters::sim_gpio::SimPin;
use meshnode::adapters::sim_i2c::{SimMcp9808, SimSleep};
use meshnode::adapters::sim_stack::{SimModels, SimStack, encode_request};
use meshnode::alarm::ALARM_SET;
use meshnode::app::event_loop::EventLoop;
use meshnode::app::events::StackEvent;
use meshnode::app::ports::{Button, GenericRequest, ModelEvent, Ports, model_id};
use meshnode::app::role::{FriendServerRole, LowPowerClientRole, RoleStrategy};
use meshnode::config::{NodeConfig, NodeRole};
use meshnode::drivers::button::PushButtons;
use meshnode::drivers::hw_timer::LeTimer;
use meshnode::drivers::i2c::I2cDriver;
use meshnode::events::{PENDING, STACK_EVENTS};
use meshnode::pins::{BUTTON_A_PIN, BUTTON_B_PIN};

/// 25.0 °C in the MCP9808 ambient register format.
const SIM_AMBIENT_RAW: u16 = 0x0190;

/// Scripted stimulus applied at a simulated time.
#[derive(Debug, Clone, Copy)]
enum Stimulus {
    Press(Button),
    Release(Button),
    RemoteLevel { source: u16, level: i16 },
    /// Nudge the sensor reading by this many sixteenths of a degree.
    Drift(i16),
}

fn script(role: NodeRole) -> &'static [(u64, Stimulus)] {
    match role {
        NodeRole::FriendServer => &[
            (2_500, Stimulus::RemoteLevel { source: 0x0003, level: 37 }),
            (3_500, Stimulus::RemoteLevel { source: 0x0002, level: ALARM_SET }),
            (4_000, Stimulus::Drift(8)),
            (5_000, Stimulus::Press(Button::B)),
            (5_100, Stimulus::Release(Button::B)),
            (6_000, Stimulus::Press(Button::B)),
            (6_100, Stimulus::Release(Button::B)),
            (7_000, Stimulus::Press(Button::A)),
            (7_100, Stimulus::Release(Button::A)),
        ],
        NodeRole::LowPowerClient => &[
            (3_000, Stimulus::Press(Button::A)),
            (3_200, Stimulus::Release(Button::A)),
            (4_000, Stimulus::Drift(-24)),
        ],
    }
}

fn main() -> Result<()> {
    log_sink::init(LevelFilter::Info).map_err(|e| anyhow!("logger init failed: {e}"))?;

    let mut args = std::env::args().skip(1);
    let config = match args.next().as_deref() {
        None | Some("server") => NodeConfig::default(),
        Some("client") => NodeConfig::low_power_client(),
        Some(other) => bail!("unknown role '{other}', expected 'server' or 'client'"),
    };
    let seconds: u64 = match args.next() {
        Some(s) => s.parse().context("duration must be whole seconds")?,
        None => 10,
    };
    config.validate()?;

    info!("meshnode v{} ({:?}, {} s)", env!("CARGO_PKG_VERSION"), config.role, seconds);

    match config.role {
        NodeRole::FriendServer => {
            let role = FriendServerRole::new(&config);
            run(config, role, seconds * 1000)
        }
        NodeRole::LowPowerClient => {
            let role = LowPowerClientRole::new(&config);
            run(config, role, seconds * 1000)
        }
    }
}

fn run<R: RoleStrategy>(config: NodeConfig, role: R, duration_ms: u64) -> Result<()> {
    let pending = &PENDING;
    let queue = &STACK_EVENTS;

    let mut timer = LeTimer::new(SimCounter::new(), config.clock, pending, queue);
    if !timer.start_periodic_tick(config.sensor_period_ms) {
        bail!("sensor period {} ms not representable", config.sensor_period_ms);
    }
    let mut i2c = I2cDriver::new(
        SimMcp9808::new(config.sensor_address, SIM_AMBIENT_RAW),
        SimSleep::default(),
        pending,
        queue,
    );
    let mut stack = SimStack::new(queue, false);
    let mut models = SimModels::new();
    let mut flash = SimFlash::new();
    let mut display = LogDisplay::new();
    let mut buttons = PushButtons::new(SimPin::released(), SimPin::released(), queue);
    let mut raw = SIM_AMBIENT_RAW;

    let mut event_loop = EventLoop::new(config.clone(), role, pending, queue);
    let mut stimuli = script(config.role).iter().peekable();

    queue.post(StackEvent::SystemBoot);

    loop {
        let now = timer.timestamp_ms();
        log_sink::set_uptime_ms(now);

        // I2C ISR
        while i2c.bus().irq_pending() {
            i2c.on_interrupt();
        }

        let handled = {
            let mut ports = Ports {
                stack: &mut stack,
                models: &mut models,
                store: &mut flash,
                display: &mut display,
                buttons: &mut buttons,
            };
            event_loop.poll_once(&mut i2c, &mut ports)
        };

        if let Some(mode) = stack.reset_requested() {
            info!("system reset requested ({:?}), stopping", mode);
            break;
        }
        if handled || i2c.bus().irq_pending() {
            continue;
        }
        if now >= duration_ms {
            break;
        }

        // Idle: the stack would sleep here.  Advance the counter until the
        // next timer interrupt, applying due stimuli on the way.
        while let Some((_, stimulus)) = stimuli.next_if(|(at, _)| *at <= now) {
            apply(*stimulus, &mut buttons, &mut i2c, &mut raw, queue);
        }
        let irq = timer.counter_mut().step();
        if irq.compare0 || irq.underflow {
            timer.on_interrupt(irq);
        }
        stack.advance_to(timer.timestamp_ms());
    }

    let dispatcher = event_loop.dispatcher();
    info!(
        "done: {} iterations, {} temperature reads, provisioned={}, connections={}",
        event_loop.iterations(),
        event_loop.sensor().cycles_completed,
        dispatcher.provisioned(),
        dispatcher.connection().count
    );
    info!("GATT name: {}", stack.device_name());
    for published in models.published() {
        info!("published {:?}", published);
    }
    Ok(())
}

fn apply(
    stimulus: Stimulus,
    buttons: &mut PushButtons<'_, SimPin>,
    i2c: &mut I2cDriver<'_, SimMcp9808, SimSleep>,
    raw: &mut u16,
    queue: &meshnode::events::StackEventQueue,
) {
    info!("stimulus: {:?}", stimulus);
    match stimulus {
        Stimulus::Press(button) | Stimulus::Release(button) => {
            let pin = buttons.pin_mut(button);
            if matches!(stimulus, Stimulus::Press(_)) {
                pin.press();
            } else {
                pin.release();
            }
            let pin_number = match button {
                Button::A => BUTTON_A_PIN,
                Button::B => BUTTON_B_PIN,
            };
            buttons.on_edge(pin_number);
        }
        Stimulus::RemoteLevel { source, level } => {
            queue.post(StackEvent::GenericServerRequest(ModelEvent {
                model_id: model_id::GENERIC_LEVEL_SERVER,
                element_index: 0,
                client_address: source,
                server_address: 0,
                appkey_index: 0,
                payload: encode_request(GenericRequest::Level(level)),
            }));
        }
        Stimulus::Drift(sixteenths) => {
            *raw = raw.wrapping_add_signed(sixteenths) & 0x1FFF;
            i2c.bus_mut().set_raw(*raw);
        }
    }
}
