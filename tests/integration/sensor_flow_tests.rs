//! Timer ISR → pending bits → sensor poller → I2C ISR → dispatcher, with
//! the real drivers on simulated peripherals.

use meshnode::adapters::sim_counter::SimCounter;
use meshnode::adapters::sim_i2c::{BusOp, SimMcp9808, SimSleep};
use meshnode::app::event_loop::EventLoop;
use meshnode::app::events::StackEvent;
use meshnode::app::ports::{DisplayRow, GenericRequest, model_id};
use meshnode::app::role::{FriendServerRole, LowPowerClientRole, RoleStrategy};
use meshnode::config::NodeConfig;
use meshnode::drivers::hw_timer::LeTimer;
use meshnode::drivers::i2c::{I2cDriver, Phase};
use meshnode::error::TransferError;
use meshnode::events::{PendingEvents, StackEventQueue};

use crate::mock_ports::{MockPorts, StackCall};

type Bus<'a> = I2cDriver<'a, SimMcp9808, SimSleep>;

/// Step the counter until the timer interrupts once.
fn run_to_timer_irq(timer: &mut LeTimer<'_, SimCounter>) {
    loop {
        let irq = timer.counter_mut().step();
        if irq.compare0 || irq.underflow {
            timer.on_interrupt(irq);
            return;
        }
    }
}

fn service_i2c(i2c: &mut Bus<'_>) {
    while i2c.bus().irq_pending() {
        i2c.on_interrupt();
    }
}

/// Poll the loop until the stack queue is empty and the bus is idle.
fn settle<R: RoleStrategy>(el: &mut EventLoop<'_, R>, i2c: &mut Bus<'_>, m: &mut MockPorts) {
    for _ in 0..32 {
        service_i2c(i2c);
        let handled = el.poll_once(i2c, &mut m.ports());
        if !handled && !i2c.bus().irq_pending() && i2c.phase() == Phase::Idle {
            return;
        }
    }
    panic!("loop did not settle");
}

#[test]
fn periodic_tick_produces_displayed_temperature() {
    let pending = PendingEvents::new();
    let queue = StackEventQueue::new();
    let config = NodeConfig::default();
    let mut timer = LeTimer::new(SimCounter::new(), config.clock, &pending, &queue);
    assert!(timer.start_periodic_tick(config.sensor_period_ms));
    let mut i2c = I2cDriver::new(SimMcp9808::new(0x18, 0x0190), SimSleep::default(), &pending, &queue);
    let mut el = EventLoop::new(config.clone(), FriendServerRole::new(&config), &pending, &queue);
    let mut m = MockPorts::new();

    run_to_timer_irq(&mut timer);
    assert!(!queue.is_empty(), "timer ISR must wake the loop");

    el.poll_once(&mut i2c, &mut m.ports());
    assert_eq!(i2c.phase(), Phase::Writing);

    settle(&mut el, &mut i2c, &mut m);

    assert_eq!(
        i2c.bus().ops(),
        &[
            BusOp::Write {
                address: 0x18,
                register: 0x05
            },
            BusOp::Read { address: 0x18 },
        ]
    );
    assert_eq!(m.display.row(DisplayRow::Temperature), "Temp: 25.00 C");
    assert_eq!(el.sensor().cycles_completed, 1);
    assert_eq!(el.sensor().last_temperature_c, Some(25.0));
    assert_eq!(i2c.sleep().blocked(), None);
    assert_eq!(pending.raised_bits(), 0);
}

#[test]
fn every_period_reads_once() {
    let pending = PendingEvents::new();
    let queue = StackEventQueue::new();
    let config = NodeConfig::default();
    let mut timer = LeTimer::new(SimCounter::new(), config.clock, &pending, &queue);
    assert!(timer.start_periodic_tick(config.sensor_period_ms));
    let mut i2c = I2cDriver::new(SimMcp9808::new(0x18, 0x0190), SimSleep::default(), &pending, &queue);
    let mut el = EventLoop::new(config.clone(), FriendServerRole::new(&config), &pending, &queue);
    let mut m = MockPorts::new();

    for period in 1..=3u32 {
        i2c.bus_mut().set_raw(0x0190 + period as u16 * 16);
        run_to_timer_irq(&mut timer);
        settle(&mut el, &mut i2c, &mut m);
        assert_eq!(el.sensor().cycles_completed, period);
    }
    assert_eq!(timer.periods(), 3);
    assert_eq!(timer.timestamp_ms(), 3000);
    assert_eq!(i2c.bus().reads_started(), 3);
    assert_eq!(m.display.row(DisplayRow::Temperature), "Temp: 28.00 C");
}

#[test]
fn nack_abandons_and_next_tick_starts_fresh() {
    let pending = PendingEvents::new();
    let queue = StackEventQueue::new();
    let config = NodeConfig::default();
    let mut timer = LeTimer::new(SimCounter::new(), config.clock, &pending, &queue);
    assert!(timer.start_periodic_tick(config.sensor_period_ms));
    let mut i2c = I2cDriver::new(SimMcp9808::new(0x18, 0x0190), SimSleep::default(), &pending, &queue);
    let mut el = EventLoop::new(config.clone(), FriendServerRole::new(&config), &pending, &queue);
    let mut m = MockPorts::new();

    i2c.bus_mut().fail_next(TransferError::Nack);
    run_to_timer_irq(&mut timer);
    settle(&mut el, &mut i2c, &mut m);

    assert_eq!(i2c.last_error(), Some(TransferError::Nack));
    assert_eq!(i2c.bus().reads_started(), 0);
    assert_eq!(el.sensor().cycles_completed, 0);
    assert_eq!(m.display.row(DisplayRow::Temperature), "");

    run_to_timer_irq(&mut timer);
    settle(&mut el, &mut i2c, &mut m);
    assert_eq!(el.sensor().cycles_completed, 1);
    assert_eq!(i2c.last_error(), None);
}

#[test]
fn tick_during_transfer_is_refused_not_interleaved() {
    let pending = PendingEvents::new();
    let queue = StackEventQueue::new();
    let config = NodeConfig::default();
    let mut timer = LeTimer::new(SimCounter::new(), config.clock, &pending, &queue);
    assert!(timer.start_periodic_tick(config.sensor_period_ms));
    let mut i2c = I2cDriver::new(SimMcp9808::new(0x18, 0x0190), SimSleep::default(), &pending, &queue);
    let mut el = EventLoop::new(config.clone(), FriendServerRole::new(&config), &pending, &queue);
    let mut m = MockPorts::new();

    run_to_timer_irq(&mut timer);
    el.poll_once(&mut i2c, &mut m.ports());
    assert_eq!(i2c.phase(), Phase::Writing);

    // A second tick lands before the write finishes.
    run_to_timer_irq(&mut timer);
    el.poll_once(&mut i2c, &mut m.ports());
    assert_eq!(el.sensor().start_failures, 1);
    assert_eq!(i2c.bus().ops().len(), 1);

    settle(&mut el, &mut i2c, &mut m);
    assert_eq!(el.sensor().cycles_completed, 1);
}

#[test]
fn stalled_loop_holds_one_wake_signal() {
    let pending = PendingEvents::new();
    let queue = StackEventQueue::new();
    let config = NodeConfig::default();
    let mut timer = LeTimer::new(SimCounter::new(), config.clock, &pending, &queue);
    assert!(timer.start_periodic_tick(config.sensor_period_ms));
    let mut i2c = I2cDriver::new(SimMcp9808::new(0x18, 0x0190), SimSleep::default(), &pending, &queue);
    let mut el = EventLoop::new(config.clone(), FriendServerRole::new(&config), &pending, &queue);
    let mut m = MockPorts::new();

    // Twenty periods pass while the loop is busy elsewhere.
    for _ in 0..20 {
        run_to_timer_irq(&mut timer);
    }
    assert_eq!(queue.len(), 1);
    assert!(queue.post(StackEvent::SystemBoot));

    settle(&mut el, &mut i2c, &mut m);
    assert_eq!(m.stack.count(&StackCall::NodeInit), 1);
    assert_eq!(el.sensor().cycles_completed, 1);
    assert!(!pending.wake_posted());
}

#[test]
fn client_publishes_each_reading() {
    let pending = PendingEvents::new();
    let queue = StackEventQueue::new();
    let config = NodeConfig::low_power_client();
    let mut timer = LeTimer::new(SimCounter::new(), config.clock, &pending, &queue);
    assert!(timer.start_periodic_tick(config.sensor_period_ms));
    let mut i2c = I2cDriver::new(SimMcp9808::new(0x18, 0x0194), SimSleep::default(), &pending, &queue);
    let mut el = EventLoop::new(config.clone(), LowPowerClientRole::new(&config), &pending, &queue);
    let mut m = MockPorts::new();

    queue.post(StackEvent::SystemBoot);
    queue.post(StackEvent::NodeInitialized {
        provisioned: true,
        address: 0x0002,
        iv_index: 0,
    });
    settle(&mut el, &mut i2c, &mut m);
    assert!(el.dispatcher().provisioned());

    run_to_timer_irq(&mut timer);
    settle(&mut el, &mut i2c, &mut m);

    assert_eq!(
        m.models.publications(),
        vec![(model_id::GENERIC_LEVEL_CLIENT, 0, GenericRequest::Level(2525))]
    );
}

#[test]
fn run_once_dispatches_a_queued_event() {
    let pending = PendingEvents::new();
    let queue = StackEventQueue::new();
    let config = NodeConfig::default();
    let mut i2c = I2cDriver::new(SimMcp9808::new(0x18, 0x0190), SimSleep::default(), &pending, &queue);
    let mut el = EventLoop::new(config.clone(), FriendServerRole::new(&config), &pending, &queue);
    let mut m = MockPorts::new();

    queue.post(StackEvent::SystemBoot);
    el.run_once(&mut i2c, &mut m.ports());

    assert_eq!(m.stack.count(&StackCall::NodeInit), 1);
    assert_eq!(el.iterations(), 1);
    assert!(queue.is_empty());
}
