//! Cooperative main loop.
//!
//! No scheduler and no threads: interrupts preempt the loop, everything
//! else runs here.  Each iteration:
//!
//! ```text
//!  1. drain      PENDING ──(critical section)──▶ mask
//!  2. sensors    SensorPoller walks S0, S1, S2 over the mask
//!  3. wait       STACK_EVENTS.wait()   ← only suspension point
//!  4. dispatch   MeshDispatcher::handle_event
//! ```
//!
//! ISRs post a wake signal into the stack queue when they raise a bit (at
//! most one outstanding per drain), so step 3 returns promptly and the
//! next iteration services the bit.

use log::debug;

use super::ports::Ports;
use super::role::RoleStrategy;
use super::service::MeshDispatcher;
use crate::config::NodeConfig;
use crate::events::{EventMask, PendingEvents, StackEventQueue};
use crate::fsm::context::SensorContext;
use crate::fsm::{SensorIo, SensorPoller};

pub struct EventLoop<'a, R: RoleStrategy> {
    dispatcher: MeshDispatcher<R>,
    poller: SensorPoller,
    sensor: SensorContext,
    mask: EventMask,
    pending: &'a PendingEvents,
    queue: &'a StackEventQueue,
    iterations: u64,
}

impl<'a, R: RoleStrategy> EventLoop<'a, R> {
    pub fn new(
        config: NodeConfig,
        role: R,
        pending: &'a PendingEvents,
        queue: &'a StackEventQueue,
    ) -> Self {
        let sensor = SensorContext::new(&config);
        Self {
            dispatcher: MeshDispatcher::new(config, role),
            poller: SensorPoller::default(),
            sensor,
            mask: EventMask::empty(),
            pending,
            queue,
            iterations: 0,
        }
    }

    /// Steps 1 and 2: drain the interrupt word and run one sensor pass.
    /// A completed reading is forwarded to the dispatcher and returned.
    pub fn service_sensors(&mut self, io: &mut dyn SensorIo, ports: &mut Ports<'_>) -> Option<f32> {
        let drained = self.pending.drain_into(&mut self.mask);
        if drained != 0 {
            debug!("drained pending bits 0x{:02x}", drained);
        }
        self.poller.run_pass(&mut self.mask, &mut self.sensor, io);
        let reading = self.sensor.take_report();
        if let Some(celsius) = reading {
            self.dispatcher.on_temperature(celsius, ports);
        }
        reading
    }

    /// One full iteration.  Blocks until the stack delivers an event.
    pub fn run_once(&mut self, io: &mut dyn SensorIo, ports: &mut Ports<'_>) {
        self.iterations = self.iterations.wrapping_add(1);
        self.service_sensors(io, ports);
        let event = self.queue.wait();
        self.dispatcher.handle_event(Some(&event), ports);
    }

    /// One iteration without blocking.  Returns `false` when the stack had
    /// nothing queued, in which case the caller would sleep.
    pub fn poll_once(&mut self, io: &mut dyn SensorIo, ports: &mut Ports<'_>) -> bool {
        self.iterations = self.iterations.wrapping_add(1);
        self.service_sensors(io, ports);
        let event = self.queue.try_next();
        self.dispatcher.handle_event(event.as_ref(), ports);
        event.is_some()
    }

    pub fn dispatcher(&self) -> &MeshDispatcher<R> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut MeshDispatcher<R> {
        &mut self.dispatcher
    }

    pub fn sensor(&self) -> &SensorContext {
        &self.sensor
    }

    pub fn poller(&self) -> &SensorPoller {
        &self.poller
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}
