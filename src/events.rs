//! Interrupt-driven event system.
//!
//! Two channels carry work from the outside world into the main loop:
//!
//! - **Pending-event bits** are raised by the timer and I2C ISRs.  The
//!   interrupt side only ever ORs bits in; the main loop moves them into
//!   its own [`EventMask`] inside a critical section and clears the
//!   interrupt word in the same step.
//! - **Stack events** are delivered one at a time by the vendor mesh stack.
//!   Receiving from [`StackEventQueue`] is the loop's only suspension point;
//!   ISRs post a wake signal into it so a raised bit is serviced promptly.
//!
//! ```text
//! ┌─────────────┐  raise()   ┌──────────────┐ drain_into() ┌────────────┐
//! │ Timer ISR   │───────────▶│ PendingEvents│─────────────▶│ EventMask  │
//! │ I2C ISR     │───────────▶│  (AtomicU8)  │              │ (polled)   │
//! └─────────────┘            └──────────────┘              └────────────┘
//!        │ wake                                                   │
//!        ▼                                                        ▼
//! ┌──────────────┐   wait()   ┌──────────────┐           Sensor poller
//! │StackEventQueue│──────────▶│  Dispatcher  │
//! └──────────────┘            └──────────────┘
//! ```

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::events::StackEvent;

/// Depth of the vendor-stack event queue.
pub const STACK_EVENT_QUEUE_CAP: usize = 16;

/// External-signal code posted by the timer and I2C ISRs purely to wake
/// the main loop.  Kept clear of the button signal codes.
pub const SIGNAL_SENSOR_WAKE: u32 = 1 << 8;

/// Event kinds that travel through the pending-event word.
///
/// Each variant owns one bit; the values match the vendor external-signal
/// flags the sensor node has always used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PendingEvent {
    /// Periodic compare match on the low-energy timer.
    PeriodicTick = 0x01,
    /// One-shot deadline reached.
    OneShotExpired = 0x02,
    /// Register-select write finished.
    I2cWriteDone = 0x04,
    /// Two-byte read finished.
    I2cReadDone = 0x10,
}

impl PendingEvent {
    /// Every bit the handshake knows about.
    pub const ALL_BITS: u8 = 0x01 | 0x02 | 0x04 | 0x10;

    pub const fn bit(self) -> u8 {
        self as u8
    }
}

// ── Polled mask ───────────────────────────────────────────────

/// The main loop's copy of the pending bits, written only from polled
/// context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventMask(u8);

impl EventMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, event: PendingEvent) -> bool {
        self.0 & event.bit() != 0
    }

    pub fn insert(&mut self, event: PendingEvent) {
        self.0 |= event.bit();
    }

    /// Clear `event`, returning whether it was set.
    pub fn take(&mut self, event: PendingEvent) -> bool {
        let was_set = self.contains(event);
        self.0 &= !event.bit();
        was_set
    }

    /// Drop any bits no handler is defined for.
    pub fn retain_known(&mut self) {
        self.0 &= PendingEvent::ALL_BITS;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

// ── Interrupt word ────────────────────────────────────────────

/// The interrupt-context half of the handshake.
///
/// ISRs call [`raise_and_wake`](Self::raise_and_wake); only the main loop
/// calls [`drain_into`](Self::drain_into).
///
/// At most one wake signal is posted per drain, so a slow loop cannot fill
/// the stack queue with wakes and crowd out real stack events.
pub struct PendingEvents {
    raised: AtomicU8,
    wake_posted: AtomicBool,
}

impl PendingEvents {
    pub const fn new() -> Self {
        Self {
            raised: AtomicU8::new(0),
            wake_posted: AtomicBool::new(false),
        }
    }

    /// Set one bit.  Safe to call from interrupt context (lock-free).
    pub fn raise(&self, event: PendingEvent) {
        self.raised.fetch_or(event.bit(), Ordering::Release);
    }

    /// Set one bit and wake the main loop, unless a wake is already
    /// outstanding since the last drain.  Returns `true` if a wake signal
    /// was posted.
    pub fn raise_and_wake(&self, event: PendingEvent, queue: &StackEventQueue) -> bool {
        self.raise(event);
        if self.wake_posted.swap(true, Ordering::AcqRel) {
            return false;
        }
        if queue.signal(SIGNAL_SENSOR_WAKE) {
            true
        } else {
            // Queue full: the loop is awake anyway, let the next raise retry.
            self.wake_posted.store(false, Ordering::Release);
            false
        }
    }

    /// Move every raised bit into `mask` and clear the interrupt word,
    /// both inside the same critical section.  Returns the bits moved.
    pub fn drain_into(&self, mask: &mut EventMask) -> u8 {
        critical_section::with(|_| {
            let raised = self.raised.swap(0, Ordering::AcqRel);
            self.wake_posted.store(false, Ordering::Release);
            mask.0 |= raised;
            raised
        })
    }

    /// A wake signal is outstanding since the last drain.
    pub fn wake_posted(&self) -> bool {
        self.wake_posted.load(Ordering::Acquire)
    }

    /// Peek without draining (diagnostics only).
    pub fn raised_bits(&self) -> u8 {
        self.raised.load(Ordering::Acquire)
    }
}

impl Default for PendingEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Device-wide interrupt word, shared by the timer and I2C ISRs.
pub static PENDING: PendingEvents = PendingEvents::new();

// ── Vendor stack event queue ──────────────────────────────────

/// Bounded queue standing in for the vendor stack's event delivery.
pub struct StackEventQueue {
    channel: Channel<CriticalSectionRawMutex, StackEvent, STACK_EVENT_QUEUE_CAP>,
}

impl StackEventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue an event.  Safe from interrupt context; returns `false`
    /// and drops the event when the queue is full.
    pub fn post(&self, event: StackEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(embassy_sync::channel::TrySendError::Full(dropped)) => {
                warn!("stack event queue full, dropped {:?}", dropped);
                false
            }
        }
    }

    /// The external-signal injection ISRs use to wake the main loop.
    pub fn signal(&self, signal: u32) -> bool {
        self.post(StackEvent::ExternalSignal(signal))
    }

    /// Block until the next event arrives.
    pub fn wait(&self) -> StackEvent {
        futures_lite::future::block_on(self.channel.receive())
    }

    /// Non-blocking receive.
    pub fn try_next(&self) -> Option<StackEvent> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for StackEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Device-wide stack event queue.
pub static STACK_EVENTS: StackEventQueue = StackEventQueue::new();
