//! Function-pointer state machine for the temperature sensor poller.
//!
//! Classic embedded FSM pattern:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌──────────────────┬────────────────┬─────────────────────┐   │
//! │  │ SensorStateId    │ trigger bit    │ on_trigger          │   │
//! │  ├──────────────────┼────────────────┼─────────────────────┤   │
//! │  │ StartTransaction │ PeriodicTick   │ fn(ctx, io) (write) │   │
//! │  │ WriteComplete    │ I2cWriteDone   │ fn(ctx, io) (read)  │   │
//! │  │ ReadComplete     │ I2cReadDone    │ fn(ctx, io) (report)│   │
//! │  └──────────────────┴────────────────┴─────────────────────┘   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each main-loop pass walks the table once in index order.  A state runs
//! when its trigger bit is set in the polled [`EventMask`]; the bit is
//! cleared before the action starts, so a duplicate trigger cannot run the
//! same action twice in one pass.  Walking in index order bounds a pass to
//! at most one full sensor read and keeps write before read.

pub mod context;
pub mod states;

use context::SensorContext;
use log::debug;

use crate::app::ports::{I2cBus, SleepPort};
use crate::drivers::i2c::I2cDriver;
use crate::error::Result;
use crate::events::{EventMask, PendingEvent};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// The three phases of one temperature read.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SensorStateId {
    StartTransaction = 0,
    WriteComplete = 1,
    ReadComplete = 2,
}

impl SensorStateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 3;

    /// Convert an index back to a state.  Out-of-range indices reset the
    /// cycle to `StartTransaction`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::StartTransaction,
            1 => Self::WriteComplete,
            2 => Self::ReadComplete,
            _ => {
                debug!("sensor FSM: invalid state index {idx}, resetting");
                Self::StartTransaction
            }
        }
    }
}

// ---------------------------------------------------------------------------
// I/O seam
// ---------------------------------------------------------------------------

/// What the state actions need from the sensor bus.
pub trait SensorIo {
    fn begin_write(&mut self, address: u8, register: u8) -> Result<()>;
    fn begin_read(&mut self, address: u8) -> Result<()>;
    fn take_reading(&mut self) -> Option<f32>;
}

impl<B: I2cBus, S: SleepPort> SensorIo for I2cDriver<'_, B, S> {
    fn begin_write(&mut self, address: u8, register: u8) -> Result<()> {
        I2cDriver::begin_write(self, address, register)
    }

    fn begin_read(&mut self, address: u8) -> Result<()> {
        I2cDriver::begin_read(self, address)
    }

    fn take_reading(&mut self) -> Option<f32> {
        I2cDriver::take_reading(self)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for a state's action.  Runs once per trigger.
pub type StateActionFn = fn(&mut SensorContext, &mut dyn SensorIo);

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single poller state.
pub struct StateDescriptor {
    pub id: SensorStateId,
    pub name: &'static str,
    pub trigger: PendingEvent,
    pub on_trigger: StateActionFn,
}

// ---------------------------------------------------------------------------
// Poller engine
// ---------------------------------------------------------------------------

/// Drives the sensor state table from the polled event mask.
pub struct SensorPoller {
    /// Fixed-size table indexed by `SensorStateId as usize`.
    table: [StateDescriptor; SensorStateId::COUNT],
    /// Index of the state whose action ran most recently.
    current: usize,
    /// Passes run since startup (wraps).
    passes: u64,
}

impl SensorPoller {
    pub fn new(table: [StateDescriptor; SensorStateId::COUNT]) -> Self {
        Self {
            table,
            current: SensorStateId::StartTransaction as usize,
            passes: 0,
        }
    }

    /// Run one pass over the table.  Every bit in `mask` is consumed: the
    /// state triggers as their actions start, the one-shot bit and any
    /// stray bits at the end of the pass.
    pub fn run_pass(&mut self, mask: &mut EventMask, ctx: &mut SensorContext, io: &mut dyn SensorIo) {
        self.passes = self.passes.wrapping_add(1);
        if mask.is_empty() {
            return;
        }

        for idx in 0..SensorStateId::COUNT {
            let state = &self.table[SensorStateId::from_index(idx) as usize];
            if mask.take(state.trigger) {
                self.current = state.id as usize;
                (state.on_trigger)(ctx, io);
            }
        }

        if mask.take(PendingEvent::OneShotExpired) {
            debug!("sensor FSM: one-shot expired");
        }
        if !mask.is_empty() {
            debug!("sensor FSM: discarding stray bits 0x{:02x}", mask.bits());
        }
        mask.clear();
    }

    /// State whose action ran most recently.
    pub fn current_state(&self) -> SensorStateId {
        SensorStateId::from_index(self.current)
    }

    pub fn current_name(&self) -> &'static str {
        self.table[self.current_state() as usize].name
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }
}

impl Default for SensorPoller {
    fn default() -> Self {
        Self::new(states::build_state_table())
    }
}
