//! Interrupt-driven I2C transaction driver for the MCP9808.
//!
//! A sensor read is two transfers: a one-byte register-select write, then
//! a two-byte read.  Each is started from polled context and finished in
//! the I2C ISR, which raises `I2cWriteDone` / `I2cReadDone` in the pending
//! word.  While a transfer is in flight the driver holds an EM2 sleep
//! block so the peripheral clock keeps running.
//!
//! Failures are logged with the vendor status code and the transaction is
//! abandoned; the next periodic tick starts a fresh one.

use log::{debug, error};

use crate::app::ports::{EnergyMode, I2cBus, SleepPort, TransferStatus};
use crate::error::{Error, Result, TransferError};
use crate::events::{PendingEvent, PendingEvents, StackEventQueue};

/// Sleep mode the transfer must not descend into.
const TRANSFER_SLEEP_BLOCK: EnergyMode = EnergyMode::Em2;

/// Which half of the transaction is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Writing,
    Reading,
}

// ---------------------------------------------------------------------------
// MCP9808 decode
// ---------------------------------------------------------------------------

/// Ambient-temperature register to sixteenths of a degree.
///
/// The top three bits of the MSB are alert flags and are masked off.  Bit 4
/// of the MSB is the sign flag; when set the register converts as
/// `256 - (msb_nibble * 16 + lsb / 16)` degrees.
pub fn decode_sixteenths(msb: u8, lsb: u8) -> i16 {
    let msb = msb & 0x1F;
    let magnitude = (i16::from(msb & 0x0F) << 8) | i16::from(lsb);
    if msb & 0x10 != 0 {
        4096 - magnitude
    } else {
        magnitude
    }
}

/// Ambient-temperature register to degrees Celsius.
pub fn decode_temperature(msb: u8, lsb: u8) -> f32 {
    f32::from(decode_sixteenths(msb, lsb)) / 16.0
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct I2cDriver<'a, B: I2cBus, S: SleepPort> {
    bus: B,
    sleep: S,
    pending: &'a PendingEvents,
    wake: &'a StackEventQueue,
    phase: Phase,
    reading: Option<f32>,
    last_error: Option<TransferError>,
}

impl<'a, B: I2cBus, S: SleepPort> I2cDriver<'a, B, S> {
    pub fn new(bus: B, sleep: S, pending: &'a PendingEvents, wake: &'a StackEventQueue) -> Self {
        Self {
            bus,
            sleep,
            pending,
            wake,
            phase: Phase::Idle,
            reading: None,
            last_error: None,
        }
    }

    /// Start the register-select write.
    pub fn begin_write(&mut self, address: u8, register: u8) -> Result<()> {
        self.begin(Phase::Writing, |bus| bus.start_write(address, &[register]))
    }

    /// Start the two-byte read.  Refused while the write is still in
    /// flight.
    pub fn begin_read(&mut self, address: u8) -> Result<()> {
        self.begin(Phase::Reading, |bus| bus.start_read(address))
    }

    /// ISR body.  Returns without side effects while the hardware reports
    /// the transfer in progress; it will interrupt again.
    pub fn on_interrupt(&mut self) {
        if self.phase == Phase::Idle {
            return;
        }
        match self.bus.poll() {
            TransferStatus::InProgress => {}
            TransferStatus::Done => self.complete(),
            TransferStatus::Failed(e) => self.abandon(e),
        }
    }

    /// Take the temperature decoded by the last completed read.
    pub fn take_reading(&mut self) -> Option<f32> {
        self.reading.take()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_error(&self) -> Option<TransferError> {
        self.last_error
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn sleep(&self) -> &S {
        &self.sleep
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn begin(&mut self, phase: Phase, start: impl FnOnce(&mut B) -> TransferStatus) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(Error::Busy);
        }
        self.phase = phase;
        self.bus.set_interrupt_enabled(true);
        self.sleep.block(TRANSFER_SLEEP_BLOCK);
        match start(&mut self.bus) {
            TransferStatus::Failed(e) => {
                self.abandon(e);
                Err(e.into())
            }
            TransferStatus::InProgress | TransferStatus::Done => Ok(()),
        }
    }

    fn release(&mut self) {
        self.sleep.unblock(TRANSFER_SLEEP_BLOCK);
        self.bus.set_interrupt_enabled(false);
        self.phase = Phase::Idle;
    }

    fn complete(&mut self) {
        let finished = self.phase;
        self.release();
        self.last_error = None;
        let event = match finished {
            Phase::Writing => PendingEvent::I2cWriteDone,
            Phase::Reading => {
                let [msb, lsb] = self.bus.read_buffer();
                let celsius = decode_temperature(msb, lsb);
                debug!("I2C: read 0x{:02x}{:02x} -> {:.4} C", msb, lsb, celsius);
                self.reading = Some(celsius);
                PendingEvent::I2cReadDone
            }
            Phase::Idle => return,
        };
        self.pending.raise_and_wake(event, self.wake);
    }

    fn abandon(&mut self, e: TransferError) {
        let what = match self.phase {
            Phase::Writing => "write",
            Phase::Reading => "read",
            Phase::Idle => "transfer",
        };
        error!("I2C {} failed, status {}", what, e.code());
        self.last_error = Some(e);
        self.release();
    }
}
