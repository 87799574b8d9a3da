//! Simulated MCP9808 on an interrupt-driven I2C bus.
//!
//! Every transfer takes two interrupts to finish: the first poll reports
//! it still in progress, the second reports the terminal status.  Faults
//! can be injected to exercise the abandon path.

use crate::app::ports::{EnergyMode, I2cBus, SleepPort, TransferStatus};
use crate::error::TransferError;

/// Bus operations in the order they were started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Write { address: u8, register: u8 },
    Read { address: u8 },
}

pub struct SimMcp9808 {
    address: u8,
    raw: u16,
    active: bool,
    polls_left: u8,
    irq_enabled: bool,
    fail_next: Option<TransferError>,
    fail_on_start: Option<TransferError>,
    ops: Vec<BusOp>,
    polls: usize,
}

impl SimMcp9808 {
    /// A sensor at `address` whose ambient register reads `raw`.
    pub fn new(address: u8, raw: u16) -> Self {
        Self {
            address,
            raw,
            active: false,
            polls_left: 0,
            irq_enabled: false,
            fail_next: None,
            fail_on_start: None,
            ops: Vec::new(),
            polls: 0,
        }
    }

    /// Change the register contents (e.g. to drift the temperature).
    pub fn set_raw(&mut self, raw: u16) {
        self.raw = raw;
    }

    /// Fail the next transfer once it gets going.
    pub fn fail_next(&mut self, e: TransferError) {
        self.fail_next = Some(e);
    }

    /// Fail the next transfer immediately at start.
    pub fn fail_on_start(&mut self, e: TransferError) {
        self.fail_on_start = Some(e);
    }

    /// The peripheral would assert its interrupt line.
    pub fn irq_pending(&self) -> bool {
        self.active && self.irq_enabled
    }

    pub fn ops(&self) -> &[BusOp] {
        &self.ops
    }

    pub fn reads_started(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, BusOp::Read { .. })).count()
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    fn start(&mut self, address: u8, op: BusOp) -> TransferStatus {
        self.ops.push(op);
        if let Some(e) = self.fail_on_start.take() {
            return TransferStatus::Failed(e);
        }
        if address != self.address {
            self.fail_next = Some(TransferError::Nack);
        }
        self.active = true;
        self.polls_left = 2;
        TransferStatus::InProgress
    }
}

impl I2cBus for SimMcp9808 {
    fn start_write(&mut self, address: u8, bytes: &[u8]) -> TransferStatus {
        let register = bytes.first().copied().unwrap_or_default();
        self.start(address, BusOp::Write { address, register })
    }

    fn start_read(&mut self, address: u8) -> TransferStatus {
        self.start(address, BusOp::Read { address })
    }

    fn poll(&mut self) -> TransferStatus {
        self.polls += 1;
        if !self.active {
            return TransferStatus::Failed(TransferError::UsageFault);
        }
        self.polls_left = self.polls_left.saturating_sub(1);
        if self.polls_left > 0 {
            return TransferStatus::InProgress;
        }
        self.active = false;
        match self.fail_next.take() {
            Some(e) => TransferStatus::Failed(e),
            None => TransferStatus::Done,
        }
    }

    fn read_buffer(&self) -> [u8; 2] {
        self.raw.to_be_bytes()
    }

    fn set_interrupt_enabled(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }
}

/// Sleep-block bookkeeping: one reference count per energy mode.
#[derive(Debug, Default)]
pub struct SimSleep {
    counts: [u8; 3],
}

impl SimSleep {
    /// Shallowest mode currently blocked, if any.
    pub fn blocked(&self) -> Option<EnergyMode> {
        [EnergyMode::Em1, EnergyMode::Em2, EnergyMode::Em3]
            .into_iter()
            .find(|m| self.counts[*m as usize] > 0)
    }
}

impl SleepPort for SimSleep {
    fn block(&mut self, mode: EnergyMode) {
        self.counts[mode as usize] = self.counts[mode as usize].saturating_add(1);
    }

    fn unblock(&mut self, mode: EnergyMode) {
        self.counts[mode as usize] = self.counts[mode as usize].saturating_sub(1);
    }
}
