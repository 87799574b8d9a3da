//! Concrete state actions and table builder.
//!
//! ```text
//!  PeriodicTick ──▶ START_TRANSACTION ── write(reg) ──┐
//!                                                     │ I2C ISR
//!  I2cWriteDone ──▶ WRITE_COMPLETE ──── read(2) ──────┤
//!                                                     │ I2C ISR
//!  I2cReadDone  ──▶ READ_COMPLETE ───── decode, report
//! ```

use super::context::SensorContext;
use super::{SensorIo, SensorStateId, StateDescriptor};
use crate::events::PendingEvent;
use log::{debug, info, warn};

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; SensorStateId::COUNT] {
    [
        // Index 0
        StateDescriptor {
            id: SensorStateId::StartTransaction,
            name: "StartTransaction",
            trigger: PendingEvent::PeriodicTick,
            on_trigger: start_transaction,
        },
        // Index 1
        StateDescriptor {
            id: SensorStateId::WriteComplete,
            name: "WriteComplete",
            trigger: PendingEvent::I2cWriteDone,
            on_trigger: write_complete,
        },
        // Index 2
        StateDescriptor {
            id: SensorStateId::ReadComplete,
            name: "ReadComplete",
            trigger: PendingEvent::I2cReadDone,
            on_trigger: read_complete,
        },
    ]
}

fn start_transaction(ctx: &mut SensorContext, io: &mut dyn SensorIo) {
    debug!("STATE0_START_TRANSACTION: select register 0x{:02x}", ctx.register);
    match io.begin_write(ctx.address, ctx.register) {
        Ok(()) => ctx.cycles_started = ctx.cycles_started.wrapping_add(1),
        Err(e) => {
            ctx.start_failures = ctx.start_failures.wrapping_add(1);
            warn!("sensor write not started: {}", e);
        }
    }
}

fn write_complete(ctx: &mut SensorContext, io: &mut dyn SensorIo) {
    debug!("STATE1_WRITE_COMPLETE: reading ambient temperature");
    if let Err(e) = io.begin_read(ctx.address) {
        ctx.start_failures = ctx.start_failures.wrapping_add(1);
        warn!("sensor read not started: {}", e);
    }
}

fn read_complete(ctx: &mut SensorContext, io: &mut dyn SensorIo) {
    debug!("STATE2_READ_COMPLETE");
    match io.take_reading() {
        Some(celsius) => {
            info!("Temperature: {:.2} C", celsius);
            ctx.publish(celsius);
        }
        None => warn!("read complete without a reading"),
    }
}
