//! Alarm status byte and its flash mirror.
//!
//! One bit per known remote sensor.  The in-memory byte is written back to
//! flash after every change, so the two only differ while a save is in
//! flight.  At boot the byte is reloaded; a missing or unreadable record
//! ("operation failed") is repaired once by writing zero and reading again.

use heapless::Vec;
use log::{error, info, warn};

use crate::app::ports::PersistentStore;
use crate::config::{AlarmSource, MAX_ALARM_SOURCES, NodeConfig};
use crate::error::StorageError;

/// Generic-level value a remote sensor sends to latch its alarm.
pub const ALARM_SET: i16 = i16::MAX;
/// Generic-level value a remote sensor sends to clear its alarm.
pub const ALARM_CLEARED: i16 = i16::MIN;

pub struct AlarmManager {
    value: u8,
    key: u16,
    sources: Vec<AlarmSource, MAX_ALARM_SOURCES>,
}

impl AlarmManager {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            value: 0,
            key: config.alarm_flash_key,
            sources: config.alarm_sources.clone(),
        }
    }

    /// Reload the byte from flash.  Makes at most one repair attempt.
    pub fn load(&mut self, store: &mut dyn PersistentStore) {
        match store.load(self.key) {
            Ok(v) => self.value = v,
            Err(StorageError::OperationFailed) => {
                warn!("alarm record unreadable, resetting to 0x00");
                self.value = 0;
                self.store(store);
                match store.load(self.key) {
                    Ok(v) => self.value = v,
                    Err(e) => error!("alarm reload after repair failed: {}", e),
                }
            }
            Err(e) => error!("alarm load failed: {}", e),
        }
        info!("alarms loaded: 0x{:02x}", self.value);
    }

    /// Write the current byte to flash.  Errors are logged, not retried.
    pub fn store(&self, store: &mut dyn PersistentStore) {
        if let Err(e) = store.save(self.key, self.value) {
            error!("alarm store failed: {}", e);
        }
    }

    /// Latch or clear the bit owned by `source`.  Unknown addresses change
    /// nothing and skip the save.
    pub fn set_alarm(&mut self, store: &mut dyn PersistentStore, source: u16, asserted: bool) -> u8 {
        let Some(mask) = self.mask_for(source) else {
            warn!("alarm from unknown source 0x{:04x} ignored", source);
            return self.value;
        };
        if asserted {
            self.value |= mask;
        } else {
            self.value &= !mask;
        }
        self.store(store);
        self.value
    }

    /// Forget the in-memory byte without touching flash (boot, or after
    /// the store was erased).
    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Drop every latched alarm.
    pub fn clear(&mut self, store: &mut dyn PersistentStore) {
        self.value = 0;
        self.store(store);
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn is_latched(&self, mask: u8) -> bool {
        self.value & mask != 0
    }

    /// Known sources in display order.
    pub fn sources(&self) -> &[AlarmSource] {
        &self.sources
    }

    /// Display index and source record for `address`.
    pub fn source(&self, address: u16) -> Option<(u8, &AlarmSource)> {
        self.sources
            .iter()
            .enumerate()
            .find(|(_, s)| s.address == address)
            .map(|(i, s)| (i as u8, s))
    }

    fn mask_for(&self, address: u16) -> Option<u8> {
        self.source(address).map(|(_, s)| s.mask)
    }
}
