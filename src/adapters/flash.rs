//! In-memory persistent store.
//!
//! Stands in for the vendor flash PS keys: one byte per key.  Loading a
//! key that was never saved reports `OperationFailed`, the same code the
//! real store returns for an empty record.  Faults can be injected.

use std::collections::HashMap;

use log::info;

use crate::app::ports::PersistentStore;
use crate::error::StorageError;

#[derive(Debug, Default)]
pub struct SimFlash {
    keys: HashMap<u16, u8>,
    loads: usize,
    saves: usize,
    erases: usize,
    fail_next_load: Option<StorageError>,
    fail_saves: Option<StorageError>,
}

impl SimFlash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a save.
    pub fn preset(&mut self, key: u16, value: u8) {
        self.keys.insert(key, value);
    }

    pub fn get(&self, key: u16) -> Option<u8> {
        self.keys.get(&key).copied()
    }

    /// Fail the next `load` with `e`.
    pub fn fail_next_load(&mut self, e: StorageError) {
        self.fail_next_load = Some(e);
    }

    /// Fail every `save` with `e` from now on.
    pub fn fail_saves(&mut self, e: StorageError) {
        self.fail_saves = Some(e);
    }

    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn erases(&self) -> usize {
        self.erases
    }
}

impl PersistentStore for SimFlash {
    fn load(&mut self, key: u16) -> Result<u8, StorageError> {
        self.loads += 1;
        if let Some(e) = self.fail_next_load.take() {
            return Err(e);
        }
        self.keys.get(&key).copied().ok_or(StorageError::OperationFailed)
    }

    fn save(&mut self, key: u16, value: u8) -> Result<(), StorageError> {
        self.saves += 1;
        if let Some(e) = self.fail_saves {
            return Err(e);
        }
        self.keys.insert(key, value);
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        self.erases += 1;
        info!("flash: erasing {} key(s)", self.keys.len());
        self.keys.clear();
        Ok(())
    }
}
