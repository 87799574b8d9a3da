//! Blackboard shared by the sensor state actions.
//!
//! Actions read the sensor address from here and leave their results
//! behind for the main loop: the latest temperature, and a one-pass
//! `report` the loop forwards to the display and the role.

use crate::config::NodeConfig;

#[derive(Debug, Clone)]
pub struct SensorContext {
    /// 7-bit sensor address.
    pub address: u8,
    /// Register selected before each read.
    pub register: u8,

    /// Most recent decoded temperature (°C).
    pub last_temperature_c: Option<f32>,
    /// Temperature produced by the current pass, not yet forwarded.
    report: Option<f32>,

    /// Transactions whose register-select write was started.
    pub cycles_started: u32,
    /// Transactions that produced a temperature.
    pub cycles_completed: u32,
    /// Write or read starts refused by the driver.
    pub start_failures: u32,
}

impl SensorContext {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            address: config.sensor_address,
            register: config.sensor_register,
            last_temperature_c: None,
            report: None,
            cycles_started: 0,
            cycles_completed: 0,
            start_failures: 0,
        }
    }

    pub(crate) fn publish(&mut self, celsius: f32) {
        self.last_temperature_c = Some(celsius);
        self.report = Some(celsius);
        self.cycles_completed = self.cycles_completed.wrapping_add(1);
    }

    /// Take the temperature reported since the last call.
    pub fn take_report(&mut self) -> Option<f32> {
        self.report.take()
    }
}
