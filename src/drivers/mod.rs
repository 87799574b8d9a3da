//! Peripheral drivers: low-energy timer, interrupt-driven I2C, push buttons.

pub mod button;
pub mod hw_timer;
pub mod i2c;
