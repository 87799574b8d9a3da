//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements              | Stands in for                 |
//! |---------------|-------------------------|-------------------------------|
//! | `device_id`   | -                       | BT address / GATT name format |
//! | `display`     | DisplayPort             | memory LCD                    |
//! | `flash`       | PersistentStore         | vendor flash PS keys          |
//! | `log_sink`    | log::Log                | UART console logger           |
//! | `sim_counter` | TimerCounter            | LETIMER0 counter              |
//! | `sim_gpio`    | embedded-hal InputPin   | PB0 / PB1                     |
//! | `sim_i2c`     | I2cBus, SleepPort       | I2C0 + MCP9808, sleep blocks  |
//! | `sim_stack`   | MeshStack, GenericModels| BGAPI mesh stack + model lib  |
//!
//! Everything except `device_id` is host simulation, built with the `sim`
//! feature or under test.

pub mod device_id;

#[cfg(any(test, feature = "sim"))]
pub mod display;
#[cfg(any(test, feature = "sim"))]
pub mod flash;
#[cfg(any(test, feature = "sim"))]
pub mod log_sink;
#[cfg(any(test, feature = "sim"))]
pub mod sim_counter;
#[cfg(any(test, feature = "sim"))]
pub mod sim_gpio;
#[cfg(any(test, feature = "sim"))]
pub mod sim_i2c;
#[cfg(any(test, feature = "sim"))]
pub mod sim_stack;
