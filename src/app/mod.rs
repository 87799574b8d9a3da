//! Application core: protocol logic behind port traits.
//!
//! The dispatcher, role strategies and main loop live here.  All
//! interaction with the vendor stack, flash, display and buttons goes
//! through the traits in [`ports`], keeping this layer testable on the
//! host.

pub mod event_loop;
pub mod events;
pub mod ports;
pub mod role;
pub mod service;
