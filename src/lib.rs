//! Bluetooth-mesh sensor node firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host
//! simulation.  Everything that touches the vendor stack or the radio sits
//! behind the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod alarm;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod pins;
