//! Node configuration parameters
//!
//! All tunable parameters for the mesh sensor node.  Chosen once at boot;
//! the role in particular never changes for the life of the image.

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Maximum number of remote alarm sources (one bit each in the alarm byte).
pub const MAX_ALARM_SOURCES: usize = 8;

/// Which side of the friend/low-power pairing this node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// Friend node: generic server, latches alarms from remote sensors.
    FriendServer,
    /// Low-power node: generic client, publishes button and temperature.
    LowPowerClient,
}

/// Low-frequency clock feeding the low-energy timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockSource {
    /// 32.768 kHz crystal, prescaled to fit long periods.
    Lfxo,
    /// 1 kHz ultra-low-frequency RC used in the deepest sleep mode.
    Ulfrco,
}

impl ClockSource {
    pub const fn frequency_hz(self) -> u32 {
        match self {
            Self::Lfxo => 32_768,
            Self::Ulfrco => 1_000,
        }
    }
}

/// A remote node whose alarm state is latched in the alarm byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmSource {
    /// Unicast mesh address of the remote node.
    pub address: u16,
    /// Single bit this source owns in the alarm byte.
    pub mask: u8,
    /// Short label shown on the status line ("MOT", "ALT", ...).
    pub label: String<8>,
}

/// Core node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Identity ---
    pub role: NodeRole,
    /// Name shown on the first display row and used as the GATT name prefix.
    pub node_name: String<24>,

    // --- Timer ---
    pub clock: ClockSource,
    /// Temperature sampling period (milliseconds).
    pub sensor_period_ms: u32,

    // --- Temperature sensor ---
    /// 7-bit I2C address of the MCP9808.
    pub sensor_address: u8,
    /// Ambient-temperature register.
    pub sensor_register: u8,

    // --- Recovery delays ---
    /// Delay before re-attempting a failed/terminated friendship.
    pub friendship_retry_ms: u32,
    /// Delay before rebooting after provisioning failed.
    pub provisioning_restart_ms: u32,
    /// Delay between erasing flash and rebooting on factory reset.
    pub factory_reset_reboot_ms: u32,
    /// Display refresh period.
    pub display_refresh_ms: u32,

    // --- Mesh ---
    /// Bearer bitmask for unprovisioned beaconing (bit0 ADV, bit1 GATT).
    pub unprov_bearers: u8,
    /// Friend queue length requested by the low-power node.
    pub lpn_queue_len: u8,
    /// Low-power node poll timeout (milliseconds).
    pub lpn_poll_timeout_ms: u32,

    // --- Persistence ---
    /// Persistent-store key holding the alarm byte.
    pub alarm_flash_key: u16,
    /// Known remote alarm sources.
    pub alarm_sources: Vec<AlarmSource, MAX_ALARM_SOURCES>,
}

fn source(address: u16, mask: u8, label: &str) -> AlarmSource {
    let mut l = String::new();
    // Labels are short literals; truncation would only drop display text.
    let _ = l.push_str(label);
    AlarmSource {
        address,
        mask,
        label: l,
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        let mut node_name = String::new();
        let _ = node_name.push_str("Friend Node");

        let mut alarm_sources = Vec::new();
        let _ = alarm_sources.push(source(0x0002, 0x01, "MOT"));
        let _ = alarm_sources.push(source(0x0003, 0x02, "ALT"));
        let _ = alarm_sources.push(source(0x0004, 0x04, "UVLT"));

        Self {
            role: NodeRole::FriendServer,
            node_name,

            clock: ClockSource::Lfxo,
            sensor_period_ms: 1000,

            sensor_address: crate::pins::MCP9808_ADDRESS,
            sensor_register: crate::pins::MCP9808_REG_AMBIENT,

            friendship_retry_ms: 2000,
            provisioning_restart_ms: 1000,
            factory_reset_reboot_ms: 2000,
            display_refresh_ms: 1000,

            unprov_bearers: 0x3,
            lpn_queue_len: 2,
            lpn_poll_timeout_ms: 5000,

            alarm_flash_key: 0x4004,
            alarm_sources,
        }
    }
}

impl NodeConfig {
    /// Default configuration for the low-power client build.
    pub fn low_power_client() -> Self {
        let mut node_name = String::new();
        let _ = node_name.push_str("LPN Node");
        Self {
            role: NodeRole::LowPowerClient,
            node_name,
            ..Self::default()
        }
    }

    /// Range-check every field.  Rejects rather than clamps.
    pub fn validate(&self) -> Result<(), Error> {
        let max_period = crate::drivers::hw_timer::max_period_ms(self.clock);
        if self.sensor_period_ms == 0 || self.sensor_period_ms > max_period {
            return Err(Error::Config(
                "sensor_period_ms must be non-zero and representable by the timer",
            ));
        }
        if self.sensor_address > 0x7F {
            return Err(Error::Config("sensor_address must be a 7-bit address"));
        }
        if self.friendship_retry_ms == 0
            || self.provisioning_restart_ms == 0
            || self.factory_reset_reboot_ms == 0
            || self.display_refresh_ms == 0
        {
            return Err(Error::Config("recovery and refresh delays must be non-zero"));
        }
        if self.unprov_bearers & 0x3 == 0 {
            return Err(Error::Config("unprov_bearers must enable ADV or GATT"));
        }

        let mut seen_masks = 0u8;
        for (i, src) in self.alarm_sources.iter().enumerate() {
            if src.mask.count_ones() != 1 {
                return Err(Error::Config("alarm source mask must be a single bit"));
            }
            if seen_masks & src.mask != 0 {
                return Err(Error::Config("alarm source masks must be unique"));
            }
            seen_masks |= src.mask;
            if self.alarm_sources[..i].iter().any(|s| s.address == src.address) {
                return Err(Error::Config("alarm source addresses must be unique"));
            }
        }
        Ok(())
    }

    /// Look up the alarm source registered for `address`.
    pub fn alarm_source(&self, address: u16) -> Option<&AlarmSource> {
        self.alarm_sources.iter().find(|s| s.address == address)
    }
}
