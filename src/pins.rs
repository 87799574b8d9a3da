//! Pin and bus assignments for the sensor node board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers or bus addresses.

// ---------------------------------------------------------------------------
// Push buttons (active-low, input with pull-up and glitch filter)
// ---------------------------------------------------------------------------

/// Button A (PB0), port F.
pub const BUTTON_A_PIN: u8 = 6;
/// Button B (PB1), port F.
pub const BUTTON_B_PIN: u8 = 7;

/// External-signal codes posted by the button edge interrupt.
pub const SIGNAL_BUTTON_A_PRESSED: u32 = 4;
pub const SIGNAL_BUTTON_A_RELEASED: u32 = 5;
pub const SIGNAL_BUTTON_B_PRESSED: u32 = 6;
pub const SIGNAL_BUTTON_B_RELEASED: u32 = 7;

// ---------------------------------------------------------------------------
// MCP9808 temperature sensor (I2C0)
// ---------------------------------------------------------------------------

/// 7-bit bus address with A2..A0 strapped low.
pub const MCP9808_ADDRESS: u8 = 0x18;
/// Ambient temperature register (read-only, 16 bits).
pub const MCP9808_REG_AMBIENT: u8 = 0x05;
