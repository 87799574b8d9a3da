//! Device identity derived from the Bluetooth public address.
//!
//! The address arrives least-significant byte first, as the stack reports
//! it.  Two strings are derived from it:
//! - the display form `XX:XX:XX:XX:XX:XX` (most-significant byte first)
//! - the GATT device name `<node name> - yy:zz` from the two lowest bytes,
//!   unique enough to tell nodes apart on a scanner

use core::fmt::Write;

/// 6-byte Bluetooth address, LSB first.
pub type BtAddress = [u8; 6];

/// Display form of the address.
pub type AddressString = heapless::String<24>;

/// GATT device name.
pub type DeviceName = heapless::String<40>;

/// Simulation: a deterministic fake address.
pub fn sim_address() -> BtAddress {
    [0xFE, 0xCA, 0xEF, 0xBE, 0xAD, 0xDE]
}

/// `XX:XX:XX:XX:XX:XX`, most-significant byte first.
pub fn address_text(addr: &BtAddress) -> AddressString {
    let mut s = AddressString::new();
    let _ = write!(
        s,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        addr[5], addr[4], addr[3], addr[2], addr[1], addr[0]
    );
    s
}

/// `<node name> - yy:zz` where `yy:zz` are address bytes 1 and 0.
pub fn device_name(node_name: &str, addr: &BtAddress) -> DeviceName {
    let mut name = DeviceName::new();
    let _ = write!(name, "{} - {:02x}:{:02x}", node_name, addr[1], addr[0]);
    name
}
