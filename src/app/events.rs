//! Inbound vendor-stack events.
//!
//! The stack delivers one [`StackEvent`] at a time, in delivery order,
//! through [`StackEventQueue`](crate::events::StackEventQueue).  The
//! dispatcher treats the set of variants as exhaustive input; anything it
//! does not model arrives as [`StackEvent::Other`].

use super::ports::{ModelEvent, TimerId};

/// Tagged event record from the vendor mesh/BLE stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    /// Stack is up; first event after every reset.
    SystemBoot,
    /// A soft timer armed with `set_soft_timer` fired.
    SoftTimer(TimerId),

    /// Mesh node initialised; `provisioned` tells whether keys exist.
    NodeInitialized {
        provisioned: bool,
        address: u16,
        iv_index: u32,
    },
    ProvisioningStarted,
    Provisioned {
        address: u16,
        iv_index: u32,
    },
    ProvisioningFailed {
        reason: u16,
    },
    /// The node was removed from the network by a configuration client.
    NodeReset,

    GenericServerRequest(ModelEvent),
    GenericServerStateChanged(ModelEvent),

    ConnectionOpened {
        handle: u8,
    },
    ConnectionClosed {
        handle: u8,
        reason: u16,
    },

    FriendshipEstablished {
        friend_address: u16,
    },
    FriendshipFailed {
        reason: u16,
    },
    FriendshipTerminated {
        reason: u16,
    },

    /// Application-defined signal injected from interrupt context.
    ExternalSignal(u32),
    GattWriteRequest {
        connection: u8,
        characteristic: u16,
    },

    /// Any event id the dispatcher does not act on.
    Other(u32),
}
