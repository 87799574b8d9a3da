//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MeshDispatcher / drivers (domain)
//! ```
//!
//! The vendor mesh stack, the generic-model library, persistent flash, the
//! display and the raw peripherals all sit behind these traits.  The
//! dispatcher receives them bundled in [`Ports`], so the domain core never
//! touches hardware directly and every scenario runs on the host against
//! recording mocks.

use crate::drivers::hw_timer::Prescaler;
use crate::error::{StackError, StorageError, TransferError};

/// Mesh generic-model identifiers.
pub mod model_id {
    pub const GENERIC_ON_OFF_SERVER: u16 = 0x1000;
    pub const GENERIC_ON_OFF_CLIENT: u16 = 0x1001;
    pub const GENERIC_LEVEL_SERVER: u16 = 0x1002;
    pub const GENERIC_LEVEL_CLIENT: u16 = 0x1003;
}

/// GATT handle of the OTA control characteristic.
pub const GATT_OTA_CONTROL: u16 = 0x0015;

// ───────────────────────────────────────────────────────────────
// Vendor mesh/BLE stack (driven adapter: domain → stack commands)
// ───────────────────────────────────────────────────────────────

/// Application soft timers armed through the vendor stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerId {
    /// Repeating display refresh.
    DisplayRefresh = 1,
    /// Reboot after the factory-reset erase.
    FactoryReset = 2,
    /// Retry friendship establishment.
    FriendFind = 3,
    /// Reboot after provisioning failed.
    Restart = 4,
}

impl TimerId {
    pub fn from_handle(handle: u8) -> Option<Self> {
        match handle {
            1 => Some(Self::DisplayRefresh),
            2 => Some(Self::FactoryReset),
            3 => Some(Self::FriendFind),
            4 => Some(Self::Restart),
            _ => None,
        }
    }
}

/// How the device comes back up after a system reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResetMode {
    /// Normal application boot.
    Normal = 0,
    /// Hand control to the OTA bootloader.
    Dfu = 2,
}

/// Commands the dispatcher issues to the vendor stack.  Every command
/// returns the stack's result code; callers check and log, never retry.
pub trait MeshStack {
    fn node_init(&mut self) -> Result<(), StackError>;
    /// Start unprovisioned beaconing on the `bearers` bitmask.
    fn start_unprov_beaconing(&mut self, bearers: u8) -> Result<(), StackError>;

    fn generic_server_init(&mut self) -> Result<(), StackError>;
    fn friend_init(&mut self) -> Result<(), StackError>;
    fn generic_client_init(&mut self) -> Result<(), StackError>;

    fn lpn_init(&mut self) -> Result<(), StackError>;
    fn lpn_configure(&mut self, queue_len: u8, poll_timeout_ms: u32) -> Result<(), StackError>;
    fn lpn_establish_friendship(&mut self, netkey_index: u16) -> Result<(), StackError>;
    fn lpn_terminate_friendship(&mut self) -> Result<(), StackError>;
    fn lpn_deinit(&mut self) -> Result<(), StackError>;

    /// Arm (or re-arm) a stack soft timer.
    fn set_soft_timer(&mut self, ms: u32, id: TimerId, single_shot: bool) -> Result<(), StackError>;
    fn system_reset(&mut self, mode: ResetMode);

    fn connection_close(&mut self, handle: u8) -> Result<(), StackError>;
    fn gatt_write_response(&mut self, connection: u8, characteristic: u16, status: u8) -> Result<(), StackError>;

    /// Public Bluetooth address, least-significant byte first.
    fn bt_address(&mut self) -> [u8; 6];
    /// Write the GATT device-name attribute.
    fn write_device_name(&mut self, name: &str) -> Result<(), StackError>;
}

// ───────────────────────────────────────────────────────────────
// Generic-model library
// ───────────────────────────────────────────────────────────────

/// Value carried by a generic on/off or level message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericRequest {
    OnOff(bool),
    Level(i16),
}

/// Current or target state of a generic server model.
pub type GenericState = GenericRequest;

/// Raw generic-server event as delivered by the stack.  Opaque to the
/// dispatcher; only the model library decodes `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEvent {
    pub model_id: u16,
    pub element_index: u16,
    pub client_address: u16,
    pub server_address: u16,
    pub appkey_index: u16,
    pub payload: heapless::Vec<u8, 16>,
}

/// A decoded request addressed to one of our server models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerRequest {
    pub model_id: u16,
    pub element_index: u16,
    pub client_address: u16,
    pub server_address: u16,
    pub request: GenericRequest,
    pub transition_ms: u32,
    pub delay_ms: u16,
    pub flags: u8,
}

/// What the model library hands back after decoding a server event:
/// the arguments it would pass to the registered request/change callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCallback {
    Request(ServerRequest),
    StateChanged {
        model_id: u16,
        element_index: u16,
        current: GenericState,
        target: Option<GenericState>,
        remaining_ms: u32,
    },
}

/// The mesh generic-model library.
pub trait GenericModels {
    fn init(&mut self, max_models: u8) -> Result<(), StackError>;
    fn register_server(&mut self, model_id: u16, element_index: u16) -> Result<(), StackError>;
    fn register_client(&mut self, model_id: u16, element_index: u16) -> Result<(), StackError>;

    /// Forward a raw server event.  Returns the decoded callback, if the
    /// event targets a registered handler.
    fn server_event(&mut self, event: &ModelEvent) -> Option<ModelCallback>;

    fn update_state(
        &mut self,
        model_id: u16,
        element_index: u16,
        current: GenericState,
        remaining_ms: u32,
    ) -> Result<(), StackError>;
    fn publish_state(&mut self, model_id: u16, element_index: u16) -> Result<(), StackError>;

    #[allow(clippy::too_many_arguments)]
    fn client_publish(
        &mut self,
        model_id: u16,
        element_index: u16,
        transaction_id: u8,
        request: GenericRequest,
        transition_ms: u32,
        delay_ms: u16,
        flags: u8,
    ) -> Result<(), StackError>;
}

// ───────────────────────────────────────────────────────────────
// Persistent storage (driven adapter: domain ↔ flash PS keys)
// ───────────────────────────────────────────────────────────────

/// Vendor persistent store: one byte per logical key.
///
/// The whole region (provisioning keys included) is wiped by
/// [`erase_all`](Self::erase_all).
pub trait PersistentStore {
    fn load(&mut self, key: u16) -> Result<u8, StorageError>;
    fn save(&mut self, key: u16, value: u8) -> Result<(), StorageError>;
    fn erase_all(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Display (driven adapter: domain → status lines)
// ───────────────────────────────────────────────────────────────

/// Named status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayRow {
    Name,
    BtAddress,
    Connection,
    Action,
    /// One line per known alarm source, in configuration order.
    Alarm(u8),
    Temperature,
    Connections,
}

impl DisplayRow {
    /// Status rows blanked by a display clear, besides the alarm rows.
    /// Name and address survive.
    pub const STATUS_ROWS: [Self; 4] = [
        Self::Connection,
        Self::Action,
        Self::Temperature,
        Self::Connections,
    ];
}

/// Status display sink.  No feedback path.
pub trait DisplayPort {
    fn print(&mut self, row: DisplayRow, text: &str);
    fn set_enabled(&mut self, enabled: bool);
    /// Periodic refresh (the panel needs its polarity toggled).
    fn refresh(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Buttons (driven adapter: GPIO → domain)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// PB0: clears alarms (friend) / publishes on-off (low-power).
    A,
    /// PB1: toggles the display (friend).
    B,
}

pub trait ButtonPort {
    /// Current electrical level, read on demand.
    fn is_pressed(&mut self, button: Button) -> bool;
    fn enable_interrupts(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Raw peripherals used by the drivers
// ───────────────────────────────────────────────────────────────

/// The low-energy timer's counter register block.
pub trait TimerCounter {
    /// Apply the prescaler and load compare 0 (the reload value).
    fn configure(&mut self, prescaler: Prescaler, top: u32);
    fn count(&self) -> u32;
    fn set_count(&mut self, value: u32);
}

/// Status of the transfer in flight on the I2C peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    InProgress,
    Done,
    Failed(TransferError),
}

/// Interrupt-driven I2C peripheral.
pub trait I2cBus {
    /// Start a write of `bytes` to `address`.
    fn start_write(&mut self, address: u8, bytes: &[u8]) -> TransferStatus;
    /// Start a two-byte read from `address`.
    fn start_read(&mut self, address: u8) -> TransferStatus;
    /// Advance the transfer state machine (called from the ISR).
    fn poll(&mut self) -> TransferStatus;
    /// Bytes received by the last completed read, MSB first.
    fn read_buffer(&self) -> [u8; 2];
    fn set_interrupt_enabled(&mut self, enabled: bool);
}

/// Energy modes the sleep scheduler may enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnergyMode {
    Em1,
    Em2,
    Em3,
}

/// Sleep-block reservations held while a peripheral needs its clock.
pub trait SleepPort {
    /// Forbid `mode` and anything deeper.
    fn block(&mut self, mode: EnergyMode);
    fn unblock(&mut self, mode: EnergyMode);
}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Every collaborator the dispatcher talks to, borrowed for one event.
pub struct Ports<'a> {
    pub stack: &'a mut dyn MeshStack,
    pub models: &'a mut dyn GenericModels,
    pub store: &'a mut dyn PersistentStore,
    pub display: &'a mut dyn DisplayPort,
    pub buttons: &'a mut dyn ButtonPort,
}

/// Log a failed stack command.  Never retries.
pub fn check(command: &str, result: Result<(), StackError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{} failed: {}", command, e);
            false
        }
    }
}
