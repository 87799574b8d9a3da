//! Mesh/BLE event dispatcher: the protocol core.
//!
//! [`MeshDispatcher`] consumes one [`StackEvent`] at a time and turns it
//! into stack commands, display lines and alarm updates.  All I/O flows
//! through the port bundle handed in with each event, so every scenario
//! runs on the host against recording mocks.
//!
//! ```text
//!  SystemBoot ─[button held]─▶ factory reset ─▶ (2 s) reboot
//!      │
//!      ▼
//!  node_init ─▶ NodeInitialized ─[unprovisioned]─▶ beaconing
//!                     │                               │
//!               [provisioned]             ProvisioningStarted
//!                     │                               │
//!                     │        Provisioned ◀──────────┤
//!                     ▼             │                 └─ Failed ─▶ (1 s) reboot
//!               role mesh init ◀────┘
//!                     │
//!                     ▼
//!   connections · friendship (retry 2 s) · model requests · buttons · OTA
//! ```

use core::fmt::Write;

use log::{debug, info, warn};

use super::events::StackEvent;
use super::ports::{Button, DisplayRow, GATT_OTA_CONTROL, Ports, ResetMode, TimerId, check};
use super::role::{Line, RoleStrategy};
use crate::adapters::device_id::{address_text, device_name};
use crate::config::NodeConfig;
use crate::drivers::button::decode_signal;

/// Result code sent back on a successful user write.
const WRITE_OK: u8 = 0;

/// The single link the node tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// Handle of the open link, if any.
    pub handle: Option<u8>,
    /// Open links; only used to decide when to restart the LPN.
    pub count: u8,
}

// ───────────────────────────────────────────────────────────────
// MeshDispatcher
// ───────────────────────────────────────────────────────────────

pub struct MeshDispatcher<R: RoleStrategy> {
    config: NodeConfig,
    role: R,
    connection: ConnectionState,
    provisioned: bool,
    node_address: Option<u16>,
    friendship_active: bool,
    boot_to_dfu: bool,
}

impl<R: RoleStrategy> MeshDispatcher<R> {
    pub fn new(config: NodeConfig, role: R) -> Self {
        Self {
            config,
            role,
            connection: ConnectionState::default(),
            provisioned: false,
            node_address: None,
            friendship_active: false,
            boot_to_dfu: false,
        }
    }

    /// Handle one stack event.  `None` is ignored.
    pub fn handle_event(&mut self, event: Option<&StackEvent>, ports: &mut Ports<'_>) {
        let Some(event) = event else {
            return;
        };

        match event {
            StackEvent::SystemBoot => self.on_boot(ports),
            StackEvent::SoftTimer(id) => self.on_soft_timer(*id, ports),

            // ── Provisioning ──────────────────────────────────
            StackEvent::NodeInitialized {
                provisioned,
                address,
                iv_index,
            } => {
                ports.display.print(DisplayRow::Connection, "Initialized");
                info!("node initialised (provisioned={}, iv_index={})", provisioned, iv_index);
                if *provisioned {
                    self.enter_provisioned(*address, ports);
                } else {
                    info!("node unprovisioned, beaconing");
                    check(
                        "start_unprov_beaconing",
                        ports.stack.start_unprov_beaconing(self.config.unprov_bearers),
                    );
                }
            }
            StackEvent::ProvisioningStarted => {
                info!("provisioning started");
                ports.display.print(DisplayRow::Action, "Provisioning");
            }
            StackEvent::Provisioned { address, iv_index } => {
                info!("provisioned (iv_index={})", iv_index);
                self.enter_provisioned(*address, ports);
            }
            StackEvent::ProvisioningFailed { reason } => {
                warn!("provisioning failed, reason 0x{:04x}", reason);
                ports.display.print(DisplayRow::Action, "Provisioning Failed");
                check(
                    "set_soft_timer",
                    ports.stack.set_soft_timer(
                        self.config.provisioning_restart_ms,
                        TimerId::Restart,
                        true,
                    ),
                );
            }
            StackEvent::NodeReset => {
                info!("node reset by network");
                self.clear_display(ports);
                self.factory_reset(ports);
            }

            // ── Generic models ────────────────────────────────
            StackEvent::GenericServerRequest(raw) | StackEvent::GenericServerStateChanged(raw) => {
                if let Some(callback) = ports.models.server_event(raw) {
                    self.role.on_server_callback(callback, ports);
                }
            }

            // ── Connections ───────────────────────────────────
            StackEvent::ConnectionOpened { handle } => {
                ports.display.print(DisplayRow::Connection, "Connected");
                self.connection.count = self.connection.count.saturating_add(1);
                self.connection.handle = Some(*handle);
                self.show_connections(ports);
                self.role.on_connection_opened(ports);
                self.friendship_active = false;
            }
            StackEvent::ConnectionClosed { handle, reason } => {
                ports.display.print(DisplayRow::Connection, "Disconnected");
                info!("connection {} closed, reason 0x{:04x}", handle, reason);
                if self.boot_to_dfu {
                    info!("rebooting into DFU");
                    ports.stack.system_reset(ResetMode::Dfu);
                    return;
                }
                self.connection.handle = None;
                self.connection.count = self.connection.count.saturating_sub(1);
                self.show_connections(ports);
                if self.connection.count == 0 {
                    self.role.on_connections_closed(ports);
                }
            }

            // ── Friendship ────────────────────────────────────
            StackEvent::FriendshipEstablished { friend_address } => {
                info!("friendship established with 0x{:04x}", friend_address);
                ports.display.print(DisplayRow::Connection, "Friend EST.");
                self.friendship_active = true;
            }
            StackEvent::FriendshipFailed { reason } => {
                warn!("friendship failed, reason 0x{:04x}", reason);
                ports.display.print(DisplayRow::Connection, "Friend FAILED");
                self.schedule_friend_retry(ports);
            }
            StackEvent::FriendshipTerminated { reason } => {
                warn!("friendship terminated, reason 0x{:04x}", reason);
                ports.display.print(DisplayRow::Connection, "Friend TERM.");
                self.schedule_friend_retry(ports);
            }

            // ── Local inputs ──────────────────────────────────
            StackEvent::ExternalSignal(signal) => match decode_signal(*signal) {
                Some((button, _)) => {
                    let pressed = ports.buttons.is_pressed(button);
                    debug!("button {:?} pressed={}", button, pressed);
                    self.role.on_button(button, pressed, ports);
                }
                None => debug!("external signal 0x{:x}", signal),
            },
            StackEvent::GattWriteRequest {
                connection,
                characteristic,
            } => {
                if *characteristic == GATT_OTA_CONTROL {
                    info!("OTA control written, closing connection {}", connection);
                    self.boot_to_dfu = true;
                    check(
                        "gatt_write_response",
                        ports
                            .stack
                            .gatt_write_response(*connection, *characteristic, WRITE_OK),
                    );
                    check("connection_close", ports.stack.connection_close(*connection));
                } else {
                    debug!("write to characteristic 0x{:04x} ignored", characteristic);
                }
            }

            StackEvent::Other(id) => debug!("unhandled stack event 0x{:08x}", id),
        }
    }

    /// A temperature read completed: show it and pass it to the role.
    pub fn on_temperature(&mut self, celsius: f32, ports: &mut Ports<'_>) {
        let mut line = Line::new();
        let _ = write!(line, "Temp: {:.2} C", celsius);
        ports.display.print(DisplayRow::Temperature, &line);
        self.role.on_temperature(celsius, ports);
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn role(&self) -> &R {
        &self.role
    }

    pub fn role_mut(&mut self) -> &mut R {
        &mut self.role
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn provisioned(&self) -> bool {
        self.provisioned
    }

    pub fn node_address(&self) -> Option<u16> {
        self.node_address
    }

    pub fn friendship_active(&self) -> bool {
        self.friendship_active
    }

    pub fn boot_to_dfu(&self) -> bool {
        self.boot_to_dfu
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    // ───────────────────────────────────────────────────────────
    // Internal
    // ───────────────────────────────────────────────────────────

    fn on_boot(&mut self, ports: &mut Ports<'_>) {
        self.connection = ConnectionState::default();
        self.provisioned = false;
        self.node_address = None;
        self.friendship_active = false;
        self.boot_to_dfu = false;
        self.role.reset();

        self.clear_display(ports);
        ports.display.print(DisplayRow::Name, &self.config.node_name);
        let addr = ports.stack.bt_address();
        ports.display.print(DisplayRow::BtAddress, &address_text(&addr));
        let name = device_name(&self.config.node_name, &addr);
        info!("device name: {}", name);
        check("write_device_name", ports.stack.write_device_name(&name));
        check(
            "set_soft_timer",
            ports.stack.set_soft_timer(
                self.config.display_refresh_ms,
                TimerId::DisplayRefresh,
                false,
            ),
        );

        if ports.buttons.is_pressed(Button::A) || ports.buttons.is_pressed(Button::B) {
            info!("button held at boot, factory reset");
            self.factory_reset(ports);
            return;
        }

        info!("booting as {:?}", self.role.role());
        ports.display.print(DisplayRow::Connection, "Booting");
        ports.buttons.enable_interrupts();
        check("node_init", ports.stack.node_init());
    }

    fn on_soft_timer(&mut self, id: TimerId, ports: &mut Ports<'_>) {
        match id {
            TimerId::DisplayRefresh => ports.display.refresh(),
            TimerId::FactoryReset | TimerId::Restart => {
                info!("{:?} timer fired, rebooting", id);
                ports.stack.system_reset(ResetMode::Normal);
            }
            TimerId::FriendFind => {
                info!("retrying friendship");
                check("lpn_establish_friendship", ports.stack.lpn_establish_friendship(0));
            }
        }
    }

    fn enter_provisioned(&mut self, address: u16, ports: &mut Ports<'_>) {
        self.provisioned = true;
        self.node_address = Some(address);
        info!("node address 0x{:04x}", address);
        ports.display.print(DisplayRow::Action, "Provisioned");
        self.role.mesh_init(ports);
        ports.buttons.enable_interrupts();
    }

    /// Erase flash (provisioning data included) and reboot shortly after.
    fn factory_reset(&mut self, ports: &mut Ports<'_>) {
        self.clear_display(ports);
        ports.display.print(DisplayRow::Alarm(0), "*************");
        ports.display.print(DisplayRow::Alarm(1), "FACTORY RESET");
        ports.display.print(DisplayRow::Alarm(2), "*************");

        if let Some(handle) = self.connection.handle {
            check("connection_close", ports.stack.connection_close(handle));
        }
        self.connection = ConnectionState::default();
        self.provisioned = false;
        self.node_address = None;
        self.friendship_active = false;
        self.role.reset();

        if let Err(e) = ports.store.erase_all() {
            warn!("erase_all failed: {}", e);
        }
        check(
            "set_soft_timer",
            ports.stack.set_soft_timer(
                self.config.factory_reset_reboot_ms,
                TimerId::FactoryReset,
                true,
            ),
        );
    }

    fn schedule_friend_retry(&mut self, ports: &mut Ports<'_>) {
        self.friendship_active = false;
        check(
            "set_soft_timer",
            ports.stack.set_soft_timer(
                self.config.friendship_retry_ms,
                TimerId::FriendFind,
                true,
            ),
        );
    }

    fn show_connections(&self, ports: &mut Ports<'_>) {
        let mut line = Line::new();
        let _ = write!(line, "Connections: {}", self.connection.count);
        info!("{}", line);
        ports.display.print(DisplayRow::Connections, &line);
    }

    fn clear_display(&self, ports: &mut Ports<'_>) {
        for row in DisplayRow::STATUS_ROWS {
            ports.display.print(row, "");
        }
        let alarm_rows = self.config.alarm_sources.len().max(3);
        for idx in 0..alarm_rows {
            ports.display.print(DisplayRow::Alarm(idx as u8), "");
        }
    }
}
