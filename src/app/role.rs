//! Role strategies.
//!
//! The dispatcher's protocol state machine is the same for both roles; what
//! differs is how the mesh models are brought up and what buttons, model
//! callbacks and temperature readings do.  Each role is a strategy chosen
//! once at boot.
//!
//! | Hook                   | Friend server                 | Low-power client             |
//! |------------------------|-------------------------------|------------------------------|
//! | `mesh_init`            | server + friend, load alarms  | client models, start LPN     |
//! | connection opened      | -                             | tear down LPN                |
//! | last connection closed | -                             | restart LPN                  |
//! | button A               | clear alarms                  | publish on/off (level read)  |
//! | button B               | toggle display                | -                            |
//! | server callback        | alarm latch + level display   | -                            |
//! | temperature            | -                             | publish level (centidegrees) |

use core::fmt::Write;

use log::{debug, info};

use super::ports::{
    Button, DisplayPort, DisplayRow, GenericRequest, ModelCallback, Ports, check, model_id,
};
use crate::alarm::{ALARM_CLEARED, ALARM_SET, AlarmManager};
use crate::config::{NodeConfig, NodeRole};

/// One display line.
pub type Line = heapless::String<32>;

/// Number of model slots the generic-model library reserves.
const MAX_MODELS: u8 = 9;

pub trait RoleStrategy {
    fn role(&self) -> NodeRole;

    /// Drop in-memory role state (counters, latched values).  Called at
    /// boot and on factory reset; flash is not touched.
    fn reset(&mut self);

    /// Bring up the role's mesh models once the node is provisioned.
    fn mesh_init(&mut self, ports: &mut Ports<'_>);

    fn on_connection_opened(&mut self, _ports: &mut Ports<'_>) {}

    /// The connection count dropped to zero.
    fn on_connections_closed(&mut self, _ports: &mut Ports<'_>) {}

    /// A button edge; `pressed` is the level read back from the pin.
    fn on_button(&mut self, button: Button, pressed: bool, ports: &mut Ports<'_>);

    fn on_server_callback(&mut self, _callback: ModelCallback, _ports: &mut Ports<'_>) {}

    fn on_temperature(&mut self, _celsius: f32, _ports: &mut Ports<'_>) {}
}

// ───────────────────────────────────────────────────────────────
// Friend server
// ───────────────────────────────────────────────────────────────

pub struct FriendServerRole {
    alarms: AlarmManager,
    display_on: bool,
}

impl FriendServerRole {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            alarms: AlarmManager::new(config),
            display_on: true,
        }
    }

    pub fn alarms(&self) -> &AlarmManager {
        &self.alarms
    }

    pub fn display_on(&self) -> bool {
        self.display_on
    }

    /// Show the latched state of every source.
    pub fn reset_print(&self, display: &mut dyn DisplayPort) {
        for (idx, source) in self.alarms.sources().iter().enumerate() {
            let mut line = Line::new();
            if self.alarms.is_latched(source.mask) {
                let _ = write!(line, "{}: ALARM", source.label);
            } else {
                let _ = line.push_str("-");
            }
            display.print(DisplayRow::Alarm(idx as u8), &line);
        }
    }

    /// Level request from a remote sensor: latch or clear on the sentinel
    /// values, then show the source's line.
    fn handle_level(&mut self, source: u16, level: i16, ports: &mut Ports<'_>) {
        match level {
            ALARM_SET => {
                self.alarms.set_alarm(ports.store, source, true);
            }
            ALARM_CLEARED => {
                self.alarms.set_alarm(ports.store, source, false);
            }
            _ => {}
        }

        let Some((idx, src)) = self.alarms.source(source) else {
            return;
        };
        let mut line = Line::new();
        if self.alarms.is_latched(src.mask) {
            let _ = write!(line, "{}: ALARM", src.label);
        } else if level == ALARM_CLEARED {
            let _ = write!(line, "{}: ALARM CLEARED", src.label);
        } else {
            let _ = write!(line, "{} (%): {}", src.label, level);
        }
        ports.display.print(DisplayRow::Alarm(idx), &line);
    }
}

impl RoleStrategy for FriendServerRole {
    fn role(&self) -> NodeRole {
        NodeRole::FriendServer
    }

    fn reset(&mut self) {
        self.alarms.reset();
    }

    fn mesh_init(&mut self, ports: &mut Ports<'_>) {
        check("generic_server_init", ports.stack.generic_server_init());
        check("friend_init", ports.stack.friend_init());
        check("models_init", ports.models.init(MAX_MODELS));
        for model in [model_id::GENERIC_ON_OFF_SERVER, model_id::GENERIC_LEVEL_SERVER] {
            check("register_server", ports.models.register_server(model, 0));
        }
        self.alarms.load(ports.store);
        self.reset_print(ports.display);
    }

    fn on_button(&mut self, button: Button, pressed: bool, ports: &mut Ports<'_>) {
        if !pressed {
            return;
        }
        match button {
            Button::A => {
                info!("alarms cleared by button");
                self.alarms.clear(ports.store);
                self.reset_print(ports.display);
            }
            Button::B => {
                self.display_on = !self.display_on;
                ports.display.set_enabled(self.display_on);
                if self.display_on {
                    self.reset_print(ports.display);
                }
            }
        }
    }

    fn on_server_callback(&mut self, callback: ModelCallback, ports: &mut Ports<'_>) {
        match callback {
            ModelCallback::Request(req) => {
                match req.request {
                    GenericRequest::Level(level) => {
                        info!("level {} from 0x{:04x}", level, req.client_address);
                        self.handle_level(req.client_address, level, ports);
                    }
                    GenericRequest::OnOff(on) => {
                        info!("on/off {} from 0x{:04x}", on, req.client_address);
                    }
                }
                check(
                    "update_state",
                    ports
                        .models
                        .update_state(req.model_id, req.element_index, req.request, 0),
                );
            }
            // Nothing is requested of the remote nodes, so state changes
            // need no action.
            ModelCallback::StateChanged { model_id, .. } => {
                debug!("server state changed on model 0x{:04x}", model_id);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Low-power client
// ───────────────────────────────────────────────────────────────

pub struct LowPowerClientRole {
    transaction_id: u8,
    queue_len: u8,
    poll_timeout_ms: u32,
    mesh_ready: bool,
}

impl LowPowerClientRole {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            transaction_id: 0,
            queue_len: config.lpn_queue_len,
            poll_timeout_ms: config.lpn_poll_timeout_ms,
            mesh_ready: false,
        }
    }

    pub fn transaction_id(&self) -> u8 {
        self.transaction_id
    }

    fn lpn_init(&self, ports: &mut Ports<'_>) {
        if !check("lpn_init", ports.stack.lpn_init()) {
            return;
        }
        check(
            "lpn_configure",
            ports.stack.lpn_configure(self.queue_len, self.poll_timeout_ms),
        );
        info!("LPN: finding friend");
        check("lpn_establish_friendship", ports.stack.lpn_establish_friendship(0));
    }

    fn lpn_deinit(&self, ports: &mut Ports<'_>) {
        check("lpn_terminate_friendship", ports.stack.lpn_terminate_friendship());
        check("lpn_deinit", ports.stack.lpn_deinit());
        info!("LPN: deinitialised");
    }

    fn publish(&mut self, model: u16, request: GenericRequest, ports: &mut Ports<'_>) {
        if !self.mesh_ready {
            debug!("publish skipped, mesh not up");
            return;
        }
        let tid = self.transaction_id;
        self.transaction_id = self.transaction_id.wrapping_add(1);
        check(
            "client_publish",
            ports.models.client_publish(model, 0, tid, request, 0, 0, 0),
        );
    }
}

/// Degrees Celsius to centidegrees, kept clear of the alarm sentinels.
pub fn centidegrees(celsius: f32) -> i16 {
    let centi = (celsius * 100.0) as i32;
    centi.clamp(i32::from(ALARM_CLEARED) + 1, i32::from(ALARM_SET) - 1) as i16
}

impl RoleStrategy for LowPowerClientRole {
    fn role(&self) -> NodeRole {
        NodeRole::LowPowerClient
    }

    fn reset(&mut self) {
        self.transaction_id = 0;
        self.mesh_ready = false;
    }

    fn mesh_init(&mut self, ports: &mut Ports<'_>) {
        check("generic_client_init", ports.stack.generic_client_init());
        check("models_init", ports.models.init(MAX_MODELS));
        for model in [model_id::GENERIC_ON_OFF_CLIENT, model_id::GENERIC_LEVEL_CLIENT] {
            check("register_client", ports.models.register_client(model, 0));
        }
        self.mesh_ready = true;
        self.lpn_init(ports);
    }

    fn on_connection_opened(&mut self, ports: &mut Ports<'_>) {
        self.lpn_deinit(ports);
    }

    fn on_connections_closed(&mut self, ports: &mut Ports<'_>) {
        self.lpn_init(ports);
    }

    fn on_button(&mut self, button: Button, pressed: bool, ports: &mut Ports<'_>) {
        if button == Button::A {
            self.publish(model_id::GENERIC_ON_OFF_CLIENT, GenericRequest::OnOff(pressed), ports);
        }
    }

    fn on_temperature(&mut self, celsius: f32, ports: &mut Ports<'_>) {
        self.publish(
            model_id::GENERIC_LEVEL_CLIENT,
            GenericRequest::Level(centidegrees(celsius)),
            ports,
        );
    }
}
