//! Simulated vendor mesh stack and generic-model library.
//!
//! [`SimStack`] answers commands the way the stack would, by posting the
//! follow-up event into the stack queue (`node_init` → `NodeInitialized`,
//! beaconing → provisioning, friendship requests → established).  Soft
//! timers are kept in a table and fire when the runner advances time.
//!
//! [`SimModels`] decodes generic-server payloads with a small fixed layout:
//!
//! | Byte | Meaning                           |
//! |------|-----------------------------------|
//! | 0    | 0 = on/off, 1 = level             |
//! | 1..  | on/off: 1 byte, level: i16 LE     |

use log::info;

use crate::adapters::device_id::{BtAddress, sim_address};
use crate::app::events::StackEvent;
use crate::app::ports::{
    GenericModels, GenericRequest, GenericState, MeshStack, ModelCallback, ModelEvent, ResetMode,
    ServerRequest, TimerId,
};
use crate::error::StackError;
use crate::events::StackEventQueue;

/// Unicast address handed out by the simulated provisioner.
pub const SIM_NODE_ADDRESS: u16 = 0x0001;
/// Address of the simulated friend.
pub const SIM_FRIEND_ADDRESS: u16 = 0x0010;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedTimer {
    id: TimerId,
    period_ms: u32,
    single_shot: bool,
    due_ms: u64,
}

pub struct SimStack<'a> {
    queue: &'a StackEventQueue,
    address: BtAddress,
    provisioned: bool,
    timers: Vec<ArmedTimer>,
    now_ms: u64,
    reset: Option<ResetMode>,
    device_name: String,
}

impl<'a> SimStack<'a> {
    pub fn new(queue: &'a StackEventQueue, provisioned: bool) -> Self {
        Self {
            queue,
            address: sim_address(),
            provisioned,
            timers: Vec::new(),
            now_ms: 0,
            reset: None,
            device_name: String::new(),
        }
    }

    /// Move simulated time forward, firing any soft timers that come due.
    pub fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        let mut fired = Vec::new();
        self.timers.retain_mut(|t| {
            if t.due_ms > now_ms {
                return true;
            }
            fired.push(t.id);
            if t.single_shot {
                return false;
            }
            t.due_ms += u64::from(t.period_ms.max(1));
            true
        });
        for id in fired {
            self.queue.post(StackEvent::SoftTimer(id));
        }
    }

    /// Earliest soft-timer deadline.
    pub fn next_due(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.due_ms).min()
    }

    /// Reset requested by the application, if any.
    pub fn reset_requested(&self) -> Option<ResetMode> {
        self.reset
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl MeshStack for SimStack<'_> {
    fn node_init(&mut self) -> Result<(), StackError> {
        self.queue.post(StackEvent::NodeInitialized {
            provisioned: self.provisioned,
            address: if self.provisioned { SIM_NODE_ADDRESS } else { 0 },
            iv_index: 0,
        });
        Ok(())
    }

    fn start_unprov_beaconing(&mut self, bearers: u8) -> Result<(), StackError> {
        info!("sim: beaconing on bearers 0x{:x}, provisioner found", bearers);
        self.provisioned = true;
        self.queue.post(StackEvent::ProvisioningStarted);
        self.queue.post(StackEvent::Provisioned {
            address: SIM_NODE_ADDRESS,
            iv_index: 0,
        });
        Ok(())
    }

    fn generic_server_init(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    fn friend_init(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    fn generic_client_init(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    fn lpn_init(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    fn lpn_configure(&mut self, _queue_len: u8, _poll_timeout_ms: u32) -> Result<(), StackError> {
        Ok(())
    }

    fn lpn_establish_friendship(&mut self, _netkey_index: u16) -> Result<(), StackError> {
        self.queue.post(StackEvent::FriendshipEstablished {
            friend_address: SIM_FRIEND_ADDRESS,
        });
        Ok(())
    }

    fn lpn_terminate_friendship(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    fn lpn_deinit(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    fn set_soft_timer(&mut self, ms: u32, id: TimerId, single_shot: bool) -> Result<(), StackError> {
        self.timers.retain(|t| t.id != id);
        if ms > 0 {
            self.timers.push(ArmedTimer {
                id,
                period_ms: ms,
                single_shot,
                due_ms: self.now_ms + u64::from(ms),
            });
        }
        Ok(())
    }

    fn system_reset(&mut self, mode: ResetMode) {
        info!("sim: system reset ({:?})", mode);
        self.reset = Some(mode);
    }

    fn connection_close(&mut self, handle: u8) -> Result<(), StackError> {
        self.queue.post(StackEvent::ConnectionClosed {
            handle,
            reason: 0x0216,
        });
        Ok(())
    }

    fn gatt_write_response(&mut self, _connection: u8, _characteristic: u16, _status: u8) -> Result<(), StackError> {
        Ok(())
    }

    fn bt_address(&mut self) -> [u8; 6] {
        self.address
    }

    fn write_device_name(&mut self, name: &str) -> Result<(), StackError> {
        self.device_name = name.to_owned();
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Generic models
// ───────────────────────────────────────────────────────────────

/// Encode a request in the payload layout [`SimModels`] decodes.
pub fn encode_request(request: GenericRequest) -> heapless::Vec<u8, 16> {
    let mut payload = heapless::Vec::new();
    match request {
        GenericRequest::OnOff(on) => {
            let _ = payload.extend_from_slice(&[0, u8::from(on)]);
        }
        GenericRequest::Level(level) => {
            let [lo, hi] = level.to_le_bytes();
            let _ = payload.extend_from_slice(&[1, lo, hi]);
        }
    }
    payload
}

fn decode_request(payload: &[u8]) -> Option<GenericRequest> {
    match payload {
        [0, on, ..] => Some(GenericRequest::OnOff(*on != 0)),
        [1, lo, hi, ..] => Some(GenericRequest::Level(i16::from_le_bytes([*lo, *hi]))),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publication {
    pub model_id: u16,
    pub transaction_id: u8,
    pub request: GenericRequest,
}

#[derive(Debug, Default)]
pub struct SimModels {
    servers: Vec<(u16, u16)>,
    clients: Vec<(u16, u16)>,
    states: Vec<(u16, GenericState)>,
    published: Vec<Publication>,
}

impl SimModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> &[Publication] {
        &self.published
    }

    /// Last state stored for `model_id`.
    pub fn state(&self, model_id: u16) -> Option<GenericState> {
        self.states
            .iter()
            .rev()
            .find(|(m, _)| *m == model_id)
            .map(|(_, s)| *s)
    }
}

impl GenericModels for SimModels {
    fn init(&mut self, _max_models: u8) -> Result<(), StackError> {
        Ok(())
    }

    fn register_server(&mut self, model_id: u16, element_index: u16) -> Result<(), StackError> {
        self.servers.push((model_id, element_index));
        Ok(())
    }

    fn register_client(&mut self, model_id: u16, element_index: u16) -> Result<(), StackError> {
        self.clients.push((model_id, element_index));
        Ok(())
    }

    fn server_event(&mut self, event: &ModelEvent) -> Option<ModelCallback> {
        if !self.servers.contains(&(event.model_id, event.element_index)) {
            return None;
        }
        let request = decode_request(&event.payload)?;
        Some(ModelCallback::Request(ServerRequest {
            model_id: event.model_id,
            element_index: event.element_index,
            client_address: event.client_address,
            server_address: event.server_address,
            request,
            transition_ms: 0,
            delay_ms: 0,
            flags: 0,
        }))
    }

    fn update_state(
        &mut self,
        model_id: u16,
        _element_index: u16,
        current: GenericState,
        _remaining_ms: u32,
    ) -> Result<(), StackError> {
        self.states.push((model_id, current));
        Ok(())
    }

    fn publish_state(&mut self, _model_id: u16, _element_index: u16) -> Result<(), StackError> {
        Ok(())
    }

    fn client_publish(
        &mut self,
        model_id: u16,
        element_index: u16,
        transaction_id: u8,
        request: GenericRequest,
        _transition_ms: u32,
        _delay_ms: u16,
        _flags: u8,
    ) -> Result<(), StackError> {
        if !self.clients.contains(&(model_id, element_index)) {
            return Err(StackError(0x0181));
        }
        info!("sim: publish {:?} (tid {})", request, transaction_id);
        self.published.push(Publication {
            model_id,
            transaction_id,
            request,
        });
        Ok(())
    }
}
