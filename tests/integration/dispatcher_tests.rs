//! End-to-end dispatcher scenarios against recording mocks.

use meshnode::alarm::{ALARM_CLEARED, ALARM_SET};
use meshnode::app::events::StackEvent;
use meshnode::app::ports::{
    DisplayRow, GATT_OTA_CONTROL, GenericRequest, ModelCallback, ModelEvent, ResetMode,
    ServerRequest, TimerId, model_id,
};
use meshnode::app::role::{FriendServerRole, LowPowerClientRole, RoleStrategy};
use meshnode::app::service::MeshDispatcher;
use meshnode::config::NodeConfig;
use meshnode::events::SIGNAL_SENSOR_WAKE;
use meshnode::pins::{SIGNAL_BUTTON_A_PRESSED, SIGNAL_BUTTON_A_RELEASED, SIGNAL_BUTTON_B_PRESSED};

use crate::mock_ports::{MockPorts, ModelCall, StackCall};

// ── Helpers ───────────────────────────────────────────────────

fn server() -> (MeshDispatcher<FriendServerRole>, MockPorts) {
    let config = NodeConfig::default();
    let role = FriendServerRole::new(&config);
    (MeshDispatcher::new(config, role), MockPorts::new())
}

fn client() -> (MeshDispatcher<LowPowerClientRole>, MockPorts) {
    let config = NodeConfig::low_power_client();
    let role = LowPowerClientRole::new(&config);
    (MeshDispatcher::new(config, role), MockPorts::new())
}

fn send<R: RoleStrategy>(d: &mut MeshDispatcher<R>, m: &mut MockPorts, event: StackEvent) {
    d.handle_event(Some(&event), &mut m.ports());
}

fn boot_provisioned<R: RoleStrategy>(d: &mut MeshDispatcher<R>, m: &mut MockPorts) {
    send(d, m, StackEvent::SystemBoot);
    send(
        d,
        m,
        StackEvent::NodeInitialized {
            provisioned: true,
            address: 0x0001,
            iv_index: 0,
        },
    );
}

fn raw_event() -> ModelEvent {
    ModelEvent {
        model_id: model_id::GENERIC_LEVEL_SERVER,
        element_index: 0,
        client_address: 0,
        server_address: 0x0001,
        appkey_index: 0,
        payload: heapless::Vec::new(),
    }
}

fn level_from(
    d: &mut MeshDispatcher<FriendServerRole>,
    m: &mut MockPorts,
    source: u16,
    level: i16,
) {
    m.models.next_callback = Some(ModelCallback::Request(ServerRequest {
        model_id: model_id::GENERIC_LEVEL_SERVER,
        element_index: 0,
        client_address: source,
        server_address: 0x0001,
        request: GenericRequest::Level(level),
        transition_ms: 0,
        delay_ms: 0,
        flags: 0,
    }));
    send(d, m, StackEvent::GenericServerRequest(raw_event()));
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_shows_identity_and_starts_node() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::SystemBoot);

    assert_eq!(m.display.row(DisplayRow::Name), "Friend Node");
    assert_eq!(m.display.row(DisplayRow::BtAddress), "06:05:04:03:02:01");
    assert_eq!(m.display.row(DisplayRow::Connection), "Booting");
    assert!(m
        .stack
        .calls
        .contains(&StackCall::WriteDeviceName("Friend Node - 02:01".to_owned())));
    assert_eq!(m.stack.timers_armed(), vec![(1000, TimerId::DisplayRefresh, false)]);
    assert!(m.buttons.interrupts_enabled);
    assert_eq!(m.stack.count(&StackCall::NodeInit), 1);
}

#[test]
fn unprovisioned_node_starts_beaconing() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::SystemBoot);
    send(
        &mut d,
        &mut m,
        StackEvent::NodeInitialized {
            provisioned: false,
            address: 0,
            iv_index: 0,
        },
    );
    assert_eq!(m.display.row(DisplayRow::Connection), "Initialized");
    assert_eq!(m.stack.count(&StackCall::StartUnprovBeaconing(0x3)), 1);
    assert!(!d.provisioned());
}

#[test]
fn button_held_at_boot_factory_resets() {
    let (mut d, mut m) = server();
    m.buttons.b = true;
    m.flash.preset(0x4004, 0x07);

    send(&mut d, &mut m, StackEvent::SystemBoot);

    assert_eq!(m.flash.erases(), 1);
    assert_eq!(m.flash.get(0x4004), None);
    assert_eq!(m.display.row(DisplayRow::Alarm(1)), "FACTORY RESET");
    assert_eq!(m.display.row(DisplayRow::Alarm(0)), "*************");
    assert_eq!(m.stack.count(&StackCall::NodeInit), 0);
    assert!(!m.buttons.interrupts_enabled);
    assert!(m
        .stack
        .timers_armed()
        .contains(&(2000, TimerId::FactoryReset, true)));

    send(&mut d, &mut m, StackEvent::SoftTimer(TimerId::FactoryReset));
    assert_eq!(m.stack.resets(), vec![ResetMode::Normal]);
}

#[test]
fn stack_command_failures_do_not_stop_boot() {
    let (mut d, mut m) = server();
    m.stack.fail_with = Some(0x0181);
    send(&mut d, &mut m, StackEvent::SystemBoot);
    assert_eq!(m.stack.count(&StackCall::NodeInit), 1);
    assert_eq!(m.display.row(DisplayRow::Connection), "Booting");
}

#[test]
fn display_refresh_timer_refreshes_display() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::SoftTimer(TimerId::DisplayRefresh));
    send(&mut d, &mut m, StackEvent::SoftTimer(TimerId::DisplayRefresh));
    assert_eq!(m.display.refreshes, 2);
    assert!(m.stack.resets().is_empty());
}

// ── Provisioning ──────────────────────────────────────────────

#[test]
fn server_boot_provisioned_loads_alarms_and_registers_models() {
    let (mut d, mut m) = server();
    m.flash.preset(0x4004, 0x05);

    boot_provisioned(&mut d, &mut m);

    assert!(d.provisioned());
    assert_eq!(d.node_address(), Some(0x0001));
    assert_eq!(m.display.row(DisplayRow::Action), "Provisioned");
    assert_eq!(m.stack.count(&StackCall::GenericServerInit), 1);
    assert_eq!(m.stack.count(&StackCall::FriendInit), 1);
    assert!(m.models.calls.contains(&ModelCall::Init(9)));
    assert!(m
        .models
        .calls
        .contains(&ModelCall::RegisterServer(model_id::GENERIC_ON_OFF_SERVER)));
    assert!(m
        .models
        .calls
        .contains(&ModelCall::RegisterServer(model_id::GENERIC_LEVEL_SERVER)));

    assert_eq!(d.role().alarms().value(), 0x05);
    assert_eq!(m.display.row(DisplayRow::Alarm(0)), "MOT: ALARM");
    assert_eq!(m.display.row(DisplayRow::Alarm(1)), "-");
    assert_eq!(m.display.row(DisplayRow::Alarm(2)), "UVLT: ALARM");
    assert_eq!(m.flash.saves(), 0);
}

#[test]
fn server_first_boot_repairs_alarm_record_once() {
    let (mut d, mut m) = server();
    boot_provisioned(&mut d, &mut m);
    assert_eq!(d.role().alarms().value(), 0);
    assert_eq!(m.flash.saves(), 1);
    assert_eq!(m.flash.get(0x4004), Some(0));
}

#[test]
fn provisioning_flow_reaches_role_init() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::ProvisioningStarted);
    assert_eq!(m.display.row(DisplayRow::Action), "Provisioning");
    send(
        &mut d,
        &mut m,
        StackEvent::Provisioned {
            address: 0x0005,
            iv_index: 0,
        },
    );
    assert_eq!(m.display.row(DisplayRow::Action), "Provisioned");
    assert_eq!(d.node_address(), Some(0x0005));
    assert_eq!(m.stack.count(&StackCall::GenericServerInit), 1);
}

#[test]
fn provisioning_failure_reboots_after_delay() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::ProvisioningFailed { reason: 0x0e });
    assert_eq!(m.display.row(DisplayRow::Action), "Provisioning Failed");
    assert_eq!(m.stack.timers_armed(), vec![(1000, TimerId::Restart, true)]);
    assert!(m.stack.resets().is_empty());

    send(&mut d, &mut m, StackEvent::SoftTimer(TimerId::Restart));
    assert_eq!(m.stack.resets(), vec![ResetMode::Normal]);
}

#[test]
fn node_reset_erases_and_schedules_reboot() {
    let (mut d, mut m) = server();
    boot_provisioned(&mut d, &mut m);
    send(&mut d, &mut m, StackEvent::ConnectionOpened { handle: 2 });
    send(&mut d, &mut m, StackEvent::NodeReset);

    assert_eq!(m.flash.erases(), 1);
    assert_eq!(m.stack.count(&StackCall::ConnectionClose(2)), 1);
    assert_eq!(d.connection().handle, None);
    assert!(m
        .stack
        .timers_armed()
        .contains(&(2000, TimerId::FactoryReset, true)));
}

#[test]
fn node_reset_forgets_provisioning_and_latched_alarms() {
    let (mut d, mut m) = server();
    boot_provisioned(&mut d, &mut m);
    level_from(&mut d, &mut m, 0x0003, ALARM_SET);
    assert_eq!(d.role().alarms().value(), 0x02);

    send(&mut d, &mut m, StackEvent::NodeReset);

    assert!(!d.provisioned());
    assert_eq!(d.node_address(), None);
    assert!(!d.friendship_active());
    // Memory matches the erased store.
    assert_eq!(d.role().alarms().value(), 0);
    assert_eq!(m.flash.get(NodeConfig::default().alarm_flash_key), None);
}

#[test]
fn node_reset_stops_client_publishing() {
    let (mut d, mut m) = client();
    boot_provisioned(&mut d, &mut m);
    d.on_temperature(21.0, &mut m.ports());
    assert_eq!(d.role().transaction_id(), 1);

    send(&mut d, &mut m, StackEvent::NodeReset);
    assert_eq!(d.role().transaction_id(), 0);

    d.on_temperature(22.0, &mut m.ports());
    assert_eq!(m.models.publications().len(), 1);
}

#[test]
fn boot_drops_in_memory_alarm_state() {
    let (mut d, mut m) = server();
    boot_provisioned(&mut d, &mut m);
    level_from(&mut d, &mut m, 0x0002, ALARM_SET);
    assert_eq!(d.role().alarms().value(), 0x01);

    // Reboot without reaching mesh init: nothing reloaded yet.
    send(&mut d, &mut m, StackEvent::SystemBoot);
    assert_eq!(d.role().alarms().value(), 0);
    assert!(!d.provisioned());

    // The persisted byte comes back once the node initialises.
    send(
        &mut d,
        &mut m,
        StackEvent::NodeInitialized {
            provisioned: true,
            address: 0x0001,
            iv_index: 0,
        },
    );
    assert_eq!(d.role().alarms().value(), 0x01);
}

// ── Connections ───────────────────────────────────────────────

#[test]
fn client_open_close_reinits_lpn_exactly_once() {
    let (mut d, mut m) = client();
    boot_provisioned(&mut d, &mut m);
    assert_eq!(m.stack.count(&StackCall::LpnInit), 1);
    assert_eq!(
        m.stack.count(&StackCall::LpnConfigure {
            queue_len: 2,
            poll_timeout_ms: 5000
        }),
        1
    );
    send(&mut d, &mut m, StackEvent::FriendshipEstablished { friend_address: 0x10 });
    assert!(d.friendship_active());

    send(&mut d, &mut m, StackEvent::ConnectionOpened { handle: 1 });
    assert_eq!(m.display.row(DisplayRow::Connection), "Connected");
    assert_eq!(m.display.row(DisplayRow::Connections), "Connections: 1");
    assert_eq!(m.stack.count(&StackCall::LpnTerminateFriendship), 1);
    assert_eq!(m.stack.count(&StackCall::LpnDeinit), 1);
    assert!(!d.friendship_active());

    send(&mut d, &mut m, StackEvent::ConnectionClosed { handle: 1, reason: 0x13 });
    assert_eq!(m.display.row(DisplayRow::Connection), "Disconnected");
    assert_eq!(m.display.row(DisplayRow::Connections), "Connections: 0");
    assert_eq!(m.stack.count(&StackCall::LpnInit), 2);
    assert_eq!(d.connection().handle, None);
}

#[test]
fn client_waits_for_last_connection_before_lpn_restart() {
    let (mut d, mut m) = client();
    boot_provisioned(&mut d, &mut m);

    send(&mut d, &mut m, StackEvent::ConnectionOpened { handle: 1 });
    send(&mut d, &mut m, StackEvent::ConnectionOpened { handle: 2 });
    send(&mut d, &mut m, StackEvent::ConnectionClosed { handle: 2, reason: 0 });
    assert_eq!(m.stack.count(&StackCall::LpnInit), 1);
    send(&mut d, &mut m, StackEvent::ConnectionClosed { handle: 1, reason: 0 });
    assert_eq!(m.stack.count(&StackCall::LpnInit), 2);
}

#[test]
fn connection_count_saturates_at_zero() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::ConnectionClosed { handle: 1, reason: 0 });
    assert_eq!(d.connection().count, 0);
    assert_eq!(m.display.row(DisplayRow::Connections), "Connections: 0");
}

#[test]
fn server_connections_leave_lpn_alone() {
    let (mut d, mut m) = server();
    boot_provisioned(&mut d, &mut m);
    send(&mut d, &mut m, StackEvent::ConnectionOpened { handle: 1 });
    send(&mut d, &mut m, StackEvent::ConnectionClosed { handle: 1, reason: 0 });
    assert_eq!(m.stack.count(&StackCall::LpnInit), 0);
    assert_eq!(m.stack.count(&StackCall::LpnDeinit), 0);
}

// ── Friendship ────────────────────────────────────────────────

#[test]
fn friendship_failed_arms_exactly_one_retry() {
    let (mut d, mut m) = client();
    boot_provisioned(&mut d, &mut m);
    send(&mut d, &mut m, StackEvent::ConnectionOpened { handle: 4 });
    let before = m.stack.timers_armed().len();
    let connection = d.connection();

    send(&mut d, &mut m, StackEvent::FriendshipFailed { reason: 0x0d });

    let armed = m.stack.timers_armed();
    assert_eq!(armed.len(), before + 1);
    assert_eq!(armed.last(), Some(&(2000, TimerId::FriendFind, true)));
    assert_eq!(m.display.row(DisplayRow::Connection), "Friend FAILED");
    assert!(d.provisioned());
    assert_eq!(d.connection(), connection);
}

#[test]
fn friendship_terminated_also_retries() {
    let (mut d, mut m) = client();
    boot_provisioned(&mut d, &mut m);
    send(&mut d, &mut m, StackEvent::FriendshipEstablished { friend_address: 0x10 });
    assert_eq!(m.display.row(DisplayRow::Connection), "Friend EST.");

    send(&mut d, &mut m, StackEvent::FriendshipTerminated { reason: 0 });
    assert_eq!(m.display.row(DisplayRow::Connection), "Friend TERM.");
    assert!(!d.friendship_active());
    assert_eq!(
        m.stack.timers_armed().last(),
        Some(&(2000, TimerId::FriendFind, true))
    );

    let establishes = m.stack.count(&StackCall::LpnEstablishFriendship);
    send(&mut d, &mut m, StackEvent::SoftTimer(TimerId::FriendFind));
    assert_eq!(m.stack.count(&StackCall::LpnEstablishFriendship), establishes + 1);
}

// ── OTA ───────────────────────────────────────────────────────

#[test]
fn ota_control_write_reboots_into_dfu_on_close() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::ConnectionOpened { handle: 3 });
    send(
        &mut d,
        &mut m,
        StackEvent::GattWriteRequest {
            connection: 3,
            characteristic: GATT_OTA_CONTROL,
        },
    );
    assert!(d.boot_to_dfu());
    assert_eq!(
        m.stack.count(&StackCall::GattWriteResponse {
            connection: 3,
            characteristic: GATT_OTA_CONTROL,
            status: 0
        }),
        1
    );
    assert_eq!(m.stack.count(&StackCall::ConnectionClose(3)), 1);

    send(&mut d, &mut m, StackEvent::ConnectionClosed { handle: 3, reason: 0x16 });
    assert_eq!(m.stack.resets(), vec![ResetMode::Dfu]);
}

#[test]
fn other_characteristic_writes_are_ignored() {
    let (mut d, mut m) = server();
    send(
        &mut d,
        &mut m,
        StackEvent::GattWriteRequest {
            connection: 3,
            characteristic: 0x0020,
        },
    );
    assert!(!d.boot_to_dfu());
    assert!(m.stack.calls.is_empty());
}

// ── Alarms (server) ───────────────────────────────────────────

#[test]
fn alarm_set_latches_and_persists() {
    let (mut d, mut m) = server();
    boot_provisioned(&mut d, &mut m);

    level_from(&mut d, &mut m, 0x0003, ALARM_SET);
    assert_eq!(m.display.row(DisplayRow::Alarm(1)), "ALT: ALARM");
    assert_eq!(m.flash.get(0x4004), Some(0x02));
    assert!(m.models.calls.contains(&ModelCall::UpdateState {
        model_id: model_id::GENERIC_LEVEL_SERVER,
        current: GenericRequest::Level(ALARM_SET),
    }));

    // Latched alarms keep showing ALARM over plain levels.
    level_from(&mut d, &mut m, 0x0003, 55);
    assert_eq!(m.display.row(DisplayRow::Alarm(1)), "ALT: ALARM");

    level_from(&mut d, &mut m, 0x0003, ALARM_CLEARED);
    assert_eq!(m.display.row(DisplayRow::Alarm(1)), "ALT: ALARM CLEARED");
    assert_eq!(m.flash.get(0x4004), Some(0x00));

    level_from(&mut d, &mut m, 0x0003, 42);
    assert_eq!(m.display.row(DisplayRow::Alarm(1)), "ALT (%): 42");
}

#[test]
fn level_from_unknown_source_changes_nothing() {
    let (mut d, mut m) = server();
    boot_provisioned(&mut d, &mut m);
    let saves = m.flash.saves();
    level_from(&mut d, &mut m, 0x0042, ALARM_SET);
    assert_eq!(d.role().alarms().value(), 0);
    assert_eq!(m.flash.saves(), saves);
}

#[test]
fn server_event_without_callback_is_forwarded_only() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::GenericServerStateChanged(raw_event()));
    assert_eq!(m.models.server_events, 1);
    assert!(m.models.calls.is_empty());
}

#[test]
fn button_a_clears_alarms() {
    let (mut d, mut m) = server();
    m.flash.preset(0x4004, 0x03);
    boot_provisioned(&mut d, &mut m);

    m.buttons.a = true;
    send(&mut d, &mut m, StackEvent::ExternalSignal(SIGNAL_BUTTON_A_PRESSED));
    assert_eq!(d.role().alarms().value(), 0);
    assert_eq!(m.flash.get(0x4004), Some(0));
    assert_eq!(m.display.row(DisplayRow::Alarm(0)), "-");
    assert_eq!(m.display.row(DisplayRow::Alarm(1)), "-");
}

#[test]
fn button_b_toggles_display_and_reprints() {
    let (mut d, mut m) = server();
    m.flash.preset(0x4004, 0x01);
    boot_provisioned(&mut d, &mut m);

    m.buttons.b = true;
    send(&mut d, &mut m, StackEvent::ExternalSignal(SIGNAL_BUTTON_B_PRESSED));
    assert!(!m.display.enabled);

    m.display.rows.clear();
    send(&mut d, &mut m, StackEvent::ExternalSignal(SIGNAL_BUTTON_B_PRESSED));
    assert!(m.display.enabled);
    assert_eq!(m.display.row(DisplayRow::Alarm(0)), "MOT: ALARM");
}

#[test]
fn button_release_does_nothing_on_server() {
    let (mut d, mut m) = server();
    m.flash.preset(0x4004, 0x01);
    boot_provisioned(&mut d, &mut m);
    send(&mut d, &mut m, StackEvent::ExternalSignal(SIGNAL_BUTTON_A_RELEASED));
    assert_eq!(d.role().alarms().value(), 0x01);
}

// ── Client publishing ─────────────────────────────────────────

#[test]
fn client_button_publishes_on_off_with_rolling_tid() {
    let (mut d, mut m) = client();
    boot_provisioned(&mut d, &mut m);

    m.buttons.a = true;
    send(&mut d, &mut m, StackEvent::ExternalSignal(SIGNAL_BUTTON_A_PRESSED));
    m.buttons.a = false;
    send(&mut d, &mut m, StackEvent::ExternalSignal(SIGNAL_BUTTON_A_RELEASED));

    assert_eq!(
        m.models.publications(),
        vec![
            (model_id::GENERIC_ON_OFF_CLIENT, 0, GenericRequest::OnOff(true)),
            (model_id::GENERIC_ON_OFF_CLIENT, 1, GenericRequest::OnOff(false)),
        ]
    );
}

#[test]
fn client_publishes_temperature_in_centidegrees() {
    let (mut d, mut m) = client();
    boot_provisioned(&mut d, &mut m);
    d.on_temperature(23.5, &mut m.ports());
    assert_eq!(m.display.row(DisplayRow::Temperature), "Temp: 23.50 C");
    assert_eq!(
        m.models.publications(),
        vec![(model_id::GENERIC_LEVEL_CLIENT, 0, GenericRequest::Level(2350))]
    );
}

#[test]
fn unprovisioned_client_does_not_publish() {
    let (mut d, mut m) = client();
    d.on_temperature(20.0, &mut m.ports());
    assert!(m.models.publications().is_empty());
    assert_eq!(m.display.row(DisplayRow::Temperature), "Temp: 20.00 C");
}

// ── Ignored input ─────────────────────────────────────────────

#[test]
fn absent_event_is_ignored() {
    let (mut d, mut m) = server();
    d.handle_event(None, &mut m.ports());
    assert!(m.stack.calls.is_empty());
    assert_eq!(m.display.prints, 0);
}

#[test]
fn sensor_wake_and_unknown_events_are_ignored() {
    let (mut d, mut m) = server();
    send(&mut d, &mut m, StackEvent::ExternalSignal(SIGNAL_SENSOR_WAKE));
    send(&mut d, &mut m, StackEvent::Other(0xdead_beef));
    assert!(m.stack.calls.is_empty());
    assert_eq!(m.display.prints, 0);
}
