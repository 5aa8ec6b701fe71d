//! Boot sequence: serial dump, radio bring-up, status API.

use cardinal_grip::adapters::offline::{OfflineRadio, OfflineStorage};
use cardinal_grip::app::events::AppEvent;
use cardinal_grip::app::http::APPLICATION_JSON;
use cardinal_grip::app::radio::{RadioState, StationOutcome};
use cardinal_grip::config::{DefaultCredentials, FeatureFlags, FirmwareConfig};
use cardinal_grip::device::{BOARD_LINE, BOOT_BANNER, Device, SERIAL_START_DELAY_MS};
use cardinal_grip::scheduler::MainLoop;

use crate::mocks::{Rig, tick_until};

#[test]
fn serial_dump_lists_partitions_by_type() {
    let rig = Rig::new();
    let mut dev = rig.device();
    dev.boot();

    assert_eq!(rig.clock.delays.borrow().first(), Some(&SERIAL_START_DELAY_MS));

    let lines = rig.serial.lines.borrow();
    assert_eq!(lines[0], "");
    assert_eq!(lines[1], BOOT_BANNER);
    assert_eq!(lines[2], "===== App partitions =====");
    assert_eq!(
        lines[3],
        "  label=ota_0 type=0 subtype=16 addr=0x010000 size=1572864 bytes"
    );
    assert_eq!(lines[4], "===== Data partitions =====");
    assert_eq!(
        lines[5],
        "  label=nvs type=1 subtype=2 addr=0x009000 size=24576 bytes"
    );
    assert_eq!(lines.last().map(String::as_str), Some(BOARD_LINE));
}

#[test]
fn no_serial_means_no_start_delay() {
    let rig = Rig::new();
    let features = FeatureFlags {
        serial: false,
        ..FeatureFlags::all()
    };
    let mut dev = rig.device_with(features, Rig::placeholder_defaults());
    dev.boot();
    assert!(rig.serial.lines.borrow().is_empty());
    assert!(!rig.clock.delays.borrow().contains(&SERIAL_START_DELAY_MS));
}

#[test]
fn boot_marks_image_valid_and_runs_once() {
    let rig = Rig::new();
    let mut dev = rig.device();
    dev.boot();
    let lines_after_first = rig.serial.lines.borrow().len();
    dev.boot();

    assert!(dev.is_booted());
    assert!(rig.system.marked_valid.get());
    assert_eq!(rig.serial.lines.borrow().len(), lines_after_first);
}

#[test]
fn placeholder_credentials_mean_ap_only() {
    let rig = Rig::new();
    let dev = rig.booted();

    assert_eq!(dev.radio().state(), RadioState::Ready);
    assert_eq!(dev.radio().station_outcome(), StationOutcome::NotAttempted);
    assert!(rig.radio.state.borrow().attempts.is_empty());
    assert_eq!(rig.http.state.borrow().port, Some(80));
    assert_eq!(rig.ws.state.borrow().port, Some(81));
    assert!(rig.mdns.registrations.borrow().is_empty());
}

#[test]
fn boot_events_reach_sink_on_first_tick() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());
    main.tick(&mut dev);

    let events = rig.sink.events.borrow();
    assert!(events.contains(&AppEvent::BleReady));
    assert!(events.contains(&AppEvent::RadioReady));
    assert_eq!(
        events.last(),
        Some(&AppEvent::Booted {
            wifi: true,
            ble: true
        })
    );
}

#[test]
fn status_api_before_provisioning() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http.get("/api/wifi/status");
    main.tick(&mut dev);

    let reply = rig.http.last_reply().expect("status reply");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.content_type, APPLICATION_JSON);
    assert_eq!(
        reply.body,
        r#"{"mode":"ap_sta","sta_connected":false,"ap_ssid":"CardinalGrip_AP","ap_ip":"192.168.4.1","stored_ssid":null}"#
    );
}

#[test]
fn build_default_joins_and_registers_mdns() {
    let rig = Rig::new();
    rig.radio.state.borrow_mut().reachable = Some("office".into());
    let defaults = DefaultCredentials {
        ssid: "office",
        password: "pw123456",
    };
    let mut dev = rig.device_with(FeatureFlags::all(), defaults);
    dev.boot();

    assert_eq!(dev.radio().station_outcome(), StationOutcome::Connected);
    let regs = rig.mdns.registrations.borrow();
    assert_eq!(regs.len(), 1);
    assert_eq!(regs[0].0, "cardinal-grip");
    let ports: Vec<u16> = regs[0].1.iter().map(|s| s.port).collect();
    assert_eq!(ports, vec![80, 81, 3232]);
}

#[test]
fn unreachable_station_times_out_and_ap_stays() {
    let rig = Rig::new();
    let defaults = DefaultCredentials {
        ssid: "office",
        password: "pw123456",
    };
    let mut dev = rig.device_with(FeatureFlags::all(), defaults);
    let before = rig.clock.now.get();
    dev.boot();

    assert_eq!(dev.radio().station_outcome(), StationOutcome::TimedOut);
    assert!(rig.clock.now.get() - before >= 8_000);
    assert_eq!(dev.radio().state(), RadioState::Ready);
    assert!(rig.mdns.registrations.borrow().is_empty());

    let mut main = MainLoop::new(rig.clock.now.get());
    main.tick(&mut dev);
    assert!(rig.sink.events.borrow().contains(&AppEvent::StationTimedOut));
}

#[test]
fn failed_ap_disables_networking() {
    let rig = Rig::new();
    rig.radio.state.borrow_mut().ap_fails = true;
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    assert_eq!(dev.radio().state(), RadioState::Dead);
    assert_eq!(rig.http.state.borrow().port, None);

    rig.http.get("/api/wifi/status");
    main.tick(&mut dev);
    assert_eq!(rig.http.replies(), 0);

    let events = rig.sink.events.borrow();
    assert!(events.contains(&AppEvent::RadioDead));
    assert!(events.contains(&AppEvent::Booted {
        wifi: false,
        ble: true
    }));
}

#[test]
fn wifi_feature_off_skips_radio() {
    let rig = Rig::new();
    let features = FeatureFlags {
        wifi: false,
        ..FeatureFlags::all()
    };
    let mut dev = rig.device_with(features, Rig::placeholder_defaults());
    dev.boot();

    assert_eq!(dev.radio().state(), RadioState::Uninitialized);
    assert!(rig.radio.state.borrow().mode.is_none());
    assert_eq!(rig.ws.state.borrow().port, None);
}

#[test]
fn missing_drivers_still_stream_over_serial() {
    let rig = Rig::new();
    *rig.adc.values.borrow_mut() = [7, 8, 9, 10];
    let mut ports = rig.ports();
    ports.radio = Box::new(OfflineRadio::new());
    ports.storage = Box::new(OfflineStorage::new());
    let mut dev = Device::new(
        FirmwareConfig::default(),
        FeatureFlags::all(),
        DefaultCredentials {
            ssid: "office",
            password: "pw123456",
        },
        ports,
    );
    dev.boot();
    let mut main = MainLoop::new(rig.clock.now.get());

    assert_eq!(dev.radio().state(), RadioState::Dead);
    assert_eq!(rig.http.state.borrow().port, None);
    assert_eq!(rig.ws.state.borrow().port, None);
    assert!(dev.ble_ready());

    tick_until(&mut main, &mut dev, 50, |r| r.sampled).expect("sample");
    assert_eq!(
        rig.serial.lines.borrow().last().map(String::as_str),
        Some("7,8,9,10")
    );
    assert!(rig.sink.events.borrow().contains(&AppEvent::RadioDead));
}
