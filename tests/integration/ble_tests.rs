//! BLE notify transport and reconnect handling.

use cardinal_grip::app::events::AppEvent;
use cardinal_grip::scheduler::MainLoop;

use crate::mocks::{Rig, tick_until};

#[test]
fn disconnect_restarts_advertising_once() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let settle = dev.config().ble.settle_ms;
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.ble.state.borrow_mut().connected = true;
    main.tick(&mut dev);
    rig.ble.state.borrow_mut().connected = false;

    rig.clock.delays.borrow_mut().clear();
    let report = main.tick(&mut dev);
    assert!(report.readvertised);
    assert!(rig.clock.delays.borrow().contains(&settle));

    for _ in 0..20 {
        assert!(!main.tick(&mut dev).readvertised);
    }
    assert_eq!(rig.ble.state.borrow().readvertised, 1);

    let events = rig.sink.events.borrow();
    assert!(events.contains(&AppEvent::BleConnected));
    assert!(events.contains(&AppEvent::BleDisconnected));
}

#[test]
fn steady_states_never_readvertise() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    for _ in 0..20 {
        main.tick(&mut dev);
    }
    rig.ble.state.borrow_mut().connected = true;
    for _ in 0..20 {
        main.tick(&mut dev);
    }
    assert_eq!(rig.ble.state.borrow().readvertised, 0);
}

#[test]
fn notifications_only_while_connected() {
    let rig = Rig::new();
    *rig.adc.values.borrow_mut() = [10, 20, 30, 40];
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    tick_until(&mut main, &mut dev, 50, |r| r.sampled).expect("sample");
    assert!(rig.ble.state.borrow().notifications.is_empty());

    rig.ble.state.borrow_mut().connected = true;
    tick_until(&mut main, &mut dev, 50, |r| r.sampled).expect("sample");
    assert_eq!(
        rig.ble.state.borrow().notifications.last().map(Vec::as_slice),
        Some(&b"10,20,30,40"[..])
    );
}

#[test]
fn failed_stack_init_leaves_ble_off() {
    let rig = Rig::new();
    rig.ble.state.borrow_mut().init_fails = true;
    rig.ble.state.borrow_mut().connected = true;
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    assert!(!dev.ble_ready());
    for _ in 0..50 {
        main.tick(&mut dev);
    }
    assert!(rig.ble.state.borrow().notifications.is_empty());
    assert!(rig.sink.events.borrow().contains(&AppEvent::Booted {
        wifi: true,
        ble: false
    }));
}
