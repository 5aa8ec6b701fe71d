//! Network upload through the espota listener.

use cardinal_grip::app::espota::Md5Hex;
use cardinal_grip::app::events::AppEvent;
use cardinal_grip::scheduler::MainLoop;
use md5::{Digest, Md5};

use crate::mocks::{Rig, tick_until};

fn image(len: usize) -> Vec<u8> {
    let mut v = vec![0xE9];
    v.extend((1..len).map(|i| (i * 13 % 241) as u8));
    v
}

fn digest(bytes: &[u8]) -> Md5Hex {
    let mut out = Md5Hex::new();
    for b in Md5::digest(bytes) {
        for c in format!("{b:02x}").chars() {
            out.push(c).unwrap();
        }
    }
    out
}

#[test]
fn listener_starts_with_the_radio() {
    let rig = Rig::new();
    let dev = rig.booted();
    assert_eq!(rig.net.state.borrow().port, Some(dev.config().network.ota_port));
}

#[test]
fn network_upload_commits_and_reboots() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());
    let fw = image(6_000);
    rig.net.invite(fw.clone(), digest(&fw));

    main.tick(&mut dev);
    assert_eq!(rig.flash.state.borrow().committed.as_deref(), Some(&fw[..]));
    assert!(main.pending_reboot().is_some());
    assert!(rig.net.replies().ends_with("OK"));

    tick_until(&mut main, &mut dev, 3_000, |r| r.restarted).expect("restart");
    assert_eq!(rig.system.restarts.get(), 1);

    let events = rig.sink.events.borrow();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, AppEvent::OtaStarted { .. }))
    );
    assert!(events.contains(&AppEvent::OtaSucceeded { bytes: 6_000 }));
    assert!(events.contains(&AppEvent::RebootScheduled {
        in_ms: dev.config().reboot.update_grace_ms
    }));
}

#[test]
fn corrupted_upload_is_rejected() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());
    let fw = image(3_000);
    rig.net.invite(fw, digest(b"a different image"));

    for _ in 0..500 {
        main.tick(&mut dev);
    }

    let flash = rig.flash.state.borrow();
    assert!(flash.committed.is_none());
    assert_eq!(flash.aborts, 1);
    drop(flash);
    assert!(main.pending_reboot().is_none());
    assert_eq!(rig.system.restarts.get(), 0);
    assert!(rig.net.replies().ends_with("ERR"));
    assert!(rig.sink.events.borrow().contains(&AppEvent::OtaFailed));
}

#[test]
fn dead_radio_never_serves_uploads() {
    let rig = Rig::new();
    rig.radio.state.borrow_mut().ap_fails = true;
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());
    let fw = image(1_000);
    rig.net.invite(fw.clone(), digest(&fw));

    for _ in 0..50 {
        main.tick(&mut dev);
    }

    assert_eq!(rig.net.state.borrow().port, None);
    assert_eq!(rig.net.state.borrow().pending.len(), 1);
    assert_eq!(rig.net.state.borrow().connects, 0);
    assert!(rig.flash.state.borrow().committed.is_none());
}
