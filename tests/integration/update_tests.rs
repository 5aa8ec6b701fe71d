//! Firmware upload through `POST /update`.

use cardinal_grip::app::events::AppEvent;
use cardinal_grip::app::http::{Method, PostAction};
use cardinal_grip::device::Device;
use cardinal_grip::scheduler::MainLoop;

use crate::mocks::{Rig, tick_until};

const CONTENT_TYPE: &str = "multipart/form-data; boundary=B";

fn body_with(field: &str, image: &[u8], closed: bool) -> Vec<u8> {
    let mut body = format!(
        "--B\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"fw.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(image);
    if closed {
        body.extend_from_slice(b"\r\n--B--\r\n");
    }
    body
}

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn upload(rig: &Rig, body: Vec<u8>, content_type: &str) -> (MainLoop, Device) {
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());
    rig.http.push(Method::Post, "/update", Some(content_type), body);
    main.tick(&mut dev);
    (main, dev)
}

#[test]
fn complete_upload_commits_and_reboots() {
    let rig = Rig::new();
    let fw = image(5_000);
    let (mut main, mut dev) = upload(&rig, body_with("firmware", &fw, true), CONTENT_TYPE);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "OK");
    assert!(reply.close);
    assert_eq!(
        reply.after,
        Some(PostAction::Reboot {
            grace_ms: dev.config().reboot.update_grace_ms
        })
    );
    assert_eq!(rig.flash.state.borrow().committed.as_deref(), Some(&fw[..]));

    tick_until(&mut main, &mut dev, 3_000, |r| r.restarted).expect("restart");
    assert_eq!(rig.system.restarts.get(), 1);

    let events = rig.sink.events.borrow();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, AppEvent::OtaStarted { .. }))
    );
    assert!(events.contains(&AppEvent::OtaSucceeded { bytes: 5_000 }));
}

#[test]
fn truncated_upload_fails_without_reboot() {
    let rig = Rig::new();
    let body = body_with("firmware", &image(3_000), false);
    let (mut main, mut dev) = upload(&rig, body, CONTENT_TYPE);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.body, "FAIL");
    assert_eq!(reply.after, None);
    assert!(main.pending_reboot().is_none());

    let flash = rig.flash.state.borrow();
    assert!(flash.committed.is_none());
    assert!(flash.aborts >= 1);
    drop(flash);

    for _ in 0..2_000 {
        main.tick(&mut dev);
    }
    assert_eq!(rig.system.restarts.get(), 0);
    assert!(rig.sink.events.borrow().contains(&AppEvent::OtaFailed));
}

#[test]
fn client_reset_mid_upload_fails_once() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());
    let body = body_with("firmware", &image(4_000), true);
    rig.http.push_reset("/update", CONTENT_TYPE, body, 2_000);
    main.tick(&mut dev);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.body, "FAIL");
    assert_eq!(reply.after, None);
    assert!(main.pending_reboot().is_none());

    let flash = rig.flash.state.borrow();
    assert!(flash.committed.is_none());
    assert!(!flash.open);
    assert_eq!(flash.aborts, 1);
    drop(flash);

    for _ in 0..2_000 {
        main.tick(&mut dev);
    }
    assert_eq!(rig.system.restarts.get(), 0);
    let events = rig.sink.events.borrow();
    assert_eq!(events.iter().filter(|e| **e == AppEvent::OtaFailed).count(), 1);
}

#[test]
fn image_larger_than_region_fails() {
    let rig = Rig::new();
    rig.flash.state.borrow_mut().capacity = 0x2000;
    let body = body_with("firmware", &image(0x1800), true);
    let (main, _dev) = upload(&rig, body, CONTENT_TYPE);

    assert_eq!(rig.http.last_reply().map(|r| r.body).as_deref(), Some("FAIL"));
    assert!(main.pending_reboot().is_none());
    assert!(rig.flash.state.borrow().committed.is_none());
}

#[test]
fn upload_without_firmware_part_fails() {
    let rig = Rig::new();
    let (main, _dev) = upload(&rig, body_with("notes", b"hello", true), CONTENT_TYPE);

    assert_eq!(rig.http.last_reply().map(|r| r.body).as_deref(), Some("FAIL"));
    assert!(main.pending_reboot().is_none());
    assert_eq!(rig.flash.state.borrow().committed, None);
}

#[test]
fn non_multipart_request_fails() {
    let rig = Rig::new();
    let (main, _dev) = upload(&rig, image(64), "application/octet-stream");

    assert_eq!(rig.http.last_reply().map(|r| r.body).as_deref(), Some("FAIL"));
    assert!(main.pending_reboot().is_none());
}

#[test]
fn update_form_is_served() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());
    rig.http.get("/update");
    main.tick(&mut dev);

    let page = rig.http.last_reply().map(|r| r.body).unwrap_or_default();
    assert!(page.contains("enctype='multipart/form-data'"));
    assert!(page.contains("name='firmware'"));
}
