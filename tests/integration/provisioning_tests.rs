//! Provisioning over the portal and the JSON API, through a reboot.

use cardinal_grip::app::credentials::{KEY_PASS, KEY_SSID, NAMESPACE};
use cardinal_grip::app::events::AppEvent;
use cardinal_grip::app::http::{PostAction, TEXT_HTML};
use cardinal_grip::scheduler::MainLoop;

use crate::mocks::{Rig, tick_until};

fn serve(rig: &Rig, main: &mut MainLoop, dev: &mut cardinal_grip::device::Device) {
    let before = rig.http.replies();
    main.tick(dev);
    assert_eq!(rig.http.replies(), before + 1, "request was not served");
}

#[test]
fn api_config_saves_replies_and_reboots() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http
        .post_form("/api/wifi/config", "ssid=lab&password=secret12");
    let sent_at = rig.clock.now.get();
    serve(&rig, &mut main, &mut dev);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"status":"ok","ssid":"lab"}"#);
    assert!(matches!(reply.after, Some(PostAction::Reboot { .. })));
    assert!(main.pending_reboot().is_some());
    assert_eq!(rig.storage.value(NAMESPACE, KEY_SSID).as_deref(), Some("lab"));
    assert_eq!(
        rig.storage.value(NAMESPACE, KEY_PASS).as_deref(),
        Some("secret12")
    );

    let ticks = tick_until(&mut main, &mut dev, 5_000, |r| r.restarted);
    assert!(ticks.is_some(), "device never restarted");
    assert!(rig.clock.now.get() - sent_at <= 2_000);
    assert_eq!(rig.system.restarts.get(), 1);

    // Further ticks do not restart again.
    for _ in 0..50 {
        main.tick(&mut dev);
    }
    assert_eq!(rig.system.restarts.get(), 1);

    let events = rig.sink.events.borrow();
    assert!(events.contains(&AppEvent::CredentialsSaved { ssid: "lab".into() }));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, AppEvent::RebootScheduled { .. }))
    );
}

#[test]
fn saved_credentials_are_used_on_next_boot() {
    let first = Rig::new();
    let mut dev = first.booted();
    let mut main = MainLoop::new(first.clock.now.get());
    first
        .http
        .post_form("/api/wifi/config", "ssid=lab&password=secret12");
    serve(&first, &mut main, &mut dev);

    let second = Rig::with_storage(first.storage.clone());
    second.radio.state.borrow_mut().reachable = Some("lab".into());
    let mut dev = second.booted();
    let mut main = MainLoop::new(second.clock.now.get());

    assert_eq!(
        second.radio.state.borrow().attempts.first(),
        Some(&("lab".to_string(), "secret12".to_string()))
    );

    second.http.get("/api/wifi/status");
    serve(&second, &mut main, &mut dev);
    assert_eq!(
        second.http.last_reply().map(|r| r.body),
        Some(
            r#"{"mode":"ap_sta","sta_connected":true,"sta_ssid":"lab","sta_ip":"192.168.1.50","ap_ssid":"CardinalGrip_AP","ap_ip":"192.168.4.1","stored_ssid":"lab"}"#
                .to_string()
        )
    );
}

#[test]
fn empty_ssid_is_rejected_without_side_effects() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http.post_form("/api/wifi/config", "ssid=&password=x");
    serve(&rig, &mut main, &mut dev);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, r#"{"status":"error","error":"ssid_required"}"#);
    assert_eq!(reply.after, None);
    assert!(main.pending_reboot().is_none());
    assert_eq!(rig.storage.value(NAMESPACE, KEY_SSID), None);
}

#[test]
fn overlong_password_is_rejected() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    let body = format!("ssid=lab&password={}", "p".repeat(65));
    rig.http.post_form("/api/wifi/config", &body);
    serve(&rig, &mut main, &mut dev);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.status, 400);
    assert_eq!(
        reply.body,
        r#"{"status":"error","error":"password_too_long"}"#
    );
}

#[test]
fn failed_save_still_replies_ok_and_reboots() {
    let rig = Rig::new();
    rig.storage.fail_writes.set(true);
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http.post_form("/api/wifi/config", "ssid=lab&password=pw");
    serve(&rig, &mut main, &mut dev);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.status, 200);
    assert!(main.pending_reboot().is_some());
    assert_eq!(rig.storage.value(NAMESPACE, KEY_SSID), None);
}

#[test]
fn forget_clears_and_is_idempotent() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());
    rig.storage
        .data
        .borrow_mut()
        .entry(NAMESPACE.into())
        .or_default()
        .insert(KEY_SSID.into(), "old".into());

    for _ in 0..2 {
        rig.http.push(
            cardinal_grip::app::http::Method::Post,
            "/api/wifi/forget",
            None,
            Vec::new(),
        );
        serve(&rig, &mut main, &mut dev);
        let reply = rig.http.last_reply().expect("reply");
        assert_eq!(reply.body, r#"{"status":"ok"}"#);
        assert_eq!(reply.after, None);
        assert_eq!(rig.storage.value(NAMESPACE, KEY_SSID), None);
    }
    assert!(main.pending_reboot().is_none());

    rig.http.get("/api/wifi/status");
    serve(&rig, &mut main, &mut dev);
    let body = rig.http.last_reply().map(|r| r.body).unwrap_or_default();
    assert!(body.ends_with(r#""stored_ssid":null}"#));
}

#[test]
fn portal_form_save_schedules_reboot() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http.post_form("/wifi", "ssid=my+net&password=pa%24%24word");
    serve(&rig, &mut main, &mut dev);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.content_type, TEXT_HTML);
    assert!(reply.body.contains("my net"));
    assert_eq!(
        reply.after,
        Some(PostAction::Reboot {
            grace_ms: dev.config().reboot.portal_grace_ms
        })
    );
    assert_eq!(
        rig.storage.value(NAMESPACE, KEY_PASS).as_deref(),
        Some("pa$$word")
    );
}

#[test]
fn portal_form_without_ssid_is_plain_400() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http.post_form("/wifi", "password=x");
    serve(&rig, &mut main, &mut dev);

    let reply = rig.http.last_reply().expect("reply");
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, "SSID required");
}

#[test]
fn scan_and_portal_escape_network_names() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http.get("/api/wifi/scan");
    serve(&rig, &mut main, &mut dev);
    assert_eq!(
        rig.http.last_reply().map(|r| r.body).as_deref(),
        Some(r#"[{"ssid":"Lab<5G>","rssi":-55,"secure":true}]"#)
    );

    rig.http.get("/wifi");
    serve(&rig, &mut main, &mut dev);
    let page = rig.http.last_reply().map(|r| r.body).unwrap_or_default();
    assert!(page.contains("Lab&lt;5G&gt;"));
    assert!(!page.contains("Lab<5G>"));
}

#[test]
fn unknown_route_is_404() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http.get("/nope");
    serve(&rig, &mut main, &mut dev);
    assert_eq!(rig.http.last_reply().map(|r| r.status), Some(404));
}

#[test]
fn requests_wait_while_reboot_is_pending() {
    let rig = Rig::new();
    let mut dev = rig.booted();
    let mut main = MainLoop::new(rig.clock.now.get());

    rig.http.post_form("/api/wifi/config", "ssid=lab&password=x");
    serve(&rig, &mut main, &mut dev);
    rig.http.get("/api/wifi/status");
    main.tick(&mut dev);
    assert_eq!(rig.http.replies(), 1);
}
