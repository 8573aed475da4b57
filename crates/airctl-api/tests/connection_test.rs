#![allow(clippy::unwrap_used)]

// Drives TransportConnection through connect/disconnect cycles against the
// recording in-memory link.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use airctl_api::{
    ConnectionState, HandlerError, LinkOp, MemoryLink, MessageHandler, TransportConnection,
};
use bytes::Bytes;
use pretty_assertions::assert_eq;

fn setup() -> (Arc<MemoryLink>, TransportConnection) {
    let link = Arc::new(MemoryLink::new());
    let conn = TransportConnection::with_link(link.clone(), None);
    (link, conn)
}

fn published(link: &MemoryLink) -> Vec<(String, String)> {
    link.published()
        .into_iter()
        .map(|(channel, payload)| (channel, String::from_utf8_lossy(&payload).into_owned()))
        .collect()
}

fn collector(log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn MessageHandler> {
    let log = Arc::clone(log);
    Arc::new(move |_: &str, payload: &[u8]| -> Result<(), HandlerError> {
        log.lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    })
}

// ── Offline queue ───────────────────────────────────────────────────

#[test]
fn queued_publishes_flush_in_order_before_new_ones() {
    let (link, conn) = setup();

    conn.publish("aircon/control", Bytes::from_static(b"cmd"));
    conn.publish("aircon/schedule/list", Bytes::from_static(b"1"));
    conn.publish("aircon/schedule/list", Bytes::from_static(b"2"));
    assert_eq!(conn.queued(), 3);
    assert!(link.published().is_empty());

    conn.handle_connected();
    conn.publish("aircon/control", Bytes::from_static(b"after"));

    assert_eq!(
        published(&link),
        vec![
            ("aircon/control".into(), "cmd".into()),
            ("aircon/schedule/list".into(), "1".into()),
            ("aircon/schedule/list".into(), "2".into()),
            ("aircon/control".into(), "after".into()),
        ]
    );
    assert_eq!(conn.queued(), 0);
    assert_eq!(conn.current_state(), ConnectionState::Connected);
}

#[test]
fn interrupted_flush_keeps_order_and_holds_new_publishes() {
    let (link, conn) = setup();
    for n in 1..=4 {
        conn.publish("t", n.to_string().into_bytes());
    }

    link.fail_publishes_after(2);
    conn.handle_connected();
    assert_eq!(conn.queued(), 2);

    // Still flushing: new publishes go behind the remainder.
    conn.publish("t", b"5".to_vec());
    assert_eq!(conn.queued(), 3);

    link.heal();
    conn.resume_flush();
    conn.publish("t", b"6".to_vec());

    let payloads: Vec<String> = published(&link).into_iter().map(|(_, p)| p).collect();
    assert_eq!(payloads, vec!["1", "2", "3", "4", "5", "6"]);
    assert_eq!(conn.queued(), 0);
}

#[test]
fn bounded_queue_drops_oldest() {
    let link = Arc::new(MemoryLink::new());
    let conn = TransportConnection::with_link(link.clone(), NonZeroUsize::new(2));

    conn.publish("t", b"a".to_vec());
    conn.publish("t", b"b".to_vec());
    conn.publish("t", b"c".to_vec());
    conn.handle_connected();

    let payloads: Vec<String> = published(&link).into_iter().map(|(_, p)| p).collect();
    assert_eq!(payloads, vec!["b", "c"]);
}

// ── Subscriptions ───────────────────────────────────────────────────

#[test]
fn reconnect_resubscribes_live_channels_only() {
    let (link, conn) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));

    conn.subscribe("keep", collector(&log));
    let gone = conn.subscribe("gone", collector(&log));
    conn.handle_connected();
    assert!(conn.unsubscribe("gone", gone));

    conn.handle_disconnected();
    link.take();
    conn.handle_connected();

    assert_eq!(link.ops(), vec![LinkOp::Subscribe("keep".into())]);
}

#[test]
fn removing_last_handler_stops_delivery_until_resubscribed() {
    let (_, conn) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));
    conn.handle_connected();

    let id = conn.subscribe("t", collector(&log));
    conn.handle_incoming("t", b"one");
    conn.unsubscribe("t", id);
    conn.handle_incoming("t", b"two");
    conn.subscribe("t", collector(&log));
    conn.handle_incoming("t", b"three");

    assert_eq!(*log.lock().unwrap(), vec!["one", "three"]);
}

#[test]
fn handler_may_unsubscribe_itself_during_dispatch() {
    let (_, conn) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));
    conn.handle_connected();

    let slot: Arc<Mutex<Option<airctl_api::HandlerId>>> = Arc::new(Mutex::new(None));
    let handler: Arc<dyn MessageHandler> = {
        let conn = conn.clone();
        let slot = Arc::clone(&slot);
        let log = Arc::clone(&log);
        Arc::new(move |channel: &str, _: &[u8]| -> Result<(), HandlerError> {
            log.lock().unwrap().push("once".into());
            if let Some(id) = slot.lock().unwrap().take() {
                conn.unsubscribe(channel, id);
            }
            Ok(())
        })
    };
    *slot.lock().unwrap() = Some(conn.subscribe("t", handler));
    conn.subscribe("t", collector(&log));

    conn.handle_incoming("t", b"x");
    conn.handle_incoming("t", b"y");

    assert_eq!(*log.lock().unwrap(), vec!["once", "x", "y"]);
    assert_eq!(conn.handler_count("t"), 1);
}

#[tokio::test]
async fn state_changes_are_observable() {
    let (_, conn) = setup();
    let mut rx = conn.state();

    conn.handle_connected();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);

    conn.handle_disconnected();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
}
