//! Tests for the send failure path: error translation, the process-wide
//! last-error slot, and FIFO completion matching across mixed outcomes.
//!
//! Kept in a dedicated binary because the last-error slot is process-wide
//! and must not race with other tests that trigger translated failures.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nimbus_net::udp::UdpHandle;
use nimbus_net::{NetError, SendStatus, last_errno};
use parking_lot::Mutex;

async fn wait_for(description: &str, cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {description}");
}

#[tokio::test]
async fn test_oversized_send_fails_in_order_and_records_errno() {
    let receiver = UdpHandle::new().unwrap();
    receiver.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let target = receiver.local_addr().unwrap();

    let sender = UdpHandle::new().unwrap();
    sender.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

    let errors: Arc<Mutex<Vec<NetError>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    sender.error().connect(move |err| {
        errors_clone.lock().push(err.clone());
    });

    // A datagram larger than the UDP maximum cannot be handed to the OS.
    let oversized = Bytes::from(vec![0u8; 70_000]);
    let outcomes: Arc<Mutex<Vec<(u8, bool)>>> = Arc::new(Mutex::new(Vec::new()));

    let submissions: [(u8, Bytes); 3] = [
        (0, Bytes::from_static(b"ok")),
        (1, oversized),
        (2, Bytes::from_static(b"ok")),
    ];
    for (tag, buffer) in submissions {
        let length = buffer.len();
        let request = sender.send_to(buffer, 0, length, target).unwrap();
        let outcomes_clone = outcomes.clone();
        request.on_complete(move |status, _request| {
            outcomes_clone.lock().push((tag, status.is_sent()));
        });
    }

    wait_for("all completions", || outcomes.lock().len() == 3).await;

    // Completions arrive in submission order, successes and failures alike.
    assert_eq!(*outcomes.lock(), vec![(0, true), (1, false), (2, true)]);

    // The failure was translated, surfaced on the error signal, and its
    // symbolic code recorded in the last-error slot.
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        NetError::Send(errno) => {
            assert_eq!(errno.code, "EMSGSIZE");
            assert!(errno.errno > 0);
        }
        other => panic!("expected Send(EMSGSIZE), got {other:?}"),
    }
    assert_eq!(last_errno(), Some("EMSGSIZE"));
}

#[tokio::test]
async fn test_failed_status_carries_translated_error() {
    let sender = UdpHandle::new().unwrap();
    sender.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

    let status: Arc<Mutex<Option<SendStatus>>> = Arc::new(Mutex::new(None));
    let status_clone = status.clone();

    let request = sender
        .send_to(
            Bytes::from(vec![0u8; 70_000]),
            0,
            70_000,
            "127.0.0.1:9".parse().unwrap(),
        )
        .unwrap();
    request.on_complete(move |status, _request| {
        *status_clone.lock() = Some(status);
    });

    wait_for("completion", || status.lock().is_some()).await;
    match status.lock().take().unwrap() {
        SendStatus::Failed(NetError::Send(errno)) => assert_eq!(errno.code, "EMSGSIZE"),
        other => panic!("expected Failed(Send(EMSGSIZE)), got {other:?}"),
    }
}
