//! Cross-thread behavior of the latest-value handoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stoplight::{Error, Handoff};

#[test]
fn test_send_a_then_b_receives_b() {
    let ch = Handoff::new();
    ch.send('A');
    ch.send('B');
    assert_eq!(ch.receive().unwrap(), 'B');
}

#[test]
fn test_receive_on_fresh_channel_blocks() {
    let ch: Arc<Handoff<u32>> = Arc::new(Handoff::new());
    let done = Arc::new(AtomicBool::new(false));

    let receiver = {
        let ch = ch.clone();
        let done = done.clone();
        thread::spawn(move || {
            let value = ch.receive();
            done.store(true, Ordering::SeqCst);
            value
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!done.load(Ordering::SeqCst), "receive must block with no send");

    ch.send(5);
    assert_eq!(receiver.join().unwrap().unwrap(), 5);
}

#[test]
fn test_fast_producer_slow_consumer_sees_latest() {
    let ch = Arc::new(Handoff::new());
    let producer = {
        let ch = ch.clone();
        thread::spawn(move || {
            for i in 0..10_000u32 {
                ch.send(i);
            }
        })
    };
    producer.join().unwrap();

    // Everything but the final value was overwritten.
    assert_eq!(ch.receive().unwrap(), 9_999);
    assert!(matches!(
        ch.receive_timeout(Duration::from_millis(10)),
        Err(Error::Timeout(_))
    ));
}

#[test]
fn test_received_values_never_go_backwards() {
    let ch = Arc::new(Handoff::new());
    let producer = {
        let ch = ch.clone();
        thread::spawn(move || {
            for i in 1..=2_000u32 {
                ch.send(i);
                if i % 100 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            ch.close();
        })
    };

    let mut last = 0;
    while let Ok(v) = ch.receive() {
        assert!(v > last, "received {} after {}", v, last);
        last = v;
    }
    producer.join().unwrap();
    assert_eq!(last, 2_000);
}
