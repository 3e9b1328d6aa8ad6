//! Integration tests for lwrp-client.
//!
//! Each test stands up an in-process TCP listener playing the device role
//! and drives a real client against it through the public API.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use lwrp_client::{LwrpClient, LwrpError, PinLevel, RecordType};

/// Bind a fake device on an ephemeral port.
async fn bind_device() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Connect a client tuned for fast test cycles.
async fn fast_client(port: u16) -> LwrpClient {
    LwrpClient::builder()
        .cycle_interval(Duration::from_millis(5))
        .reply_timeout(Duration::from_secs(2))
        .connect("127.0.0.1", port)
        .await
        .unwrap()
}

/// Poll a condition until it holds or the deadline passes.
async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within deadline");
}

/// Device data query decodes the full VER reply.
#[tokio::test]
async fn test_device_data_query() {
    let (listener, port) = bind_device().await;

    let device = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, "VER");

        write_half
            .write_all(
                b"VER LWRP:2 DEVN:\"My Node\" SYSV:1.0 NSRC:12/static NDST:8 NGPI:4 NGPO:4\n",
            )
            .await
            .unwrap();
        write_half.flush().await.unwrap();
        // Keep the socket open until the client is done.
        let _ = lines.next_line().await;
    });

    let client = fast_client(port).await;
    let records = client.device_data().await.unwrap().unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.record_type, RecordType::Device);
    assert_eq!(record.attr_text("protocol_version"), Some("2"));
    assert_eq!(record.attr_text("device_name"), Some("My Node"));
    assert_eq!(record.attr_text("system_version"), Some("1.0"));
    assert_eq!(record.attr_text("source_count"), Some("12"));
    assert_eq!(record.attr_text("source_type"), Some("static"));
    assert_eq!(record.attr_text("destination_count"), Some("8"));
    assert_eq!(record.attr_text("GPI_count"), Some("4"));
    assert_eq!(record.attr_text("GPO_count"), Some("4"));

    client.stop();
    device.abort();
}

/// An unsolicited meter line resolves a pending wait.
#[tokio::test]
async fn test_wait_for_meter_record() {
    let (listener, port) = bind_device().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        socket
            .write_all(b"MTR ICH 3 PEAK:-20:-18 RMS:-30:-29\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let client = fast_client(port).await;
    let records = client
        .wait_for(RecordType::Meter, Duration::from_secs(2))
        .await
        .unwrap();

    let record = &records[0];
    assert_eq!(record.num.as_deref(), Some("3"));
    assert_eq!(record.attr_text("PEAK_L"), Some("-20"));
    assert_eq!(record.attr_text("PEAK_R"), Some("-18"));
    assert_eq!(record.attr_text("RMS_L"), Some("-30"));
    assert_eq!(record.attr_text("RMS_R"), Some("-29"));

    client.stop();
}

/// Two same-type lines arriving together fire a subscription once, with
/// both records in arrival order.
#[tokio::test]
async fn test_dispatch_batches_same_type() {
    let (listener, port) = bind_device().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(b"SRC 1 PSNM:One\nSRC 2 PSNM:Two\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let client = fast_client(port).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let calls_cb = Arc::clone(&calls);
    let seen_cb = Arc::clone(&seen);
    client.subscribe(
        RecordType::Source,
        move |records| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            let mut seen = seen_cb.lock().unwrap();
            for r in records {
                seen.push(r.num.clone().unwrap());
            }
        },
        None,
    );

    let calls_done = Arc::clone(&calls);
    wait_until(move || calls_done.load(Ordering::SeqCst) >= 1).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec!["1", "2"]);

    client.stop();
}

/// A limit-1 subscription fires once and is gone for later cycles.
#[tokio::test]
async fn test_subscription_expiry() {
    let (listener, port) = bind_device().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"SRC 1 PSNM:First\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        socket.write_all(b"SRC 2 PSNM:Second\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let client = fast_client(port).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_cb = Arc::clone(&calls);
    client.subscribe(
        RecordType::Source,
        move |_| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        },
        NonZeroU32::new(1),
    );

    let calls_done = Arc::clone(&calls);
    wait_until(move || calls_done.load(Ordering::SeqCst) >= 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    client.stop();
}

/// A BEGIN…END block reaches subscribers as one atomic batch.
#[tokio::test]
async fn test_block_dispatches_atomically() {
    let (listener, port) = bind_device().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // Split the block across two writes mid-line.
        socket.write_all(b"BEGIN\nDST 1 ADDR:239.1.1.1\nDST 2 AD").await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        socket.write_all(b"DR:0.0.0.0\nEND\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let client = fast_client(port).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let calls_cb = Arc::clone(&calls);
    let seen_cb = Arc::clone(&seen);
    client.subscribe(
        RecordType::Destination,
        move |records| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            let mut seen = seen_cb.lock().unwrap();
            for r in records {
                seen.push((r.num.clone().unwrap(), r.attributes["address"].clone()));
            }
        },
        None,
    );

    let calls_done = Arc::clone(&calls);
    wait_until(move || calls_done.load(Ordering::SeqCst) >= 1).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, "1");
    assert_eq!(seen[0].1.as_text(), Some("239.1.1.1"));
    assert_eq!(seen[1].0, "2");
    assert!(seen[1].1.is_absent());

    client.stop();
}

/// Commands enqueued concurrently from several tasks arrive with every
/// producer's subsequence still in order.
#[tokio::test]
async fn test_concurrent_enqueue_preserves_fifo() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 25;

    let (listener, port) = bind_device().await;

    let device = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(socket).lines();
        let mut received = Vec::new();
        while received.len() < PRODUCERS * PER_PRODUCER {
            match lines.next_line().await.unwrap() {
                Some(line) => received.push(line),
                None => break,
            }
        }
        received
    });

    let client = Arc::new(fast_client(port).await);

    let mut producers = Vec::new();
    for task in 0..PRODUCERS {
        let client = Arc::clone(&client);
        producers.push(tokio::spawn(async move {
            for i in 0..PER_PRODUCER {
                client.send_command(&format!("PING {} {}", task, i)).unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let received = device.await.unwrap();
    assert_eq!(received.len(), PRODUCERS * PER_PRODUCER);

    // Per-producer order must survive the shared queue and the wire.
    for task in 0..PRODUCERS {
        let prefix = format!("PING {} ", task);
        let sequence: Vec<&str> = received
            .iter()
            .filter(|line| line.starts_with(&prefix))
            .map(|line| line.as_str())
            .collect();
        assert_eq!(sequence.len(), PER_PRODUCER);
        for (i, line) in sequence.iter().enumerate() {
            assert_eq!(*line, format!("PING {} {}", task, i));
        }
    }

    client.stop();
}

/// Control helpers put exactly the documented text on the wire.
#[tokio::test]
async fn test_control_commands_on_the_wire() {
    let (listener, port) = bind_device().await;

    let device = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(socket).lines();
        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(lines.next_line().await.unwrap().unwrap());
        }
        received
    });

    let client = fast_client(port).await;
    client.set_source(3, "239.192.0.1").unwrap();
    client.set_destination(4, "239.1.1.1").unwrap();
    client.set_gpo(1, 3, PinLevel::Low).unwrap();
    client.set_gpi_text(2, "play jingle").unwrap();

    let received = device.await.unwrap();
    assert_eq!(
        received,
        vec![
            "SRC 3 RTPA:239.192.0.1",
            "DST 4 ADDR:239.1.1.1",
            "GPO 1 xxlxx",
            "GPI 2 CMD:\"play jingle\"",
        ]
    );

    client.stop();
}

/// Invalid caller input is rejected before anything reaches the wire.
#[tokio::test]
async fn test_validation_rejects_before_send() {
    let (listener, port) = bind_device().await;
    let client = fast_client(port).await;

    assert!(matches!(
        client.set_gpo(1, 0, PinLevel::Low),
        Err(LwrpError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.set_gpo(1, 2, PinLevel::Absent),
        Err(LwrpError::InvalidArgument(_))
    ));

    client.stop();
    drop(listener);
}

/// Device error lines reach error subscribers as literal text, and
/// malformed traffic never kills the connection.
#[tokio::test]
async fn test_error_records_and_malformed_lines() {
    let (listener, port) = bind_device().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(b"GIBBERISH total nonsense\nERROR 1000 bad command\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let client = fast_client(port).await;
    let messages = Arc::new(Mutex::new(Vec::new()));

    let messages_cb = Arc::clone(&messages);
    client.error_sub(move |records| {
        let mut messages = messages_cb.lock().unwrap();
        for r in records {
            messages.push(r.message.clone().unwrap());
        }
    });

    let messages_done = Arc::clone(&messages);
    wait_until(move || !messages_done.lock().unwrap().is_empty()).await;

    assert_eq!(*messages.lock().unwrap(), vec!["1000 bad command"]);

    client.stop();
}

/// A missing reply resolves to an absent result, not an error.
#[tokio::test]
async fn test_wait_for_timeout_is_none() {
    let (listener, port) = bind_device().await;

    tokio::spawn(async move {
        // Accept and stay silent.
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let client = fast_client(port).await;
    let result = client
        .wait_for(RecordType::Device, Duration::from_millis(100))
        .await;
    assert!(result.is_none());

    client.stop();
}

/// A requested stop shuts the loop down cleanly.
#[tokio::test]
async fn test_stop_is_clean_shutdown() {
    let (listener, port) = bind_device().await;

    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let client = fast_client(port).await;
    client.stop();
    client.wait_for_shutdown().await.unwrap();
}

/// The peer dropping the connection surfaces as a fatal error.
#[tokio::test]
async fn test_peer_close_is_fatal() {
    let (listener, port) = bind_device().await;

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let client = fast_client(port).await;
    let result = client.wait_for_shutdown().await;
    assert!(matches!(result, Err(LwrpError::Io(_))));
}

/// The device address query path: IP reply merged with SET extras.
#[tokio::test]
async fn test_network_data_merges_set() {
    let (listener, port) = bind_device().await;

    let device = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, "IP");
        write_half
            .write_all(b"IP address 192.168.1.10 netmask 255.255.255.0 gateway 192.168.1.1\n")
            .await
            .unwrap();

        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, "SET");
        write_half
            .write_all(b"SET hostname studio-node\n")
            .await
            .unwrap();

        let _ = lines.next_line().await;
    });

    let client = fast_client(port).await;
    let records = client.network_data().await.unwrap().unwrap();

    let record = &records[0];
    assert_eq!(record.record_type, RecordType::Network);
    assert_eq!(record.attr_text("ip_address"), Some("192.168.1.10"));
    assert_eq!(record.attr_text("ip_netmask"), Some("255.255.255.0"));
    assert_eq!(record.attr_text("ip_gateway"), Some("192.168.1.1"));
    // Merged in from the SET reply.
    assert_eq!(record.attr_text("ip_hostname"), Some("studio-node"));

    client.stop();
    device.abort();
}

/// Fake device driving GPIO subscriptions: pin updates arrive decoded.
#[tokio::test]
async fn test_gpi_subscription_pin_states() {
    let (listener, port) = bind_device().await;

    let device = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, "ADD GPI");
        write_half.write_all(b"GPI 2 hlHLx\n").await.unwrap();
        let _ = lines.next_line().await;
    });

    let client = fast_client(port).await;
    let pins = Arc::new(Mutex::new(Vec::new()));

    let pins_cb = Arc::clone(&pins);
    client
        .gpi_data_sub(move |records| {
            let mut pins = pins_cb.lock().unwrap();
            for r in records {
                pins.push(r.pin_states.clone().unwrap());
            }
        })
        .unwrap();

    let pins_done = Arc::clone(&pins);
    wait_until(move || !pins_done.lock().unwrap().is_empty()).await;

    let pins = pins.lock().unwrap();
    let states = &pins[0];
    assert_eq!(states.len(), 5);
    assert_eq!(states[0].level, PinLevel::High);
    assert!(!states[0].transitioning);
    assert_eq!(states[3].level, PinLevel::Low);
    assert!(states[3].transitioning);
    assert_eq!(states[4].level, PinLevel::Absent);

    client.stop();
    device.abort();
}
