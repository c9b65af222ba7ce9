use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use redstore::{Storage, StorageConfig, StoreError};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Spawns a scripted server handling `expected` commands on one connection.
fn spawn_server(expected: usize, handler: fn(usize, Vec<Vec<u8>>, &mut TcpStream)) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for idx in 0..expected {
            let args = read_command(&mut reader).expect("read command");
            handler(idx, args, &mut stream);
        }
    });

    addr
}

/// Reads one RESP array-of-bulk-strings command.
fn read_command<R: BufRead>(reader: &mut R) -> std::io::Result<Vec<Vec<u8>>> {
    let count = read_prefixed_len(reader, b'*')?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_prefixed_len(reader, b'$')?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        args.push(data);
    }
    Ok(args)
}

fn read_prefixed_len<R: BufRead>(reader: &mut R, tag: u8) -> std::io::Result<usize> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    if line.len() < 3 || line[0] != tag || line[line.len() - 2] != b'\r' {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad frame",
        ));
    }
    std::str::from_utf8(&line[1..line.len() - 2])
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "bad length"))
}

fn write_simple(stream: &mut TcpStream, status: &str) {
    let _ = write!(stream, "+{}\r\n", status);
    let _ = stream.flush();
}

fn write_integer(stream: &mut TcpStream, value: i64) {
    let _ = write!(stream, ":{}\r\n", value);
    let _ = stream.flush();
}

fn write_bulk(stream: &mut TcpStream, data: &[u8]) {
    let _ = write!(stream, "${}\r\n", data.len());
    let _ = stream.write_all(data);
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

fn write_null_bulk(stream: &mut TcpStream) {
    let _ = stream.write_all(b"$-1\r\n");
    let _ = stream.flush();
}

/// Writes a three-element pub/sub push of bulk strings.
fn write_push(stream: &mut TcpStream, kind: &[u8], channel: &[u8], payload: &[u8]) {
    let _ = stream.write_all(b"*3\r\n");
    for part in [kind, channel, payload] {
        let _ = write!(stream, "${}\r\n", part.len());
        let _ = stream.write_all(part);
        let _ = stream.write_all(b"\r\n");
    }
    let _ = stream.flush();
}

fn storage_for(addr: String, prefix: &str) -> Storage {
    storage_with_interval(addr, prefix, Duration::from_millis(25))
}

fn storage_with_interval(addr: String, prefix: &str, flush_interval: Duration) -> Storage {
    Storage::open(StorageConfig {
        addr,
        pool_size: 1,
        prefix: prefix.to_string(),
        read_timeout: Some(Duration::from_secs(1)),
        write_timeout: Some(Duration::from_secs(1)),
        connect_timeout: Some(Duration::from_secs(1)),
        flush_interval,
    })
}

/// Accepts one publish connection and forwards its first command.
fn spawn_publish_sink(listener: TcpListener) -> std::sync::mpsc::Receiver<Vec<Vec<u8>>> {
    let (command_tx, command_rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept publisher");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream);
        let args = read_command(&mut reader).expect("publish command");
        command_tx.send(args).expect("forward command");
    });
    command_rx
}

#[test]
fn typed_set_then_get_round_trips_with_prefix() {
    init_logging();
    let addr = spawn_server(2, |idx, args, stream| {
        let encoded = rmp_serde::to_vec(&"hello".to_string()).expect("encode");
        if idx == 0 {
            assert_eq!(args[0], b"SET");
            assert_eq!(args[1], b"app:greeting");
            assert_eq!(args[2], encoded);
            write_simple(stream, "OK");
        } else {
            assert_eq!(args[0], b"GET");
            assert_eq!(args[1], b"app:greeting");
            write_bulk(stream, &encoded);
        }
    });

    let store = storage_for(addr, "app:");
    store
        .set("greeting", Some(&"hello".to_string()))
        .expect("set");
    assert_eq!(store.get_string("greeting").expect("get"), "hello");
}

#[test]
fn integer_and_float_values_round_trip() {
    init_logging();
    let addr = spawn_server(2, |idx, args, stream| {
        assert_eq!(args[0], b"GET");
        if idx == 0 {
            write_bulk(stream, &rmp_serde::to_vec(&-42i32).expect("encode"));
        } else {
            write_bulk(stream, &rmp_serde::to_vec(&2.5f64).expect("encode"));
        }
    });

    let store = storage_for(addr, "");
    assert_eq!(store.get_i32("count").expect("i32"), -42);
    assert_eq!(store.get_f64("ratio").expect("f64"), 2.5);
}

#[test]
fn absent_key_is_not_found() {
    init_logging();
    let addr = spawn_server(1, |_, args, stream| {
        assert_eq!(args[0], b"GET");
        write_null_bulk(stream);
    });

    let store = storage_for(addr, "app:");
    assert!(matches!(store.get("absent"), Err(StoreError::NotFound)));
}

#[test]
fn mismatched_type_surfaces_a_decode_error() {
    init_logging();
    let addr = spawn_server(1, |_, args, stream| {
        assert_eq!(args[0], b"GET");
        write_bulk(stream, &rmp_serde::to_vec(&123i64).expect("encode"));
    });

    let store = storage_for(addr, "");
    assert!(matches!(
        store.get_string("count"),
        Err(StoreError::Decode(_))
    ));
}

#[test]
fn delete_is_strict_about_removal_count() {
    init_logging();
    let addr = spawn_server(2, |idx, args, stream| {
        assert_eq!(args[0], b"DEL");
        assert_eq!(args[1], b"app:key");
        write_integer(stream, if idx == 0 { 0 } else { 1 });
    });

    let store = storage_for(addr, "app:");
    assert!(matches!(store.delete("key"), Err(StoreError::Command(_))));
    store.delete("key").expect("second delete");
}

#[test]
fn setex_transmits_whole_seconds() {
    init_logging();
    let addr = spawn_server(1, |_, args, stream| {
        assert_eq!(args[0], b"SETEX");
        assert_eq!(args[1], b"app:session");
        // 1500ms truncates to 1 second.
        assert_eq!(args[2], b"1");
        write_simple(stream, "OK");
    });

    let store = storage_for(addr, "app:");
    store
        .setex("session", Some(&1i64), Duration::from_millis(1500))
        .expect("setex");
}

#[test]
fn none_value_is_stored_as_empty_bytes() {
    init_logging();
    let addr = spawn_server(1, |_, args, stream| {
        assert_eq!(args[0], b"SET");
        assert!(args[2].is_empty());
        write_simple(stream, "OK");
    });

    let store = storage_for(addr, "");
    store.set::<String>("tombstone", None).expect("set none");
}

#[test]
fn unacknowledged_set_is_a_command_error() {
    init_logging();
    let addr = spawn_server(1, |_, args, stream| {
        assert_eq!(args[0], b"SET");
        write_simple(stream, "QUEUED");
    });

    let store = storage_for(addr, "");
    assert!(matches!(
        store.set("key", Some(&1i64)),
        Err(StoreError::Command(_))
    ));
}

#[test]
fn unreachable_endpoint_surfaces_a_connection_error() {
    init_logging();
    // Bind then drop to get a port that refuses connections.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").to_string()
    };

    let store = storage_for(addr, "app:");
    assert!(matches!(
        store.set("key", Some(&1i64)),
        Err(StoreError::Connection(_))
    ));
}

#[test]
fn publish_performs_no_network_io_on_the_caller_thread() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    let commands = spawn_publish_sink(listener);

    let store = storage_with_interval(addr, "", Duration::from_millis(500));
    store.publish("events", "deferred");

    // The caller only appends to the in-memory backlog; no connection may
    // appear before the flusher's first tick.
    assert!(commands.recv_timeout(Duration::from_millis(150)).is_err());

    let args = commands
        .recv_timeout(Duration::from_secs(2))
        .expect("flushed on the interval");
    assert_eq!(args[0], b"PUBLISH");
    assert_eq!(args[1], b"events");
    assert_eq!(args[2], b"deferred");
}

#[test]
fn buffered_publishes_are_flushed_when_the_storage_is_dropped() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    let commands = spawn_publish_sink(listener);

    // An interval this long never fires during the test; only the drop-time
    // drain can deliver the frame.
    let store = storage_with_interval(addr, "", Duration::from_secs(60));
    store.publish("events", "bye");
    drop(store);

    let args = commands
        .recv_timeout(Duration::from_secs(2))
        .expect("drained on drop");
    assert_eq!(args[0], b"PUBLISH");
    assert_eq!(args[1], b"events");
    assert_eq!(args[2], b"bye");
}

#[test]
fn publish_reaches_a_subscriber_within_the_flush_interval() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        // The subscription dials first.
        let (mut sub_stream, _) = listener.accept().expect("accept subscriber");
        let _ = sub_stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut sub_reader = BufReader::new(sub_stream.try_clone().expect("clone"));
        let args = read_command(&mut sub_reader).expect("subscribe command");
        assert_eq!(args[0], b"SUBSCRIBE");
        assert_eq!(args[1], b"events");
        write_push(&mut sub_stream, b"subscribe", b"events", b"1");

        // The publish connection dials lazily on the first publish.
        let (pub_stream, _) = listener.accept().expect("accept publisher");
        let mut pub_reader = BufReader::new(pub_stream.try_clone().expect("clone"));
        let args = read_command(&mut pub_reader).expect("publish command");
        assert_eq!(args[0], b"PUBLISH");
        assert_eq!(args[1], b"events");
        assert_eq!(args[2], b"hello");

        write_push(&mut sub_stream, b"message", b"events", b"hello");
    });

    let store = storage_for(addr, "app:");
    let mut subscription = store.subscription(&["events"]).expect("subscription");

    // The confirmation push is not a message.
    assert_eq!(subscription.receive().expect("confirmation"), None);

    store.publish("events", "hello");

    let message = subscription
        .receive()
        .expect("receive")
        .expect("message event");
    assert_eq!(message.kind, "message");
    assert_eq!(message.channel, "events");
    assert_eq!(message.payload, "hello");
}
