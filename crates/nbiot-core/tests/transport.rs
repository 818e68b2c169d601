//! TCP bridge transport against a local listener

use nbiot_core::protocol::{
    AtEngine, Command, FailureKind, ProtocolError, TcpTransport, TransactionConfig, Transport,
};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

const DEADLINE: Duration = Duration::from_millis(1500);

fn single_attempt() -> TransactionConfig {
    TransactionConfig {
        max_attempts: 1,
        per_attempt_timeout: DEADLINE,
        fail_delay: Duration::ZERO,
        ..TransactionConfig::default()
    }
}

#[test]
fn test_tcp_reply_is_read() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while !received.ends_with(b"\r\n") {
            let n = socket.read(&mut buf).unwrap();
            assert!(n > 0, "client hung up early");
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"AT+CSQ\r\n");
        socket.write_all(b"\r\n+CSQ: 17,99\r\n\r\nOK\r\n").unwrap();
        // Hold the connection open until the client is done
        let _ = socket.read(&mut buf);
    });

    let transport = TcpTransport::connect(&addr.to_string()).unwrap();
    let mut engine = AtEngine::new(transport, single_attempt());
    let response = engine.execute(&Command::SignalQuality).unwrap();
    drop(engine);

    assert_eq!(response.command_name, "+CSQ");
    assert_eq!(response.parameters, vec!["17", "99"]);
    server.join().unwrap();
}

#[test]
fn test_tcp_closed_peer_reports_available_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        drop(socket);
    });

    let mut transport = TcpTransport::connect(&addr.to_string()).unwrap();
    server.join().unwrap();
    thread::sleep(Duration::from_millis(50));

    assert!(transport.bytes_available().unwrap() > 0);
    let mut buf = [0u8; 8];
    assert_eq!(transport.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_tcp_hangup_fails_fast() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        drop(socket);
    });

    let transport = TcpTransport::connect(&addr.to_string()).unwrap();
    server.join().unwrap();
    thread::sleep(Duration::from_millis(50));

    let mut engine = AtEngine::new(transport, single_attempt());
    let start = Instant::now();
    let err = engine.execute(&Command::Attention).unwrap_err();
    let elapsed = start.elapsed();

    // Depending on timing the write may already see the reset
    match err {
        ProtocolError::CommandFailed {
            outcome, attempts, ..
        } => {
            assert_eq!(outcome, FailureKind::Timeout);
            assert_eq!(attempts, 1);
        }
        ProtocolError::SerialError(_) => {}
        other => panic!("unexpected error {:?}", other),
    }
    assert!(elapsed < Duration::from_millis(1000), "took {:?}", elapsed);
}
