//! Session-level tests against a stub lobby/rendezvous directory.
//!
//! A minimal HTTP responder stands in for the external directory
//! service; a plain UDP socket stands in for the relay.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use korduel::netplay::lobby::{LobbyClient, LobbyError};
use korduel::netplay::session::{SessionDriver, SessionPhase};
use korduel::netplay::NetworkConfig;

/// One canned response, matched by method and path prefix.
struct Route {
    method: &'static str,
    path_prefix: &'static str,
    status: u16,
    body: String,
}

/// Minimal one-request-per-connection HTTP responder.
struct StubDirectory {
    base_url: String,
    seen: Arc<Mutex<Vec<String>>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl StubDirectory {
    fn spawn(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        listener.set_nonblocking(true).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let seen_log = Arc::clone(&seen);
        let stop_flag = Arc::clone(&stop);
        let worker = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => serve_one(stream, &routes, &seen_log),
                    Err(_) => std::thread::sleep(Duration::from_millis(10)),
                }
            }
        });

        Self {
            base_url,
            seen,
            stop,
            worker: Some(worker),
        }
    }

    fn request_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Drop for StubDirectory {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn serve_one(mut stream: TcpStream, routes: &[Route], seen: &Arc<Mutex<Vec<String>>>) {
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    // Read headers.
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
            Err(_) => return,
        }
    }
    let text = String::from_utf8_lossy(&raw).to_string();
    let request_line = text.lines().next().unwrap_or_default().to_string();

    // Drain the body so the client finishes writing before we close.
    let content_length = text
        .lines()
        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim).map(String::from))
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let header_end = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap_or(0) + 4;
    let mut body_read = raw.len().saturating_sub(header_end);
    while body_read < content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => body_read += n,
        }
    }

    seen.lock().unwrap().push(request_line.clone());

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();
    let route = routes
        .iter()
        .find(|r| r.method == method && path.starts_with(r.path_prefix));

    let (status, reason, body) = match route {
        Some(r) => (
            r.status,
            if r.status == 200 { "OK" } else { "Error" },
            r.body.clone(),
        ),
        None => (404, "Not Found", "{}".to_string()),
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn driver_against(stub: &StubDirectory) -> SessionDriver {
    SessionDriver::new(NetworkConfig {
        control_port: 0,
        state_port: 0,
        lobby_base_url: stub.base_url.clone(),
        ..NetworkConfig::default()
    })
}

#[test]
fn test_lobby_not_found_preserves_join_state() {
    let stub = StubDirectory::spawn(vec![Route {
        method: "GET",
        path_prefix: "/lobbies/",
        status: 404,
        body: "{}".to_string(),
    }]);

    let mut driver = driver_against(&stub);
    driver.open(SessionPhase::JoinOnline);

    assert!(driver.join_online("unknown-code").is_none());
    assert_eq!(driver.phase(), SessionPhase::JoinOnline);
    assert_eq!(driver.status(), "Lobby not found (it may have expired)");
    assert_eq!(stub.request_count(), 1);

    // No automatic retry: nothing else hits the directory until the
    // user acts again.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(stub.request_count(), 1);
}

#[test]
fn test_join_online_direct_succeeds() {
    let stub = StubDirectory::spawn(vec![Route {
        method: "GET",
        path_prefix: "/lobbies/",
        status: 200,
        body: r#"{"host_ip":"127.0.0.1"}"#.to_string(),
    }]);

    let mut driver = driver_against(&stub);
    driver.open(SessionPhase::JoinOnline);

    let client = driver.join_online("abc123");
    assert!(client.is_some());
    assert_eq!(driver.status(), "Joined lobby abc123");
}

#[test]
fn test_host_online_picks_relay_and_registers() {
    // A bare UDP socket plays the relay's control lane.
    let relay_control = UdpSocket::bind("127.0.0.1:0").unwrap();
    relay_control
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let relay_state = UdpSocket::bind("127.0.0.1:0").unwrap();

    let body = format!(
        r#"{{"id":"abc123","relay_host":"127.0.0.1","relay_control_port":{},"relay_state_port":{}}}"#,
        relay_control.local_addr().unwrap().port(),
        relay_state.local_addr().unwrap().port()
    );
    let stub = StubDirectory::spawn(vec![Route {
        method: "POST",
        path_prefix: "/lobbies",
        status: 200,
        body,
    }]);

    let mut driver = driver_against(&stub);
    driver.open(SessionPhase::HostOnline);
    driver.host_online("203.0.113.7", "Rogue Warrior");

    assert_eq!(driver.phase(), SessionPhase::Playing);
    assert_eq!(driver.status(), "Lobby abc123 open");

    // The host registers on the control lane immediately.
    let mut buf = [0u8; 512];
    let (len, _) = relay_control.recv_from(&mut buf).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
    assert_eq!(value["lobby"], "abc123");
    assert_eq!(value["role"], "host");
    assert_eq!(value["kind"], "control");
    assert_eq!(value["type"], "register");
}

#[test]
fn test_host_online_without_relay_goes_direct() {
    let stub = StubDirectory::spawn(vec![Route {
        method: "POST",
        path_prefix: "/lobbies",
        status: 200,
        body: r#"{"id":"xyz789"}"#.to_string(),
    }]);

    let mut driver = driver_against(&stub);
    driver.open(SessionPhase::HostOnline);
    driver.host_online("203.0.113.7", "Mage");

    assert_eq!(driver.phase(), SessionPhase::Playing);
    assert_eq!(driver.status(), "Lobby xyz789 open");
    assert!(driver.host_network().is_some());
}

#[test]
fn test_p2p_host_and_join_flow() {
    let room = r#"{
        "host_public_ip": "127.0.0.1",
        "host_control_port": 50007,
        "host_state_port": 50008,
        "host_local_ip": "127.0.0.1",
        "host_local_control_port": 50007,
        "host_local_state_port": 50008
    }"#;
    let stub = StubDirectory::spawn(vec![
        Route {
            method: "POST",
            path_prefix: "/rooms/",
            status: 200,
            body: "{}".to_string(),
        },
        Route {
            method: "POST",
            path_prefix: "/rooms",
            status: 200,
            body: r#"{"id":"room42"}"#.to_string(),
        },
        Route {
            method: "GET",
            path_prefix: "/rooms/",
            status: 200,
            body: room.to_string(),
        },
    ]);

    let mut host_driver = driver_against(&stub);
    host_driver.open(SessionPhase::HostP2p);
    host_driver.host_p2p("Rogue Warrior", "192.168.1.20");
    assert_eq!(host_driver.phase(), SessionPhase::Playing);
    assert_eq!(host_driver.status(), "Room room42 open");

    let mut join_driver = driver_against(&stub);
    join_driver.open(SessionPhase::JoinP2p);
    let client = join_driver.join_p2p("room42", "192.168.1.31");
    assert!(client.is_some());
    assert_eq!(join_driver.status(), "Joined room room42");
}

#[test]
fn test_directory_timeout_maps_to_status() {
    // A responder that accepts the connection, reads the request, and
    // then holds the socket open past the client's timeout.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let worker = std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut chunk = [0u8; 1024];
            let _ = stream.read(&mut chunk);
            std::thread::sleep(Duration::from_millis(600));
        }
    });

    let client = LobbyClient::with_timeout(base_url, Duration::from_millis(200));
    let err = client.get_lobby("abc123").unwrap_err();
    assert!(matches!(err, LobbyError::Timeout));
    assert_eq!(err.to_string(), "Lobby service timed out");

    let _ = worker.join();
}

#[test]
fn test_directory_http_error_maps_to_status() {
    let stub = StubDirectory::spawn(vec![Route {
        method: "POST",
        path_prefix: "/lobbies",
        status: 500,
        body: "{}".to_string(),
    }]);

    let mut driver = driver_against(&stub);
    driver.open(SessionPhase::HostOnline);
    driver.host_online("203.0.113.7", "Mage");

    assert_eq!(driver.phase(), SessionPhase::HostOnline);
    assert_eq!(driver.status(), "Lobby service error (HTTP 500)");
}
