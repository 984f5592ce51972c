//! Integration tests for aria-server.
//!
//! These tests exercise the complete flow over a real TCP connection:
//! request parsing, the nonce login handshake, account mutations, and
//! file persistence across a server restart.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use aria_auth::hash::login_challenge;
use aria_auth::FileStore;
use aria_config::{Config, LoggingConfig, ServerConfig, StoreConfig};
use aria_server::{run_with_shutdown, CancellationToken};

// ============================================================================
// Test Helper: Server Harness
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
    users_file: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("aria-test-")
            .tempdir()
            .unwrap();
        let users_file = temp_dir.path().join("users.json");
        Self::start_with_users_file(users_file, temp_dir).await
    }

    async fn start_with_users_file(users_file: PathBuf, temp_dir: tempfile::TempDir) -> Self {
        // Find available port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config {
            server: ServerConfig {
                listen: addr.to_string(),
                max_workers: 10,
                connection_backlog: 50,
            },
            store: StoreConfig {
                users_file: users_file.to_string_lossy().to_string(),
            },
            logging: LoggingConfig {
                level: Some("warn".to_string()),
                ..Default::default()
            },
        };

        let store = Arc::new(FileStore::open(&users_file).await.unwrap());
        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();

        let handle = tokio::spawn(async move {
            let _ = run_with_shutdown(config, store, server_shutdown).await;
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(300)).await;

        Self {
            addr,
            shutdown,
            handle,
            users_file,
            _temp_dir: temp_dir,
        }
    }

    /// Stop the server, keeping the users file for a later restart.
    async fn stop(self) -> (PathBuf, tempfile::TempDir) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
        (self.users_file, self._temp_dir)
    }
}

// ============================================================================
// Test Helper: Line-Protocol Client
// ============================================================================

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Send one request line and read the one response line.
    async fn send(&mut self, line: &str) -> Value {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();

        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut response))
            .await
            .expect("response timeout")
            .unwrap();
        serde_json::from_str(response.trim()).unwrap()
    }
}

fn signup_line(username: &str, email: &str, hash: &str, salt: &str) -> String {
    format!(
        r#"{{"action":"signup_request","data":{{"username":"{username}","email":"{email}","passwordHash":"{hash}","passwordSalt":"{salt}"}}}}"#
    )
}

// ============================================================================
// Tests
// ============================================================================

/// Full signup / get_nonce / login handshake over the wire.
#[tokio::test]
async fn test_signup_and_login_flow() {
    let server = TestServer::start().await;
    let mut client = Client::connect(server.addr).await;

    let v = client
        .send(&signup_line("alice", "alice@x.com", "HASH", "SALT"))
        .await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["action"], "signup_response");
    assert_eq!(v["message"], "Registration successful");
    assert_eq!(v["data"]["username"], "alice");

    let v = client
        .send(r#"{"action":"get_salt","data":{"email":"alice@x.com"}}"#)
        .await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["salt"], "SALT");

    let v = client
        .send(r#"{"action":"get_nonce","data":{"email":"alice@x.com"}}"#)
        .await;
    assert_eq!(v["status"], "success");
    let nonce = v["nonce"].as_str().unwrap().to_string();

    let proof = login_challenge("HASH", &nonce);
    let v = client
        .send(&format!(
            r#"{{"action":"login_request","data":{{"email":"alice@x.com","passwordHash":"{proof}"}}}}"#
        ))
        .await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["action"], "login_response");
    assert_eq!(v["message"], "Login successful");
    assert_eq!(v["data"]["credit"], 0.0);
    assert_eq!(v["data"]["subscription"], "STANDARD");
    assert!(v["data"]["subscriptionExpireAt"].is_null());
}

/// A consumed nonce cannot authenticate a second login.
#[tokio::test]
async fn test_login_replay_is_rejected() {
    let server = TestServer::start().await;
    let mut client = Client::connect(server.addr).await;

    client
        .send(&signup_line("bob", "bob@x.com", "H", "S"))
        .await;
    let v = client
        .send(r#"{"action":"get_nonce","data":{"email":"bob@x.com"}}"#)
        .await;
    let nonce = v["nonce"].as_str().unwrap().to_string();

    let proof = login_challenge("H", &nonce);
    let line = format!(
        r#"{{"action":"login_request","data":{{"email":"bob@x.com","passwordHash":"{proof}"}}}}"#
    );
    let v = client.send(&line).await;
    assert_eq!(v["status"], "success");

    let v = client.send(&line).await;
    assert_eq!(v["status"], "error");
    assert_eq!(v["message"], "Invalid email, password, or nonce missing");
}

#[tokio::test]
async fn test_duplicate_signup() {
    let server = TestServer::start().await;
    let mut client = Client::connect(server.addr).await;

    let line = signup_line("carol", "carol@x.com", "H", "S");
    let v = client.send(&line).await;
    assert_eq!(v["status"], "success");

    let v = client.send(&line).await;
    assert_eq!(v["status"], "error");
    assert_eq!(v["message"], "Email already exists");
}

/// Deletion requires the exact stored hash and is reflected in the file.
#[tokio::test]
async fn test_delete_account() {
    let server = TestServer::start().await;
    let mut client = Client::connect(server.addr).await;

    client
        .send(&signup_line("dave", "dave@x.com", "H", "S"))
        .await;

    let v = client
        .send(r#"{"action":"delete_account_request","data":{"email":"dave@x.com","passwordHash":"wrong"}}"#)
        .await;
    assert_eq!(v["status"], "error");
    assert_eq!(v["message"], "Invalid password");

    let v = client
        .send(r#"{"action":"delete_account_request","data":{"email":"dave@x.com","passwordHash":"H"}}"#)
        .await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["message"], "Account deleted successfully");

    let v = client
        .send(r#"{"action":"get_salt","data":{"email":"dave@x.com"}}"#)
        .await;
    assert_eq!(v["message"], "User not found");

    let content = std::fs::read_to_string(&server.users_file).unwrap();
    assert!(!content.contains("dave@x.com"));
}

/// Subscription upgrades report and persist the new tier with an expiry.
#[tokio::test]
async fn test_update_premium_and_status() {
    let server = TestServer::start().await;
    let mut client = Client::connect(server.addr).await;

    client
        .send(&signup_line("erin", "erin@x.com", "H", "S"))
        .await;

    let v = client
        .send(r#"{"action":"update_premium_status","data":{"email":"erin@x.com","subscriptionType":"PREMIUM_1_MONTH"}}"#)
        .await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["message"], "Subscription updated successfully");

    let v = client
        .send(r#"{"action":"get_user_status","data":{"email":"erin@x.com"}}"#)
        .await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["data"]["subscription"], "PREMIUM_1_MONTH");
    assert!(v["data"]["subscriptionExpireAt"].as_str().is_some());
    assert!(v["data"]["createdAt"].as_str().is_some());

    let v = client
        .send(r#"{"action":"update_premium_status","data":{"email":"erin@x.com","subscriptionType":"GOLD"}}"#)
        .await;
    assert_eq!(v["status"], "error");
    assert_eq!(v["message"], "Invalid subscription type");
}

/// A malformed request gets an error line but the connection stays usable.
#[tokio::test]
async fn test_malformed_request_keeps_connection_open() {
    let server = TestServer::start().await;
    let mut client = Client::connect(server.addr).await;

    let v = client.send("this is not json").await;
    assert_eq!(v["status"], "error");
    assert_eq!(v["action"], "error");
    assert!(v["message"].as_str().unwrap().starts_with("Server error: "));

    let v = client.send(r#"{"action":"warp","data":{}}"#).await;
    assert_eq!(v["status"], "error");
    assert_eq!(v["message"], "Unknown action");

    // The same connection still serves valid requests.
    let v = client
        .send(&signup_line("frank", "frank@x.com", "H", "S"))
        .await;
    assert_eq!(v["status"], "success");
}

/// Accounts survive a server restart via the users file.
#[tokio::test]
async fn test_persistence_across_restart() {
    let server = TestServer::start().await;
    let addr = server.addr;

    {
        let mut client = Client::connect(addr).await;
        let v = client
            .send(&signup_line("grace", "grace@x.com", "H", "S"))
            .await;
        assert_eq!(v["status"], "success");
    }

    let (users_file, temp_dir) = server.stop().await;
    let server = TestServer::start_with_users_file(users_file, temp_dir).await;

    let mut client = Client::connect(server.addr).await;
    let v = client
        .send(r#"{"action":"get_salt","data":{"email":"grace@x.com"}}"#)
        .await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["salt"], "S");
}

/// Concurrent clients all get served; writes do not clobber each other.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_signups() {
    let server = TestServer::start().await;

    let num_clients = 20;
    let mut handles = Vec::with_capacity(num_clients);

    for i in 0..num_clients {
        let addr = server.addr;
        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            let email = format!("user{i}@x.com");
            let v = client
                .send(&signup_line(&format!("user{i}"), &email, "H", "S"))
                .await;
            assert_eq!(v["status"], "success", "signup failed for {email}");
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    // Every account made it into the snapshot.
    let content = std::fs::read_to_string(&server.users_file).unwrap();
    for i in 0..num_clients {
        assert!(content.contains(&format!("user{i}@x.com")));
    }
}

/// Existing connections keep working during the shutdown drain.
#[tokio::test]
async fn test_graceful_shutdown_drains_connections() {
    let server = TestServer::start().await;
    let mut client = Client::connect(server.addr).await;

    client
        .send(&signup_line("henry", "henry@x.com", "H", "S"))
        .await;

    server.shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The established connection is still served.
    let v = client
        .send(r#"{"action":"get_salt","data":{"email":"henry@x.com"}}"#)
        .await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["salt"], "S");

    drop(client);
    let result = tokio::time::timeout(Duration::from_secs(5), server.handle).await;
    assert!(result.is_ok(), "server should stop within timeout");
}
