//! Low-level mpv JSON-IPC communication over a Unix domain socket.
//!
//! Ported from `dj/player.py`'s `MpvBackend` protocol, `SocketBackend`, and
//! `MpvPlayer`, with the connection made async (`tokio::net::UnixStream`)
//! to match the rest of the crate's cooperative-task model instead of
//! Python's blocking `socket` module.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use super::models::CommandResult;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/voicemode-mpv.sock";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 4096;

/// Abstraction over mpv communication so a mock can be injected for tests
/// without a running mpv instance.
#[async_trait]
pub trait MpvBackend: Send + Sync {
    async fn send_command(&self, command: &[Value]) -> CommandResult;
    async fn is_connected(&self) -> bool {
        self.send_command(&[json!("get_property"), json!("pid")])
            .await
            .success
    }
}

/// Default mpv backend: one fresh Unix socket connection per command.
pub struct SocketBackend {
    socket_path: String,
}

impl SocketBackend {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }
}

#[async_trait]
impl MpvBackend for SocketBackend {
    async fn send_command(&self, command: &[Value]) -> CommandResult {
        match timeout(COMMAND_TIMEOUT, send_command_inner(&self.socket_path, command)).await {
            Ok(result) => result,
            Err(_) => CommandResult::fail("Connection timeout"),
        }
    }
}

async fn send_command_inner(socket_path: &str, command: &[Value]) -> CommandResult {
    if !Path::new(socket_path).exists() {
        return CommandResult::fail("Socket not found");
    }

    let mut stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return CommandResult::fail("Socket not found")
        }
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            return CommandResult::fail("Connection refused")
        }
        Err(e) => return CommandResult::fail(format!("Socket error: {e}")),
    };

    let msg = format!("{}\n", json!({ "command": command }));
    if let Err(e) = stream.write_all(msg.as_bytes()).await {
        return CommandResult::fail(format!("Socket error: {e}"));
    }

    let mut response_data = Vec::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                response_data.extend_from_slice(&buf[..n]);
                if response_data.ends_with(b"\n") {
                    break;
                }
            }
            Err(e) => return CommandResult::fail(format!("Socket error: {e}")),
        }
    }

    let text = String::from_utf8_lossy(&response_data);
    let first_line = text.lines().next().unwrap_or("");

    let response: Value = match serde_json::from_str(first_line) {
        Ok(v) => v,
        Err(e) => return CommandResult::fail(format!("Invalid JSON response: {e}")),
    };

    match response.get("error").and_then(Value::as_str) {
        Some("success") => CommandResult::ok(response.get("data").cloned()),
        other => CommandResult::fail(other.unwrap_or("Unknown error").to_string()),
    }
}

/// A clean interface to mpv's IPC commands, backend-injectable for tests.
pub struct MpvPlayer {
    socket_path: String,
    backend: Box<dyn MpvBackend>,
}

impl MpvPlayer {
    pub fn new(socket_path: Option<String>) -> Self {
        let socket_path = socket_path.unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_string());
        let backend = Box::new(SocketBackend::new(socket_path.clone()));
        Self { socket_path, backend }
    }

    pub fn with_backend(socket_path: impl Into<String>, backend: Box<dyn MpvBackend>) -> Self {
        Self {
            socket_path: socket_path.into(),
            backend,
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    pub async fn is_running(&self) -> bool {
        self.backend.is_connected().await
    }

    pub async fn get_property(&self, name: &str) -> Option<Value> {
        let result = self
            .backend
            .send_command(&[json!("get_property"), json!(name)])
            .await;
        result.success.then_some(result.data).flatten()
    }

    pub async fn set_property(&self, name: &str, value: Value) -> bool {
        self.backend
            .send_command(&[json!("set_property"), json!(name), value])
            .await
            .success
    }

    pub async fn pause(&self) -> bool {
        self.set_property("pause", json!(true)).await
    }

    pub async fn resume(&self) -> bool {
        self.set_property("pause", json!(false)).await
    }

    pub async fn stop(&self) -> bool {
        self.backend.send_command(&[json!("quit")]).await.success
    }

    pub async fn next_chapter(&self) -> bool {
        self.backend
            .send_command(&[json!("add"), json!("chapter"), json!(1)])
            .await
            .success
    }

    pub async fn prev_chapter(&self) -> bool {
        self.backend
            .send_command(&[json!("add"), json!("chapter"), json!(-1)])
            .await
            .success
    }

    pub async fn get_volume(&self) -> Option<f64> {
        self.get_property("volume").await.and_then(|v| v.as_f64())
    }

    pub async fn set_volume(&self, level: u8) -> bool {
        self.set_property("volume", json!(level.min(100))).await
    }

    pub async fn get_position(&self) -> Option<f64> {
        self.get_property("time-pos").await.and_then(|v| v.as_f64())
    }

    pub async fn get_duration(&self) -> Option<f64> {
        self.get_property("duration").await.and_then(|v| v.as_f64())
    }

    pub async fn get_path(&self) -> Option<String> {
        self.get_property("path")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
    }

    pub async fn get_title(&self) -> Option<String> {
        self.get_property("media-title")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
    }

    pub async fn is_paused(&self) -> bool {
        self.get_property("pause")
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub async fn get_chapter_metadata(&self) -> Option<Value> {
        self.get_property("chapter-metadata").await
    }

    pub async fn get_chapter_index(&self) -> Option<i64> {
        self.get_property("chapter").await.and_then(|v| v.as_i64())
    }

    pub async fn get_chapter_count(&self) -> Option<i64> {
        self.get_property("chapter-list/count")
            .await
            .and_then(|v| v.as_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockBackend {
        connected: bool,
        properties: std::collections::HashMap<&'static str, Value>,
        set_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MpvBackend for MockBackend {
        async fn send_command(&self, command: &[Value]) -> CommandResult {
            match command.first().and_then(Value::as_str) {
                Some("get_property") => {
                    let name = command[1].as_str().unwrap_or_default();
                    if !self.connected {
                        return CommandResult::fail("Connection refused");
                    }
                    match self.properties.get(name) {
                        Some(v) => CommandResult::ok(Some(v.clone())),
                        None => CommandResult::fail("property unavailable"),
                    }
                }
                Some("set_property") => {
                    self.set_calls.fetch_add(1, Ordering::SeqCst);
                    CommandResult::ok(None)
                }
                Some("quit") => CommandResult::ok(None),
                _ => CommandResult::ok(None),
            }
        }
    }

    #[tokio::test]
    async fn volume_clamps_to_0_100() {
        let mut props = std::collections::HashMap::new();
        props.insert("pid", json!(1234));
        let backend = MockBackend {
            connected: true,
            properties: props,
            set_calls: Arc::new(AtomicUsize::new(0)),
        };
        let player = MpvPlayer::with_backend("/tmp/test.sock", Box::new(backend));
        assert!(player.set_volume(150).await);
    }

    #[tokio::test]
    async fn disconnected_backend_reports_not_running() {
        let backend = MockBackend {
            connected: false,
            properties: std::collections::HashMap::new(),
            set_calls: Arc::new(AtomicUsize::new(0)),
        };
        let player = MpvPlayer::with_backend("/tmp/test.sock", Box::new(backend));
        assert!(!player.is_running().await);
    }
}
