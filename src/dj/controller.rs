//! High-level DJ operations: start/stop/pause/navigate a persistent mpv
//! instance and assemble status snapshots.
//!
//! Ported method-for-method from `dj/controller.py`'s `DJController`,
//! made async to match the player's async IPC calls; the `subprocess.Popen`
//! launch becomes `std::process::Command::spawn` (fire-and-forget, mpv
//! manages its own lifetime once spawned — the controller only ever talks
//! to it over the socket afterward).

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use super::models::TrackStatus;
use super::player::MpvPlayer;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const POST_COMMAND_SETTLE: Duration = Duration::from_millis(100);
const POST_STOP_SETTLE: Duration = Duration::from_millis(200);

pub struct DJController {
    player: MpvPlayer,
    default_volume: u8,
}

impl DJController {
    pub fn new(player: MpvPlayer, default_volume: u8) -> Self {
        Self {
            player,
            default_volume: default_volume.min(100),
        }
    }

    pub fn socket_path(&self) -> &str {
        self.player.socket_path()
    }

    /// Stop any current instance, remove a stale socket, spawn mpv with
    /// `--no-video`, the IPC socket path, the initial volume, and an
    /// optional chapters file, then poll for responsiveness.
    pub async fn play(
        &self,
        source: &str,
        chapters_file: Option<&str>,
        volume: Option<u8>,
    ) -> bool {
        if self.is_playing().await {
            self.stop().await;
            tokio::time::sleep(POST_STOP_SETTLE).await;
        }

        let socket_path = self.player.socket_path();
        if Path::new(socket_path).exists() {
            if let Err(e) = std::fs::remove_file(socket_path) {
                warn!("Failed to remove stale mpv socket {}: {}", socket_path, e);
            }
        }

        let vol = volume.unwrap_or(self.default_volume).min(100);
        let mut cmd = std::process::Command::new("mpv");
        cmd.arg("--no-video")
            .arg(format!("--input-ipc-server={socket_path}"))
            .arg(format!("--volume={vol}"))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());

        if let Some(chapters) = chapters_file {
            if Path::new(chapters).exists() {
                cmd.arg(format!("--chapters-file={chapters}"));
            }
        }
        cmd.arg(source);

        match cmd.spawn() {
            Ok(_child) => {
                info!(source, "Spawned mpv");
            }
            Err(e) => {
                warn!("Failed to spawn mpv: {}", e);
                return false;
            }
        }

        self.wait_for_socket().await
    }

    async fn wait_for_socket(&self) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < STARTUP_TIMEOUT {
            if self.player.is_running().await {
                return true;
            }
            tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
        }
        false
    }

    /// Always reports success if mpv was not running.
    pub async fn stop(&self) -> bool {
        if !self.player.is_running().await {
            return true;
        }
        self.player.stop().await
    }

    pub async fn pause(&self) -> bool {
        if !self.player.is_running().await {
            return false;
        }
        self.player.pause().await
    }

    pub async fn resume(&self) -> bool {
        if !self.player.is_running().await {
            return false;
        }
        self.player.resume().await
    }

    pub async fn toggle_pause(&self) -> bool {
        if !self.player.is_running().await {
            return false;
        }
        if self.player.is_paused().await {
            self.player.resume().await
        } else {
            self.player.pause().await
        }
    }

    pub async fn status(&self) -> Option<TrackStatus> {
        if !self.player.is_running().await {
            return None;
        }

        let position_s = self.player.get_position().await?;
        let duration_s = self.player.get_duration().await?;
        let volume = self.player.get_volume().await?;

        let chapter_meta = self.player.get_chapter_metadata().await;
        let chapter = chapter_meta.and_then(|meta| {
            meta.as_object()
                .and_then(|m| m.get("TITLE").or_else(|| m.get("title")))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });

        Some(TrackStatus {
            is_playing: true,
            is_paused: self.player.is_paused().await,
            title: self.player.get_title().await,
            artist: None,
            position_s,
            duration_s,
            volume: volume.round() as u8,
            chapter,
            chapter_index: self.player.get_chapter_index().await,
            chapter_count: self.player.get_chapter_count().await,
            path: self.player.get_path().await,
        })
    }

    /// True iff mpv is running, regardless of pause state.
    pub async fn is_playing(&self) -> bool {
        self.player.is_running().await
    }

    pub async fn next(&self) -> Option<TrackStatus> {
        if !self.player.is_running().await {
            return None;
        }
        self.player.next_chapter().await;
        tokio::time::sleep(POST_COMMAND_SETTLE).await;
        self.status().await
    }

    pub async fn prev(&self) -> Option<TrackStatus> {
        if !self.player.is_running().await {
            return None;
        }
        self.player.prev_chapter().await;
        tokio::time::sleep(POST_COMMAND_SETTLE).await;
        self.status().await
    }

    /// With `level`: clamp to 0..=100, set, and return it. Without: read
    /// the current volume. `None` if mpv is not running.
    pub async fn volume(&self, level: Option<u8>) -> Option<u8> {
        if !self.player.is_running().await {
            return None;
        }
        if let Some(level) = level {
            let clamped = level.min(100);
            self.player.set_volume(clamped).await;
            return Some(clamped);
        }
        Some(self.player.get_volume().await.unwrap_or(0.0).round() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dj::models::CommandResult;
    use crate::dj::player::MpvBackend;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct StubBackend {
        running: Arc<AtomicBool>,
        volume: Arc<std::sync::Mutex<f64>>,
    }

    #[async_trait]
    impl MpvBackend for StubBackend {
        async fn send_command(&self, command: &[Value]) -> CommandResult {
            if !self.running.load(Ordering::SeqCst) {
                return CommandResult::fail("Connection refused");
            }
            match command.first().and_then(Value::as_str) {
                Some("get_property") => {
                    let name = command[1].as_str().unwrap_or_default();
                    match name {
                        "volume" => CommandResult::ok(Some(json!(*self.volume.lock().unwrap()))),
                        "pid" => CommandResult::ok(Some(json!(1))),
                        _ => CommandResult::fail("unavailable"),
                    }
                }
                Some("set_property") => {
                    if command[1].as_str() == Some("volume") {
                        *self.volume.lock().unwrap() = command[2].as_f64().unwrap_or(0.0);
                    }
                    CommandResult::ok(None)
                }
                _ => CommandResult::ok(None),
            }
        }
    }

    fn controller(running: bool, volume: f64) -> DJController {
        let backend = StubBackend {
            running: Arc::new(AtomicBool::new(running)),
            volume: Arc::new(std::sync::Mutex::new(volume)),
        };
        let player = MpvPlayer::with_backend("/tmp/test-dj.sock", Box::new(backend));
        DJController::new(player, 50)
    }

    #[tokio::test]
    async fn volume_set_then_get_is_clamped() {
        let ctl = controller(true, 50.0);
        let set = ctl.volume(Some(150)).await;
        assert_eq!(set, Some(100));
        assert_eq!(ctl.volume(None).await, Some(100));
    }

    #[tokio::test]
    async fn stop_when_not_running_reports_success() {
        let ctl = controller(false, 0.0);
        assert!(ctl.stop().await);
    }

    #[tokio::test]
    async fn pause_when_not_running_returns_false() {
        let ctl = controller(false, 0.0);
        assert!(!ctl.pause().await);
    }

    #[tokio::test]
    async fn status_is_none_when_not_running() {
        let ctl = controller(false, 0.0);
        assert!(ctl.status().await.is_none());
    }
}
