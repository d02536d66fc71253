//! Data types shared across the DJ controller, player, and chapters modules.
//!
//! Ported from `dj/models.py`'s `CommandResult` and `TrackStatus` dataclasses.

use serde_json::Value;

/// Result of a single mpv IPC command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// A snapshot of current playback state, queried on demand and never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackStatus {
    pub is_playing: bool,
    pub is_paused: bool,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub position_s: f64,
    pub duration_s: f64,
    pub volume: u8,
    pub chapter: Option<String>,
    pub chapter_index: Option<i64>,
    pub chapter_count: Option<i64>,
    pub path: Option<String>,
}

impl TrackStatus {
    pub fn progress_percent(&self) -> f64 {
        if self.duration_s <= 0.0 {
            0.0
        } else {
            (self.position_s / self.duration_s * 100.0).min(100.0)
        }
    }

    pub fn remaining_s(&self) -> f64 {
        (self.duration_s - self.position_s).max(0.0)
    }
}
