//! DJ Controller: a persistent external media player managed over a local
//! IPC socket, with CUE-to-FFmetadata chapter conversion.

pub mod chapters;
pub mod controller;
pub mod models;
pub mod player;

pub use chapters::{convert_cue_to_ffmetadata, parse_cue_content, parse_ffmetadata, Chapter};
pub use controller::DJController;
pub use models::{CommandResult, TrackStatus};
pub use player::{MpvBackend, MpvPlayer, SocketBackend, DEFAULT_SOCKET_PATH};
