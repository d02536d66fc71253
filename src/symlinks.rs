//! Audio artifact filesystem layout: `latest`/`latest-<TYPE>` symlink
//! maintenance.
//!
//! Ported from `utils/symlinks.py`'s `update_latest_symlinks` and
//! `_remove_old_symlinks`, using `std::os::unix::fs::symlink` in place of
//! `Path.symlink_to` and `std::fs::read_dir` glob-prefix scanning in place
//! of `Path.glob`.

use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioType {
    Stt,
    Tts,
}

impl AudioType {
    fn upper(self) -> &'static str {
        match self {
            Self::Stt => "STT",
            Self::Tts => "TTS",
        }
    }
}

/// Update `latest-<TYPE>.<ext>` and `latest.<ext>` in `base_dir` to point at
/// `file_path`. Returns the two symlink paths, or `None` if the file is
/// missing or extensionless. Old symlinks under either prefix, with any
/// extension, are removed first so an extension change doesn't leave stale
/// links behind.
pub fn update_latest_symlinks(
    base_dir: &Path,
    file_path: &Path,
    audio_type: AudioType,
) -> Option<(PathBuf, PathBuf)> {
    if !file_path.exists() {
        warn!("Cannot create symlink: file does not exist: {}", file_path.display());
        return None;
    }

    let extension = file_path.extension()?.to_str()?;
    let extension = format!(".{extension}");

    let type_symlink_name = format!("latest-{}{extension}", audio_type.upper());
    let latest_symlink_name = format!("latest{extension}");

    let type_symlink_path = base_dir.join(&type_symlink_name);
    let latest_symlink_path = base_dir.join(&latest_symlink_name);

    let relative_target = file_path
        .strip_prefix(base_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| {
            debug!("File not under base dir, using absolute path: {}", file_path.display());
            file_path.to_path_buf()
        });

    remove_old_symlinks(base_dir, &format!("latest-{}", audio_type.upper()));
    remove_old_symlinks(base_dir, "latest");

    if let Err(e) = make_symlink(&relative_target, &type_symlink_path) {
        error!("Failed to create symlink {}: {}", type_symlink_path.display(), e);
        return None;
    }
    debug!("Created symlink: {} -> {}", type_symlink_path.display(), relative_target.display());

    if let Err(e) = make_symlink(&relative_target, &latest_symlink_path) {
        error!("Failed to create symlink {}: {}", latest_symlink_path.display(), e);
        return None;
    }
    debug!("Created symlink: {} -> {}", latest_symlink_path.display(), relative_target.display());

    Some((type_symlink_path, latest_symlink_path))
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Remove symlinks named `<prefix>.*` in `directory` (matched exactly,
/// the CUE/audio prefixes here are already uppercase-normalized so we
/// don't need the case-fold glob the original used).
fn remove_old_symlinks(directory: &Path, prefix: &str) {
    let entries = match std::fs::read_dir(directory) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        if !rest.starts_with('.') {
            continue;
        }
        if path.is_symlink() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove old symlink {}: {}", path.display(), e);
            } else {
                debug!("Removed old symlink: {}", path.display());
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn write_file(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = update_latest_symlinks(dir.path(), &dir.path().join("nope.wav"), AudioType::Stt);
        assert!(result.is_none());
    }

    #[test]
    fn extensionless_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "noext");
        assert!(update_latest_symlinks(dir.path(), &path, AudioType::Stt).is_none());
    }

    #[test]
    fn creates_both_symlinks_with_relative_targets() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "2026/02/123_cid_stt.wav");

        let (type_link, latest_link) =
            update_latest_symlinks(dir.path(), &file, AudioType::Stt).unwrap();

        assert_eq!(type_link, dir.path().join("latest-STT.wav"));
        assert_eq!(latest_link, dir.path().join("latest.wav"));
        assert!(type_link.is_symlink());
        assert!(latest_link.is_symlink());
        assert_eq!(
            std::fs::read_link(&type_link).unwrap(),
            PathBuf::from("2026/02/123_cid_stt.wav")
        );
    }

    /// S5: writing a second file with a different extension must leave no
    /// stale `.wav` symlinks and point `latest`/`latest-STT` at the `.mp3`.
    #[test]
    fn extension_change_removes_stale_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(dir.path(), "2026/02/123_cid_stt.wav");
        update_latest_symlinks(dir.path(), &first, AudioType::Stt).unwrap();

        let second = write_file(dir.path(), "2026/02/456_cid_stt.mp3");
        let (type_link, latest_link) =
            update_latest_symlinks(dir.path(), &second, AudioType::Stt).unwrap();

        assert!(!dir.path().join("latest-STT.wav").exists());
        assert!(!dir.path().join("latest.wav").exists());
        assert_eq!(type_link, dir.path().join("latest-STT.mp3"));
        assert_eq!(latest_link, dir.path().join("latest.mp3"));
        assert_eq!(
            std::fs::read_link(&latest_link).unwrap(),
            PathBuf::from("2026/02/456_cid_stt.mp3")
        );
    }

    #[test]
    fn only_one_latest_and_one_type_symlink_per_type_survive() {
        let dir = tempfile::tempdir().unwrap();
        let stt_file = write_file(dir.path(), "2026/02/1_a_stt.wav");
        update_latest_symlinks(dir.path(), &stt_file, AudioType::Stt).unwrap();
        let tts_file = write_file(dir.path(), "2026/02/2_a_tts.wav");
        update_latest_symlinks(dir.path(), &tts_file, AudioType::Tts).unwrap();

        let links: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().is_symlink())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();

        assert_eq!(links.iter().filter(|n| n.starts_with("latest-STT")).count(), 1);
        assert_eq!(links.iter().filter(|n| n.starts_with("latest-TTS")).count(), 1);
        assert_eq!(links.iter().filter(|n| *n == "latest.wav").count(), 1);
    }
}
