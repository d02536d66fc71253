//! CUE sheet parsing and CUE/FFmetadata conversion for mpv `--chapters-file`.
//!
//! Ported from `dj/chapters.py`'s `parse_cue_content` and
//! `convert_cue_to_ffmetadata`, plus a new `parse_ffmetadata` so the
//! round-trip invariant in the testable properties has something to parse
//! back into (the original only ever produced FFmetadata for mpv to consume).

const CD_FRAMES_PER_SECOND: u64 = 75;
const DEFAULT_LAST_CHAPTER_SPAN_MS: u64 = 3_600_000;

/// A single named time-range inside an audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: String,
    pub performer: Option<String>,
    pub start_ms: u64,
    pub end_ms: Option<u64>,
}

/// Parse CUE time format `MM:SS:FF` (`FF` = CD frames, 75/s) into milliseconds.
pub fn parse_cue_time(time_str: &str) -> u64 {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return 0;
    }
    let minutes: u64 = parts[0].parse().unwrap_or(0);
    let seconds: u64 = parts[1].parse().unwrap_or(0);
    let frames: u64 = parts[2].parse().unwrap_or(0);
    (minutes * 60 + seconds) * 1000 + (frames * 1000) / CD_FRAMES_PER_SECOND
}

fn quoted_value<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?.trim_start();
    let rest = rest.strip_prefix('"')?;
    rest.strip_suffix('"')
}

/// Parse CUE sheet text into an ordered list of chapters (by `start_ms`).
/// `end_ms` is left unset; call [`compute_end_times`] or
/// [`convert_cue_to_ffmetadata`] to fill it in.
pub fn parse_cue_content(cue_content: &str) -> Vec<Chapter> {
    let mut chapters = Vec::new();
    let mut title: Option<String> = None;
    let mut performer: Option<String> = None;
    let mut start_ms: Option<u64> = None;
    let mut in_track = false;

    let flush = |title: &mut Option<String>, performer: &mut Option<String>, start_ms: &mut Option<u64>, chapters: &mut Vec<Chapter>| {
        if let Some(start) = start_ms.take() {
            chapters.push(Chapter {
                title: title.take().unwrap_or_default(),
                performer: performer.take(),
                start_ms: start,
                end_ms: None,
            });
        } else {
            *title = None;
            *performer = None;
        }
    };

    for raw_line in cue_content.lines() {
        let line = raw_line.trim();

        if line.starts_with("TRACK") {
            flush(&mut title, &mut performer, &mut start_ms, &mut chapters);
            in_track = true;
        } else if in_track && line.starts_with("TITLE") {
            if let Some(v) = quoted_value(line, "TITLE") {
                title = Some(v.to_string());
            }
        } else if in_track && line.starts_with("PERFORMER") {
            if let Some(v) = quoted_value(line, "PERFORMER") {
                performer = Some(v.to_string());
            }
        } else if in_track && line.starts_with("INDEX 01") {
            if let Some(ts) = line.strip_prefix("INDEX 01").map(str::trim) {
                start_ms = Some(parse_cue_time(ts));
            }
        }
    }
    flush(&mut title, &mut performer, &mut start_ms, &mut chapters);

    chapters.sort_by_key(|c| c.start_ms);
    chapters
}

/// Fill in each chapter's `end_ms`: the next chapter's `start_ms`, or for
/// the last chapter, `duration_ms` if known, else `start_ms + 1 hour`.
fn compute_end_times(chapters: &mut [Chapter], duration_ms: Option<u64>) {
    let starts: Vec<u64> = chapters.iter().map(|c| c.start_ms).collect();
    let last = chapters.len().saturating_sub(1);
    for (i, chapter) in chapters.iter_mut().enumerate() {
        chapter.end_ms = Some(if i < last {
            starts[i + 1]
        } else {
            duration_ms.unwrap_or(chapter.start_ms + DEFAULT_LAST_CHAPTER_SPAN_MS)
        });
    }
}

/// Convert CUE sheet text into mpv's FFmetadata chapter format.
pub fn convert_cue_to_ffmetadata(cue_content: &str, duration_ms: Option<u64>) -> String {
    let mut chapters = parse_cue_content(cue_content);
    compute_end_times(&mut chapters, duration_ms);

    let mut out = vec![";FFMETADATA1".to_string()];
    for (i, chapter) in chapters.iter().enumerate() {
        let title = if chapter.title.is_empty() {
            format!("Track {}", i + 1)
        } else {
            chapter.title.clone()
        };
        let title = match &chapter.performer {
            Some(p) => format!("{title} - {p}"),
            None => title,
        };

        out.push(String::new());
        out.push("[CHAPTER]".to_string());
        out.push("TIMEBASE=1/1000".to_string());
        out.push(format!("START={}", chapter.start_ms));
        out.push(format!("END={}", chapter.end_ms.unwrap_or_default()));
        out.push(format!("title={title}"));
    }
    out.join("\n")
}

/// Parse mpv FFmetadata chapter text back into chapters. The `title -
/// performer` suffix added by [`convert_cue_to_ffmetadata`] cannot be
/// losslessly split back into separate fields, so `performer` is always
/// `None` here; round-trip equality is defined over title text, start, and
/// chapter count (see testable properties), not the performer field.
pub fn parse_ffmetadata(content: &str) -> Vec<Chapter> {
    let mut chapters = Vec::new();
    let mut start_ms: Option<u64> = None;
    let mut end_ms: Option<u64> = None;
    let mut title: Option<String> = None;

    let flush = |start_ms: &mut Option<u64>, end_ms: &mut Option<u64>, title: &mut Option<String>, chapters: &mut Vec<Chapter>| {
        if let Some(start) = start_ms.take() {
            chapters.push(Chapter {
                title: title.take().unwrap_or_default(),
                performer: None,
                start_ms: start,
                end_ms: end_ms.take(),
            });
        }
    };

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line == "[CHAPTER]" {
            flush(&mut start_ms, &mut end_ms, &mut title, &mut chapters);
        } else if let Some(v) = line.strip_prefix("START=") {
            start_ms = v.parse().ok();
        } else if let Some(v) = line.strip_prefix("END=") {
            end_ms = v.parse().ok();
        } else if let Some(v) = line.strip_prefix("title=") {
            title = Some(v.to_string());
        }
    }
    flush(&mut start_ms, &mut end_ms, &mut title, &mut chapters);

    chapters
}

pub fn get_chapter_count(cue_content: &str) -> usize {
    parse_cue_content(cue_content).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_timestamps_match_spec_examples() {
        assert_eq!(parse_cue_time("00:00:00"), 0);
        assert_eq!(parse_cue_time("29:04:29"), 1_744_386);
    }

    #[test]
    fn chapter_round_trip_s1_scenario() {
        let cue = r#"
TRACK 01 AUDIO
  TITLE "First Track"
  PERFORMER "Artist One"
  INDEX 01 00:00:00
TRACK 02 AUDIO
  TITLE "Second Track"
  PERFORMER "Artist Two"
  INDEX 01 03:30:00
"#;
        let ff = convert_cue_to_ffmetadata(cue, None);
        assert!(ff.starts_with(";FFMETADATA1"));
        assert!(ff.contains("START=0"));
        assert!(ff.contains("START=210000"));
        assert!(ff.contains("END=210000"));
        assert!(ff.contains("title=First Track - Artist One"));
        assert!(ff.contains("title=Second Track - Artist Two"));

        let parsed = parse_ffmetadata(&ff);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].start_ms, 0);
        assert_eq!(parsed[1].start_ms, 210_000);
        assert_eq!(parsed[0].title, "First Track - Artist One");
    }

    #[test]
    fn last_chapter_without_duration_gets_one_hour_span() {
        let cue = "TRACK 01 AUDIO\n  TITLE \"Only\"\n  INDEX 01 00:00:00\n";
        let ff = convert_cue_to_ffmetadata(cue, None);
        assert!(ff.contains("END=3600000"));
    }

    #[test]
    fn last_chapter_uses_provided_duration() {
        let cue = "TRACK 01 AUDIO\n  TITLE \"Only\"\n  INDEX 01 00:00:00\n";
        let ff = convert_cue_to_ffmetadata(cue, Some(120_000));
        assert!(ff.contains("END=120000"));
    }

    #[test]
    fn untitled_track_falls_back_to_track_number() {
        let cue = "TRACK 01 AUDIO\n  INDEX 01 00:00:00\n";
        let ff = convert_cue_to_ffmetadata(cue, Some(5000));
        assert!(ff.contains("title=Track 1"));
    }

    #[test]
    fn chapter_count_matches_track_count() {
        let cue = "TRACK 01 AUDIO\n  INDEX 01 00:00:00\nTRACK 02 AUDIO\n  INDEX 01 00:01:00\n";
        assert_eq!(get_chapter_count(cue), 2);
    }
}
