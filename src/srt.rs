use crate::error::{ComposeError, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Hard line break understood by the subtitle renderer.
pub const HARD_BREAK: &str = "\\N";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubtitleTrack {
    pub cues: Vec<Cue>,
}

impl SubtitleTrack {
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Re-wraps every cue to at most `limit` characters per row.
    pub fn wrapped(&self, limit: usize) -> SubtitleTrack {
        SubtitleTrack {
            cues: self
                .cues
                .iter()
                .map(|cue| Cue {
                    text: wrap_cue_text(&cue.text, limit),
                    ..cue.clone()
                })
                .collect(),
        }
    }

    pub fn to_srt_string(&self) -> String {
        let mut out = String::new();
        for (i, cue) in self.cues.iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                format_timestamp(cue.start),
                format_timestamp(cue.end),
                cue.text
            ));
        }
        out
    }
}

fn timing_regex() -> Result<&'static Regex> {
    static TIMING_RE: OnceCell<Regex> = OnceCell::new();
    TIMING_RE.get_or_try_init(|| {
        Regex::new(r"^\s*(\d{1,2}:\d{2}:\d{2}[,.]\d{1,3})\s*-->\s*(\d{1,2}:\d{2}:\d{2}[,.]\d{1,3})")
            .map_err(|err| ComposeError::Config(format!("timing regex: {err}")))
    })
}

fn parse_timestamp(ts: &str) -> Option<Duration> {
    let mut parts = ts.split([':', ',', '.']);
    let hh: u64 = parts.next()?.parse().ok()?;
    let mm: u64 = parts.next()?.parse().ok()?;
    let ss: u64 = parts.next()?.parse().ok()?;
    let frac = parts.next()?;
    let ms: u64 = format!("{frac:0<3}").parse().ok()?;
    Some(Duration::from_millis(((hh * 60 + mm) * 60 + ss) * 1000 + ms))
}

pub fn format_timestamp(at: Duration) -> String {
    let total_ms = at.as_millis();
    let ms = total_ms % 1000;
    let secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ms
    )
}

fn strip_italics(line: &str) -> String {
    line.replace("<i>", "").replace("</i>", "")
}

fn normalize(content: &str) -> String {
    content.trim_start_matches('\u{feff}').replace("\r\n", "\n")
}

/// Parses blank-line separated cues. Blocks without a timing line are skipped.
pub fn parse_srt(content: &str) -> Result<SubtitleTrack> {
    let timing = timing_regex()?;
    let content = normalize(content);
    let mut cues = Vec::new();

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block.lines().collect();
        let Some(pos) = lines.iter().position(|line| timing.is_match(line)) else {
            continue;
        };
        let Some(caps) = timing.captures(lines[pos]) else {
            continue;
        };
        let (Some(start), Some(end)) = (parse_timestamp(&caps[1]), parse_timestamp(&caps[2])) else {
            continue;
        };
        let text = lines[pos + 1..]
            .iter()
            .map(|line| strip_italics(line.trim_end()))
            .collect::<Vec<_>>()
            .join("\n");
        cues.push(Cue {
            index: cues.len() + 1,
            start,
            end,
            text,
        });
    }

    Ok(SubtitleTrack { cues })
}

/// Ordered cue text with index, timing and blank lines removed.
pub fn plain_text(content: &str) -> Result<String> {
    let timing = timing_regex()?;
    let content = normalize(content);
    let kept: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.chars().all(|c| c.is_ascii_digit()))
        .filter(|line| !timing.is_match(line))
        .map(strip_italics)
        .collect();
    Ok(kept.join("\n"))
}

/// Flattens cue text to one row and hard-breaks it every `limit` characters.
pub fn wrap_cue_text(text: &str, limit: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    let chars: Vec<char> = flat.chars().collect();
    if limit == 0 || chars.len() <= limit {
        return flat.to_string();
    }
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(HARD_BREAK)
}

/// Strict UTF-8 first, then GBK. Bytes valid in neither are an error.
fn decode_track(path: &Path, bytes: Vec<u8>) -> Result<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            let bytes = err.into_bytes();
            encoding_rs::GBK
                .decode_without_bom_handling_and_without_replacement(&bytes)
                .map(|text| text.into_owned())
                .ok_or_else(|| {
                    ComposeError::io(
                        path,
                        io::Error::new(io::ErrorKind::InvalidData, "subtitle is neither UTF-8 nor GBK"),
                    )
                })
        }
    }
}

pub async fn read_track(path: &Path) -> Result<SubtitleTrack> {
    let bytes = fs::read(path)
        .await
        .map_err(|err| ComposeError::io(path, err))?;
    parse_srt(&decode_track(path, bytes)?)
}

/// Writes through a temporary sibling so readers never see a partial file.
pub fn write_srt(path: &Path, track: &SubtitleTrack) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".srt-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|err| ComposeError::io(dir, err))?;
    tmp.write_all(track.to_srt_string().as_bytes())
        .map_err(|err| ComposeError::io(path, err))?;
    tmp.persist(path)
        .map_err(|err| ComposeError::io(path, err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}1\r\n00:00:01,428 --> 00:00:04,400\r\n<i>Hello</i> there\r\nsecond row\r\n\r\n2\r\n00:00:05,000 --> 00:00:06,5\r\n川普突然现身纽约，马斯克紧急发声！\r\n\r\n";

    #[test]
    fn parses_cues_in_order() {
        let track = parse_srt(SAMPLE).unwrap();
        assert_eq!(track.cues.len(), 2);
        assert_eq!(track.cues[0].start, Duration::from_millis(1428));
        assert_eq!(track.cues[0].end, Duration::from_millis(4400));
        assert_eq!(track.cues[0].text, "Hello there\nsecond row");
        assert_eq!(track.cues[1].end, Duration::from_millis(6500));
    }

    #[test]
    fn plain_text_drops_structure() {
        assert_eq!(
            plain_text(SAMPLE).unwrap(),
            "Hello there\nsecond row\n川普突然现身纽约，马斯克紧急发声！"
        );
        assert_eq!(plain_text("").unwrap(), "");
    }

    #[test]
    fn wraps_by_character_count() {
        assert_eq!(wrap_cue_text("短句", 10), "短句");
        assert_eq!(
            wrap_cue_text("川普突然现身纽约，马斯克紧急发声！", 10),
            "川普突然现身纽约，马\\N斯克紧急发声！"
        );
        assert_eq!(wrap_cue_text("two\nrows ", 20), "two rows");
    }

    #[test]
    fn serializes_back_to_srt() {
        let track = parse_srt(SAMPLE).unwrap().wrapped(10);
        let text = track.to_srt_string();
        assert!(text.starts_with("1\n00:00:01,428 --> 00:00:04,400\nHello ther\\Ne second "));
        let again = parse_srt(&text).unwrap();
        assert_eq!(again.cues.len(), 2);
        assert_eq!(again.cues[1].start, Duration::from_secs(5));
    }

    #[test]
    fn write_is_atomic_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trans_wrapped.srt");
        let track = parse_srt(SAMPLE).unwrap();
        write_srt(&path, &track).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(parse_srt(&written).unwrap(), track);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn reads_gbk_encoded_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trans.srt");
        let mut bytes = b"1\r\n00:00:01,000 --> 00:00:02,000\r\n".to_vec();
        bytes.extend_from_slice(&[0xB4, 0xA8, 0xC6, 0xD5]);
        bytes.extend_from_slice(b"\r\n\r\n");
        std::fs::write(&path, bytes).unwrap();

        let track = read_track(&path).await.unwrap();
        assert_eq!(track.cues.len(), 1);
        assert_eq!(track.cues[0].text, "川普");
    }

    #[tokio::test]
    async fn undecodable_track_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trans.srt");
        let mut bytes = b"1\n00:00:01,000 --> 00:00:02,000\n".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFF, 0x80]);
        std::fs::write(&path, bytes).unwrap();

        match read_track(&path).await.unwrap_err() {
            ComposeError::Io { path: reported, source } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), io::ErrorKind::InvalidData);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
