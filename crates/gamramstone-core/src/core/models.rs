//! Video and Caption Data Models
//!
//! Defines the videos listed per channel tab and the per-language caption
//! tracks that translators work on.
//!
//! # Overview
//!
//! - A [`Video`] owns an ordered sequence of [`CaptionTrack`]s, keyed by
//!   language code. No two tracks of one video share a language.
//! - A [`CaptionTrack`] carries its [`WorkStatus`], the localized title and
//!   description, and the caption files produced for it.
//! - [`CaptionFile`]s are immutable once attached to a track.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{CoreError, LanguageCode, VideoId};

// =============================================================================
// Work Status
// =============================================================================

/// Translation progress of a caption track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    /// Nothing produced yet
    Waiting,
    /// Translation in progress; contents are hidden from viewers
    Wip,
    /// Translation applied and confirmed
    Done,
}

impl WorkStatus {
    /// Tabs of the channel page, in display order
    pub const TABS: [WorkStatus; 3] = [WorkStatus::Waiting, WorkStatus::Done, WorkStatus::Wip];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Wip => "wip",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(Self::Waiting),
            "wip" | "ongoing" => Ok(Self::Wip),
            "done" => Ok(Self::Done),
            other => Err(CoreError::ValidationError(format!(
                "Unknown work status: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Caption File
// =============================================================================

/// A caption file produced for a track
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionFile {
    pub filename: String,
    /// Remote download URL
    pub url: String,
    /// Size in bytes
    pub size: u64,
    /// Media type (e.g. "text/plain")
    #[serde(rename = "type")]
    pub media_type: String,
}

impl CaptionFile {
    /// File name without its extension, used as the caption track name
    pub fn stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.filename,
        }
    }
}

// =============================================================================
// Caption Track
// =============================================================================

/// Localized metadata and caption files of one language of a video
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub language: LanguageCode,
    pub status: WorkStatus,
    pub title: String,
    pub description: String,
    #[serde(rename = "captions", default, deserialize_with = "null_as_empty")]
    pub files: Vec<CaptionFile>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<CaptionFile>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<CaptionFile>>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Video
// =============================================================================

/// A platform video with its caption tracks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "VideoRecord")]
pub struct Video {
    pub id: VideoId,
    pub url: String,
    pub title: String,
    pub description: String,
    pub upload_date: String,
    pub captions: Vec<CaptionTrack>,
}

/// Wire shape of a video before the track invariants are checked
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoRecord {
    id: VideoId,
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    upload_date: String,
    #[serde(default)]
    captions: Vec<CaptionTrack>,
}

impl TryFrom<VideoRecord> for Video {
    type Error = CoreError;

    fn try_from(record: VideoRecord) -> Result<Self, Self::Error> {
        let video = Video {
            id: record.id,
            url: record.url,
            title: record.title,
            description: record.description,
            upload_date: record.upload_date,
            captions: record.captions,
        };
        video.validate()?;
        Ok(video)
    }
}

impl Video {
    /// Checks that every track language is unique within this video
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::with_capacity(self.captions.len());
        for track in &self.captions {
            if !seen.insert(track.language.as_str()) {
                return Err(CoreError::ValidationError(format!(
                    "Video {} has duplicate caption language {}",
                    self.id, track.language
                )));
            }
        }
        Ok(())
    }

    /// YouTube id parsed from the canonical URL, falling back to `id`
    pub fn platform_id(&self) -> &str {
        youtube_id(&self.url).unwrap_or(&self.id)
    }

    /// Returns true when `video_id` names this video
    pub fn matches(&self, video_id: &str) -> bool {
        self.id == video_id || self.platform_id() == video_id
    }

    /// Returns the caption track for a language
    pub fn track(&self, language: &str) -> Option<&CaptionTrack> {
        self.captions.iter().find(|t| t.language == language)
    }

    /// Upload timestamp, when the backend sent an RFC 3339 value
    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.upload_date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Extracts the video id from a YouTube URL.
///
/// Accepts `watch?v=`, `youtu.be/`, `/shorts/` and `/embed/` forms.
pub fn youtube_id(url: &str) -> Option<&str> {
    let rest = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let (host, path) = rest.split_once('/')?;
    let host = host.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => path.split(['?', '#', '/']).next(),
        "youtube.com" | "music.youtube.com" => {
            if let Some(query) = path
                .strip_prefix("watch?")
                .or_else(|| path.split_once("watch?").map(|(_, q)| q))
            {
                query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("v="))
                    .map(|v| v.split('#').next().unwrap_or(v))
            } else {
                path.strip_prefix("shorts/")
                    .or_else(|| path.strip_prefix("embed/"))
                    .and_then(|p| p.split(['?', '#', '/']).next())
            }
        }
        _ => None,
    }?;

    let valid = !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(candidate)
}

// =============================================================================
// Channel Statistics
// =============================================================================

/// Upload progress of a channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStat {
    pub uploaded: u64,
    pub waiting: u64,
}

impl ChannelStat {
    /// Fraction of uploaded videos (0.0 when nothing is tracked)
    pub fn progress(&self) -> f64 {
        let total = self.uploaded + self.waiting;
        if total == 0 {
            return 0.0;
        }
        self.uploaded as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_json(languages: &[&str]) -> String {
        let tracks: Vec<String> = languages
            .iter()
            .map(|lang| {
                format!(
                    r#"{{"language":"{}","status":"waiting","title":"t","description":"d","captions":null}}"#,
                    lang
                )
            })
            .collect();
        format!(
            r#"{{"id":"abc","url":"https://youtube.com/watch?v=abc","title":"T","description":"D","uploadDate":"2022-05-01T12:00:00Z","captions":[{}]}}"#,
            tracks.join(",")
        )
    }

    #[test]
    fn test_video_deserialization() {
        let video: Video = serde_json::from_str(&video_json(&["en", "ja"])).unwrap();
        assert_eq!(video.captions.len(), 2);
        assert!(video.captions[0].files.is_empty());
        assert_eq!(video.track("ja").unwrap().status, WorkStatus::Waiting);
        assert!(video.uploaded_at().is_some());
    }

    #[test]
    fn test_duplicate_languages_rejected() {
        let result = serde_json::from_str::<Video>(&video_json(&["en", "en"]));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("duplicate caption language"));
    }

    #[test]
    fn test_caption_file_wire_names() {
        let json = r#"{"filename":"test.ytt","size":376064,"url":"https://files.example/1","type":"text/plain"}"#;
        let file: CaptionFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.media_type, "text/plain");
        assert_eq!(file.stem(), "test");
        assert!(serde_json::to_string(&file).unwrap().contains("\"type\""));
    }

    #[test]
    fn test_youtube_id_forms() {
        assert_eq!(youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(
            youtube_id("https://youtube.com/watch?feature=share&v=abc_-1"),
            Some("abc_-1")
        );
        assert_eq!(youtube_id("https://youtu.be/xyz123?t=10"), Some("xyz123"));
        assert_eq!(youtube_id("https://www.youtube.com/shorts/short1"), Some("short1"));
        assert_eq!(youtube_id("https://www.youtube.com/embed/emb1"), Some("emb1"));
        assert_eq!(youtube_id("https://example.com/watch?v=abc"), None);
        assert_eq!(youtube_id("not a url"), None);
    }

    #[test]
    fn test_video_matches_id_or_url() {
        let mut video: Video = serde_json::from_str(&video_json(&["en"])).unwrap();
        video.id = "internal-1".to_string();
        assert!(video.matches("internal-1"));
        assert!(video.matches("abc"));
        assert!(!video.matches("other"));
    }

    #[test]
    fn test_work_status_parse_and_tabs() {
        assert_eq!("ongoing".parse::<WorkStatus>().unwrap(), WorkStatus::Wip);
        assert_eq!(WorkStatus::TABS[1], WorkStatus::Done);
        assert!("finished".parse::<WorkStatus>().is_err());
    }

    #[test]
    fn test_channel_stat_progress() {
        assert_eq!(ChannelStat::default().progress(), 0.0);
        let stat = ChannelStat {
            uploaded: 3,
            waiting: 1,
        };
        assert!((stat.progress() - 0.75).abs() < f64::EPSILON);
    }
}
