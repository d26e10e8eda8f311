//! Gamramstone Core Type Definitions
//!
//! Defines fundamental identifiers shared across the client core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CoreError;

// =============================================================================
// ID Types
// =============================================================================

/// Platform-native video identifier (YouTube video id)
pub type VideoId = String;

/// Language code of a caption track (e.g. "en", "ja", "zh")
pub type LanguageCode = String;

/// Bearer credential issued by the identity provider
pub type Credential = String;

/// Notification identifier (ULID)
pub type NoticeId = String;

// =============================================================================
// Channels
// =============================================================================

/// Channels whose videos are tracked for translation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelId {
    Wakgood,
    Waktaverse,
    Ine,
    Jingburger,
    Lilpa,
    Jururu,
    Gosegu,
    Viichan,
}

impl ChannelId {
    /// All known channels, in display order
    pub const ALL: [ChannelId; 8] = [
        ChannelId::Wakgood,
        ChannelId::Waktaverse,
        ChannelId::Ine,
        ChannelId::Jingburger,
        ChannelId::Lilpa,
        ChannelId::Jururu,
        ChannelId::Gosegu,
        ChannelId::Viichan,
    ];

    /// Identifier used by the backend API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wakgood => "wakgood",
            Self::Waktaverse => "waktaverse",
            Self::Ine => "ine",
            Self::Jingburger => "jingburger",
            Self::Lilpa => "lilpa",
            Self::Jururu => "jururu",
            Self::Gosegu => "gosegu",
            Self::Viichan => "viichan",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| CoreError::ValidationError(format!("Unknown channel: {}", s)))
    }
}

// =============================================================================
// Applied Pairs
// =============================================================================

/// A (video, language) pair whose apply was confirmed by the backend
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPair {
    pub video_id: VideoId,
    pub language: LanguageCode,
}

impl AppliedPair {
    pub fn new(video_id: impl Into<VideoId>, language: impl Into<LanguageCode>) -> Self {
        Self {
            video_id: video_id.into(),
            language: language.into(),
        }
    }
}
