//! URL classification

use serde::{Deserialize, Serialize};

/// Which page parser a URL needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlKind {
    /// `video/av…` or `video/BV…`
    Video,
    /// `bangumi/play/ss…`, resolved through its newest episode
    Season,
    /// `bangumi/play/ep…`
    Episode,
}

const PATTERNS: [(&str, UrlKind); 4] = [
    ("video/av", UrlKind::Video),
    ("video/BV", UrlKind::Video),
    ("play/ss", UrlKind::Season),
    ("play/ep", UrlKind::Episode),
];

impl UrlKind {
    pub fn tag(self) -> &'static str {
        match self {
            UrlKind::Video => "BV",
            UrlKind::Season => "ss",
            UrlKind::Episode => "ep",
        }
    }

    /// Tag for an optional classification; unsupported URLs get `""`
    pub fn tag_of(kind: Option<UrlKind>) -> &'static str {
        kind.map(UrlKind::tag).unwrap_or("")
    }
}

/// Classify a URL by its path shape
pub fn check_url(url: &str) -> Option<UrlKind> {
    PATTERNS
        .iter()
        .find(|(pattern, _)| url.contains(pattern))
        .map(|(_, kind)| *kind)
}
