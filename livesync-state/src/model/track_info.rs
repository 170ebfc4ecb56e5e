//! Track information type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, application-defined track identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The track the group is playing, plus metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub id: TrackId,
    /// Media source the player should load
    pub src: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Duration in seconds, if known
    pub duration: Option<f64>,
}

impl TrackInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(id),
            src: None,
            title: None,
            artist: None,
            duration: None,
        }
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

impl PartialEq for TrackInfo {
    fn eq(&self, other: &Self) -> bool {
        // Identity is the id plus what the player loads; metadata may be refreshed
        self.id == other.id && self.src == other.src
    }
}
