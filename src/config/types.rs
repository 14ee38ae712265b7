use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub replay: ReplayConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// How far before the current bucket start a record may be stamped and
    /// still be emitted.
    #[serde(with = "humantime_serde")]
    pub retention_slack: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            retention_slack: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Four ASCII bytes opening every output frame.
    pub frame_tag: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frame_tag: "bert".to_string(),
        }
    }
}

impl OutputConfig {
    /// The frame tag as raw bytes, if it is exactly four ASCII characters.
    pub fn tag_bytes(&self) -> Option<[u8; 4]> {
        if !self.frame_tag.is_ascii() {
            return None;
        }
        self.frame_tag.as_bytes().try_into().ok()
    }
}
