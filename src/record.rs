// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! On-disk record schema for extracted keypoint sequences.
//!
//! These types mirror the JSON produced by the keypoint extraction service:
//! one [`SampleRecord`] per video, holding per-frame landmark lists plus
//! optional label/target annotation maps. Deserialization is deliberately
//! lenient (missing fields default to zero) because upstream detection is
//! noisy; malformed entries are repaired, never rejected.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SequenceError};

/// Current sample record schema version.
pub const RECORD_VERSION: u32 = 1;

const fn default_version() -> u32 {
    RECORD_VERSION
}

const fn default_fps() -> f32 {
    30.0
}

/// A single named 2D landmark with a visibility score.
///
/// `x` and `y` are normalized image-relative coordinates in `[0, 1]`;
/// `v` is the detector's visibility confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Joint name; matched against the canonical joint table at assembly.
    #[serde(default)]
    pub name: String,
    /// Normalized x coordinate.
    #[serde(default)]
    pub x: f32,
    /// Normalized y coordinate.
    #[serde(default)]
    pub y: f32,
    /// Visibility score.
    #[serde(default)]
    pub v: f32,
}

/// One video frame's worth of landmarks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Frame index in the source video.
    #[serde(default)]
    pub index: u64,
    /// Timestamp in seconds from the start of the video.
    #[serde(default)]
    pub time_sec: f64,
    /// Reported landmarks; any canonical joint may be absent.
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
}

impl FrameRecord {
    /// Whether the detector reported anything for this frame.
    ///
    /// All-zero keypoints for every joint is the extraction contract's
    /// "no detection" signal.
    #[must_use]
    pub fn has_detection(&self) -> bool {
        self.keypoints
            .iter()
            .any(|kp| kp.x != 0.0 || kp.y != 0.0 || kp.v != 0.0)
    }
}

/// Time window metadata attached by the cropper.
///
/// The window covers `[anchor_sec - pre_ms/1000, anchor_sec + post_ms/1000]`
/// inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowMeta {
    /// Anchor event time in seconds (e.g., a release moment).
    pub anchor_sec: f64,
    /// Milliseconds of context retained before the anchor.
    pub pre_ms: u32,
    /// Milliseconds of context retained after the anchor.
    pub post_ms: u32,
}

/// A full extracted sequence for one video, plus optional annotations.
///
/// Label and target maps use [`BTreeMap`] so key iteration is alphabetical
/// by construction, which is the ordering contract the annotation vectors
/// depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Source video locator, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_video: Option<String>,
    /// Source frame width in pixels.
    #[serde(default)]
    pub width: u32,
    /// Source frame height in pixels.
    #[serde(default)]
    pub height: u32,
    /// Reported frame rate.
    #[serde(default = "default_fps")]
    pub fps: f32,
    /// Per-frame landmark records, in time order.
    #[serde(default)]
    pub frames: Vec<FrameRecord>,
    /// Optional multi-label annotations (name -> 0/1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, f32>>,
    /// Optional continuous regression targets (name -> value).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<BTreeMap<String, f32>>,
    /// Window metadata, present once a sample has been cropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowMeta>,
}

impl Default for SampleRecord {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            source_video: None,
            width: 0,
            height: 0,
            fps: default_fps(),
            frames: Vec::new(),
            labels: None,
            targets: None,
            window: None,
        }
    }
}

impl SampleRecord {
    /// Load a sample record from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::NotFound`] if the file does not exist,
    /// [`SequenceError::Io`] on read failure, or [`SequenceError::Json`]
    /// if the file is not valid JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SequenceError::NotFound(format!(
                "sample file not found: {}",
                path.display()
            )));
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Save a sample record as JSON, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Io`] on write failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Number of frames in the sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the sequence has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
