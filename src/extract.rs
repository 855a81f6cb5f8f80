// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Keypoint extraction interface and batch worker pool.
//!
//! Keypoint detection itself is an external capability: video decoding and
//! landmark models live behind the [`KeypointExtractor`] trait so detectors
//! can be swapped without touching normalization, assembly, or the network.
//!
//! [`extract_batch`] fans a list of videos out over a bounded worker pool.
//! Every task constructs its own extractor instance, so no detection model
//! is shared across tasks; one task's failure is reported and excluded from
//! the results without cancelling or corrupting its siblings. There is no
//! retry and no per-task timeout.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::{Result, SequenceError};
use crate::record::SampleRecord;

/// The external keypoint extraction capability.
///
/// Implementations open a video, run landmark detection on every `stride`-th
/// frame, and return the frames in the sample record schema at the video's
/// reported frame rate. A frame where detection found nothing carries
/// all-zero keypoints.
pub trait KeypointExtractor {
    /// Extract a keypoint sequence from one video.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Extraction`] when the video cannot be
    /// opened or decoded, and [`SequenceError::NotFound`] when the locator
    /// does not resolve to a file.
    fn extract(&mut self, video: &Path, stride: usize) -> Result<SampleRecord>;
}

/// Outcome of a batch extraction run.
///
/// Successes and failures are reported side by side; a failed item never
/// aborts the batch.
#[derive(Debug)]
pub struct BatchExtraction {
    /// Successfully extracted samples, one per video.
    pub samples: Vec<(PathBuf, SampleRecord)>,
    /// Failed items with their terminal errors.
    pub failures: Vec<(PathBuf, SequenceError)>,
}

impl BatchExtraction {
    /// Total number of items processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.samples.len() + self.failures.len()
    }
}

/// Extract keypoint sequences from a batch of videos on a bounded pool.
///
/// Runs `workers` threads; each task calls `make_extractor` for a private
/// extractor instance, so implementations need no internal synchronization.
/// Per-item failures are logged and collected into the result.
///
/// # Errors
///
/// Returns [`SequenceError::Config`] only if the worker pool itself cannot
/// be built; per-item failures are reported in [`BatchExtraction`].
pub fn extract_batch<E, F>(
    videos: &[PathBuf],
    stride: usize,
    workers: usize,
    make_extractor: F,
) -> Result<BatchExtraction>
where
    E: KeypointExtractor,
    F: Fn() -> E + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| SequenceError::Config(format!("failed to build extraction pool: {e}")))?;

    let outcomes: Vec<(PathBuf, Result<SampleRecord>)> = pool.install(|| {
        videos
            .par_iter()
            .map(|path| {
                let mut extractor = make_extractor();
                (path.clone(), extractor.extract(path, stride))
            })
            .collect()
    });

    let mut samples = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(sample) => samples.push((path, sample)),
            Err(err) => {
                log::warn!("extraction failed for {}: {err}", path.display());
                failures.push((path, err));
            }
        }
    }

    Ok(BatchExtraction { samples, failures })
}
