// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Sample assembly and dataset access.
//!
//! This module turns serialized sample records into the fixed-schema numeric
//! representation the network consumes: a `[T, 33, 3]` array per sample
//! (x, y, visibility along the canonical joint axis), plus fixed-order
//! annotation vectors derived from the optional label/target maps.
//!
//! [`PoseSequenceDataset`] provides indexed, read-only access over the
//! sample files of one split; access is side-effect-free and safe for
//! concurrent workers opening distinct files. [`collate`] builds batch
//! arrays with the deliberate minimum-length truncation policy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{s, Array1, Array2, Array3, Array4, Axis};

use crate::error::{Result, SequenceError};
use crate::joints::{joint_index, NUM_CHANNELS, NUM_JOINTS};
use crate::normalize::normalize_sequence_xy;
use crate::record::SampleRecord;

/// A fixed-order annotation vector.
///
/// Axis position is determined solely by name: entries are ordered
/// alphabetically by key, so the same key set always produces the same
/// axis layout regardless of where the map came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationVector {
    /// Annotation names, alphabetically sorted.
    pub names: Vec<String>,
    /// Values in `names` order.
    pub values: Array1<f32>,
}

impl AnnotationVector {
    fn from_map(map: &BTreeMap<String, f32>) -> Self {
        // BTreeMap iterates in key order, which is the ordering contract.
        Self {
            names: map.keys().cloned().collect(),
            values: map.values().copied().collect(),
        }
    }

    /// Number of annotation entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the vector is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One assembled training sample.
#[derive(Debug, Clone)]
pub struct PoseSample {
    /// Normalized sequence array of shape `[T, 33, 3]`.
    pub x: Array3<f32>,
    /// Label vector, if the sample carries a label map.
    pub labels: Option<AnnotationVector>,
    /// Target vector, if the sample carries a target map.
    pub targets: Option<AnnotationVector>,
    /// Path of the source sample file.
    pub path: PathBuf,
}

impl PoseSample {
    /// Assemble a sample from a record.
    #[must_use]
    pub fn from_record(record: &SampleRecord, path: PathBuf) -> Self {
        Self {
            x: assemble_sequence(record),
            labels: record.labels.as_ref().map(AnnotationVector::from_map),
            targets: record.targets.as_ref().map(AnnotationVector::from_map),
            path,
        }
    }
}

/// Build the normalized `[T, 33, 3]` array for a sample record.
///
/// Every reported landmark is looked up by name against the canonical
/// joint table; unknown names are ignored and unreported canonical joints
/// stay at `(0, 0, 0)`. The xy channels are normalized per frame; the
/// visibility channel is carried through unchanged.
#[must_use]
pub fn assemble_sequence(record: &SampleRecord) -> Array3<f32> {
    let t_len = record.frames.len();
    let mut seq = Array3::zeros((t_len, NUM_JOINTS, NUM_CHANNELS));

    for (t, frame) in record.frames.iter().enumerate() {
        for kp in &frame.keypoints {
            let Some(j) = joint_index(&kp.name) else {
                continue;
            };
            seq[[t, j, 0]] = kp.x;
            seq[[t, j, 1]] = kp.y;
            seq[[t, j, 2]] = kp.v;
        }
    }

    normalize_sequence_xy(seq.slice_mut(s![.., .., 0..2]));
    seq
}

/// Indexed access over the sample files of one dataset split.
#[derive(Debug, Clone)]
pub struct PoseSequenceDataset {
    root: PathBuf,
    split: String,
    files: Vec<PathBuf>,
}

impl PoseSequenceDataset {
    /// Open a split, discovering its sample files.
    ///
    /// Sample files are the `*.json` entries of `root/split/`, in sorted
    /// order so indices are stable across runs.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::NotFound`] if the split directory does not
    /// exist or yields zero sample files.
    pub fn open<P: AsRef<Path>>(root: P, split: &str) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dir = root.join(split);
        if !dir.is_dir() {
            return Err(SequenceError::NotFound(format!(
                "split directory not found: {}",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(SequenceError::NotFound(format!(
                "no sample files found in {}",
                dir.display()
            )));
        }

        Ok(Self {
            root,
            split: split.to_string(),
            files,
        })
    }

    /// Number of samples in the split.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the split has no samples (never true for an open dataset).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The dataset root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The split name.
    #[must_use]
    pub fn split(&self) -> &str {
        &self.split
    }

    /// The discovered sample file paths, in index order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Load and assemble the sample at `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Config`] for an out-of-range index, or the
    /// underlying error if the sample file cannot be read.
    pub fn get(&self, idx: usize) -> Result<PoseSample> {
        let path = self.files.get(idx).ok_or_else(|| {
            SequenceError::Config(format!(
                "sample index {idx} out of range for split '{}' with {} samples",
                self.split,
                self.files.len()
            ))
        })?;
        let record = SampleRecord::load(path)?;
        Ok(PoseSample::from_record(&record, path.clone()))
    }

    /// Check that annotation key sets are consistent across the split.
    ///
    /// Samples without a label (or target) map are fine, since absence means
    /// the sample contributes no vector, but every present map must carry the
    /// same key set, otherwise vector axes would silently disagree between
    /// samples.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Annotation`] naming the two conflicting
    /// files on the first mismatch found.
    pub fn validate_annotations(&self) -> Result<()> {
        let mut label_ref: Option<(Vec<String>, &Path)> = None;
        let mut target_ref: Option<(Vec<String>, &Path)> = None;

        for path in &self.files {
            let record = SampleRecord::load(path)?;
            if let Some(labels) = &record.labels {
                check_keys(labels, "label", path, &mut label_ref)?;
            }
            if let Some(targets) = &record.targets {
                check_keys(targets, "target", path, &mut target_ref)?;
            }
        }
        Ok(())
    }
}

fn check_keys<'a>(
    map: &BTreeMap<String, f32>,
    kind: &str,
    path: &'a Path,
    reference: &mut Option<(Vec<String>, &'a Path)>,
) -> Result<()> {
    let keys: Vec<String> = map.keys().cloned().collect();
    match reference {
        None => {
            *reference = Some((keys, path));
            Ok(())
        }
        Some((ref_keys, ref_path)) if *ref_keys != keys => Err(SequenceError::Annotation(format!(
            "{kind} keys {keys:?} in {} do not match {ref_keys:?} from {}",
            path.display(),
            ref_path.display()
        ))),
        Some(_) => Ok(()),
    }
}

/// A batched annotation matrix of shape `[B, N]` with its shared axis names.
#[derive(Debug, Clone)]
pub struct AnnotationBatch {
    /// Annotation names shared by every row.
    pub names: Vec<String>,
    /// One row per sample, in batch order.
    pub values: Array2<f32>,
}

/// A collated batch of samples.
#[derive(Debug, Clone)]
pub struct PoseBatch {
    /// Batch array of shape `[B, T, 33, 3]`, truncated to the shortest
    /// sequence in the batch.
    pub x: Array4<f32>,
    /// Label matrix, present only when every sample provides labels.
    pub labels: Option<AnnotationBatch>,
    /// Target matrix, present only when every sample provides targets.
    pub targets: Option<AnnotationBatch>,
    /// Source paths, in batch order.
    pub paths: Vec<PathBuf>,
}

impl PoseBatch {
    /// Number of samples in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.dim().0
    }

    /// Whether the batch is empty (never true for a collated batch).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.dim().0 == 0
    }
}

/// Collate samples into a batch.
///
/// The batch temporal length is the minimum `T` across the batch and every
/// sample is truncated to it, a deliberate simplification over padding.
/// A label/target matrix is included only when every sample in the batch
/// provides the corresponding vector; otherwise that field is absent for
/// the whole batch.
///
/// # Errors
///
/// Returns [`SequenceError::Config`] for an empty input slice, or
/// [`SequenceError::Annotation`] when present annotation vectors disagree
/// on their key set.
pub fn collate(samples: &[PoseSample]) -> Result<PoseBatch> {
    if samples.is_empty() {
        return Err(SequenceError::Config(
            "cannot collate an empty batch".to_string(),
        ));
    }

    let t_min = samples
        .iter()
        .map(|sample| sample.x.dim().0)
        .min()
        .unwrap_or(0);

    let views: Vec<_> = samples
        .iter()
        .map(|sample| sample.x.slice(s![..t_min, .., ..]))
        .collect();
    let x = ndarray::stack(Axis(0), &views)
        .map_err(|e| SequenceError::Config(format!("failed to stack batch arrays: {e}")))?;

    let labels = collate_annotations(samples, "label", |sample| sample.labels.as_ref())?;
    let targets = collate_annotations(samples, "target", |sample| sample.targets.as_ref())?;

    Ok(PoseBatch {
        x,
        labels,
        targets,
        paths: samples.iter().map(|sample| sample.path.clone()).collect(),
    })
}

fn collate_annotations<'a, F>(
    samples: &'a [PoseSample],
    kind: &str,
    field: F,
) -> Result<Option<AnnotationBatch>>
where
    F: Fn(&'a PoseSample) -> Option<&'a AnnotationVector>,
{
    let vectors: Option<Vec<&AnnotationVector>> = samples.iter().map(field).collect();
    let Some(vectors) = vectors else {
        // At least one sample lacks the map: the field is absent for the
        // whole batch, never partially filled.
        return Ok(None);
    };

    let names = &vectors[0].names;
    for (sample, vector) in samples.iter().zip(&vectors).skip(1) {
        if &vector.names != names {
            return Err(SequenceError::Annotation(format!(
                "{kind} keys {:?} in {} do not match {names:?} from {}",
                vector.names,
                sample.path.display(),
                samples[0].path.display()
            )));
        }
    }

    let rows: Vec<_> = vectors.iter().map(|vector| vector.values.view()).collect();
    let values = ndarray::stack(Axis(0), &rows)
        .map_err(|e| SequenceError::Config(format!("failed to stack {kind} vectors: {e}")))?;

    Ok(Some(AnnotationBatch {
        names: names.clone(),
        values,
    }))
}
