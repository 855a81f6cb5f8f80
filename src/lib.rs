// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]

//! # Motionseq
//!
//! Pose keypoint sequence modeling library written in Rust: turns per-frame
//! 2D body landmarks extracted from video into normalized, fixed-schema
//! numeric sequences and models them with a dilated-causal temporal
//! convolutional network carrying independent multi-label classification
//! and continuous regression heads.
//!
//! ## Features
//!
//! - **Canonical joint axis** - 33 fixed, named body landmarks define the
//!   array axis used everywhere downstream
//! - **Per-frame normalization** - pelvis-centered, shoulder-width-scaled
//!   coordinates, invariant to subject position and apparent size
//! - **Event windowing** - crop sequences to an inclusive time window
//!   around an anchor event
//! - **Dataset assembly** - indexed access over serialized sample splits,
//!   `[T, 33, 3]` array construction, fixed-order annotation vectors,
//!   minimum-length batch collation
//! - **Causal temporal backbone** - residual blocks with exponentially
//!   dilated causal convolutions; position `t` never sees the future
//! - **ONNX Runtime** - run exported artifacts through [`TcnArtifact`]
//! - **Bounded extraction pool** - fan videos out over isolated workers
//!   with per-item failure reporting
//!
//! ## Quick Start
//!
//! ```no_run
//! use motionseq::{collate, PoseSequenceDataset, TcnConfig, TemporalConvNet};
//!
//! fn main() -> Result<(), motionseq::SequenceError> {
//!     // Indexed access over data/train/*.json sample files
//!     let dataset = PoseSequenceDataset::open("data", "train")?;
//!     let samples = (0..dataset.len().min(8))
//!         .map(|i| dataset.get(i))
//!         .collect::<Result<Vec<_>, _>>()?;
//!
//!     // Batch arrays are truncated to the shortest sequence in the batch
//!     let batch = collate(&samples)?;
//!
//!     let model = TemporalConvNet::new(TcnConfig::default());
//!     let output = model.forward(&batch.x)?;
//!     if let Some(logits) = &output.logits {
//!         println!("logits for {} samples", logits.nrows());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Running an exported artifact on a single sequence:
//!
//! ```no_run
//! use motionseq::{assemble_sequence, SampleRecord, TcnArtifact};
//!
//! # fn main() -> Result<(), motionseq::SequenceError> {
//! let record = SampleRecord::load("sample.json")?;
//! let sequence = assemble_sequence(&record);
//!
//! let mut artifact = TcnArtifact::load("tcn.onnx")?;
//! let output = artifact.predict(&sequence)?;
//! if let Some(preds) = &output.preds {
//!     println!("predictions: {preds}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`joints`] | Canonical 33-joint table and name lookup |
//! | [`record`] | On-disk JSON schema for extracted sequences |
//! | [`normalize`] | Per-frame translation/scale normalization |
//! | [`window`] | Anchor-relative time-window cropping |
//! | [`dataset`] | Split discovery, sample assembly, batch collation |
//! | [`tcn`] | Dilated-causal network, heads, and losses |
//! | [`extract`] | Extraction interface and bounded worker pool |
//! | [`artifact`] | ONNX Runtime for exported artifacts |
//! | [`error`] | Error types ([`SequenceError`], [`Result`]) |

// Modules
pub mod artifact;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod joints;
pub mod normalize;
pub mod record;
pub mod tcn;
pub mod window;

// Re-export main types for convenience
pub use artifact::{ArtifactOutput, TcnArtifact, OUTPUT_LOGITS, OUTPUT_PREDS};
pub use dataset::{
    assemble_sequence, collate, AnnotationBatch, AnnotationVector, PoseBatch, PoseSample,
    PoseSequenceDataset,
};
pub use error::{Result, SequenceError};
pub use extract::{extract_batch, BatchExtraction, KeypointExtractor};
pub use joints::{joint_index, JOINT_NAMES, NUM_CHANNELS, NUM_JOINTS};
pub use normalize::normalize_sequence_xy;
pub use record::{FrameRecord, Keypoint, SampleRecord, WindowMeta};
pub use tcn::{
    bce_with_logits_loss, smooth_l1_loss, CausalConv1d, TcnConfig, TcnOutput, TemporalBlock,
    TemporalConvNet,
};
pub use window::crop_window;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
