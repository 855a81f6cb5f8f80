// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Exported inference artifact runtime.
//!
//! Trained networks are exported (outside this crate) as a static ONNX
//! computation graph accepting one `[1, T, 33, 3]` sequence with `T`
//! dynamic, and producing two named outputs: classification logits and
//! regression predictions. This module loads such an artifact with ONNX
//! Runtime and runs it on assembled sequences.

use std::path::Path;

use ndarray::{Array1, Array3, Array4, Axis};
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::{Result, SequenceError};
use crate::joints::{NUM_CHANNELS, NUM_JOINTS};

/// Name of the classification logits output in exported graphs.
pub const OUTPUT_LOGITS: &str = "logits";

/// Name of the regression predictions output in exported graphs.
pub const OUTPUT_PREDS: &str = "preds";

/// Output of an artifact inference call.
///
/// A `None` slot means the exported graph does not carry that head.
#[derive(Debug, Clone, Default)]
pub struct ArtifactOutput {
    /// Raw multi-label classification logits.
    pub logits: Option<Array1<f32>>,
    /// Continuous regression predictions.
    pub preds: Option<Array1<f32>>,
}

/// An exported temporal network loaded for inference.
pub struct TcnArtifact {
    /// ONNX Runtime session.
    session: Session,
    /// Input tensor name.
    input_name: String,
    /// Output tensor names.
    output_names: Vec<String>,
}

impl TcnArtifact {
    /// Load an exported artifact from an ONNX file.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::NotFound`] if the file does not exist, or
    /// [`SequenceError::ModelLoad`] if the graph cannot be loaded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_threads(path, 0)
    }

    /// Load an exported artifact with an explicit intra-op thread count.
    ///
    /// `0` lets ONNX Runtime choose.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::NotFound`] if the file does not exist, or
    /// [`SequenceError::ModelLoad`] if the graph cannot be loaded.
    pub fn load_with_threads<P: AsRef<Path>>(path: P, intra_threads: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SequenceError::NotFound(format!(
                "artifact not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| {
                SequenceError::ModelLoad(format!("failed to create session builder: {e}"))
            })?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| {
                SequenceError::ModelLoad(format!("failed to set optimization level: {e}"))
            })?
            .with_intra_threads(intra_threads)
            .map_err(|e| {
                SequenceError::ModelLoad(format!("failed to set intra-thread count: {e}"))
            })?
            .commit_from_file(path)
            .map_err(|e| SequenceError::ModelLoad(format!("failed to load artifact: {e}")))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "x".to_string());
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        Ok(Self {
            session,
            input_name,
            output_names,
        })
    }

    /// Whether the exported graph carries the classification head.
    #[must_use]
    pub fn has_classification(&self) -> bool {
        self.output_names.iter().any(|n| n == OUTPUT_LOGITS)
    }

    /// Whether the exported graph carries the regression head.
    #[must_use]
    pub fn has_regression(&self) -> bool {
        self.output_names.iter().any(|n| n == OUTPUT_PREDS)
    }

    /// The graph's input tensor name.
    #[must_use]
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// The graph's output tensor names.
    #[must_use]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Run inference on one assembled sequence of shape `[T, 33, 3]`.
    ///
    /// The sequence is fed to the graph as `[1, T, 33, 3]`; each output
    /// slot is filled only when the graph exports that head.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Inference`] on a shape mismatch or a
    /// runtime failure.
    pub fn predict(&mut self, sequence: &Array3<f32>) -> Result<ArtifactOutput> {
        let (t_len, j_len, c_len) = sequence.dim();
        if j_len != NUM_JOINTS || c_len != NUM_CHANNELS {
            return Err(SequenceError::Inference(format!(
                "expected input shaped [T, {NUM_JOINTS}, {NUM_CHANNELS}], got [{t_len}, {j_len}, {c_len}]"
            )));
        }

        let input: Array4<f32> = sequence.clone().insert_axis(Axis(0));
        let input_contiguous = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input_contiguous).map_err(|e| {
            SequenceError::Inference(format!("failed to create input tensor: {e}"))
        })?;

        let inputs = ort::inputs![&self.input_name => input_tensor];
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| SequenceError::Inference(format!("inference failed: {e}")))?;

        let mut result = ArtifactOutput::default();
        for name in &self.output_names {
            let slot = match name.as_str() {
                OUTPUT_LOGITS => &mut result.logits,
                OUTPUT_PREDS => &mut result.preds,
                _ => continue,
            };
            let output = outputs.get(name.as_str()).ok_or_else(|| {
                SequenceError::Inference(format!("output '{name}' not found"))
            })?;
            let (_, data) = output.try_extract_tensor::<f32>().map_err(|e| {
                SequenceError::Inference(format!("failed to extract output '{name}': {e}"))
            })?;
            *slot = Some(Array1::from_vec(data.to_vec()));
        }

        Ok(result)
    }
}

impl std::fmt::Debug for TcnArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcnArtifact")
            .field("input_name", &self.input_name)
            .field("output_names", &self.output_names)
            .finish()
    }
}
