// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Dilated-causal temporal convolutional network with dual prediction heads.
//!
//! The backbone is a stack of residual temporal blocks with exponentially
//! growing dilation. Causality is the load-bearing guarantee: position `t`
//! of any layer's output depends only on input positions `<= t`, enforced
//! by left-side padding of `(kernel - 1) * dilation` followed by truncation
//! to the input length.
//!
//! Two independent heads sit on the backbone: multi-label classification
//! logits and continuous regression outputs. Either head exists only when
//! its output width is non-zero at construction time; an absent head means
//! an absent output slot, not zeros.

use ndarray::{Array1, Array2, Array4, Axis};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{Result, SequenceError};
use crate::joints::{NUM_CHANNELS, NUM_JOINTS};

/// Configuration for the temporal convolutional network.
///
/// # Example
///
/// ```rust
/// use motionseq::TcnConfig;
///
/// let config = TcnConfig::new()
///     .with_hidden(128)
///     .with_num_blocks(3)
///     .with_num_labels(4)
///     .with_num_targets(2);
/// assert_eq!(config.input_channels(), 99);
/// ```
#[derive(Debug, Clone)]
pub struct TcnConfig {
    /// Number of joints along the input's `J` axis.
    pub num_joints: usize,
    /// Channels per joint (x, y, visibility).
    pub channels_per_joint: usize,
    /// Hidden channel width of the backbone.
    pub hidden: usize,
    /// Number of residual blocks; block `b` uses dilation `2^b`.
    pub num_blocks: usize,
    /// Convolution kernel size.
    pub kernel_size: usize,
    /// Classification head width; `0` disables the head.
    pub num_labels: usize,
    /// Regression head width; `0` disables the head.
    pub num_targets: usize,
    /// Dropout probability, applied stochastically in training mode only.
    pub dropout: f32,
}

impl Default for TcnConfig {
    fn default() -> Self {
        Self {
            num_joints: NUM_JOINTS,
            channels_per_joint: NUM_CHANNELS,
            hidden: 256,
            num_blocks: 4,
            kernel_size: 3,
            num_labels: 4,
            num_targets: 2,
            dropout: 0.1,
        }
    }
}

impl TcnConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hidden channel width.
    #[must_use]
    pub const fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the number of residual blocks.
    #[must_use]
    pub const fn with_num_blocks(mut self, num_blocks: usize) -> Self {
        self.num_blocks = num_blocks;
        self
    }

    /// Set the convolution kernel size.
    #[must_use]
    pub const fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    /// Set the classification head width (`0` disables the head).
    #[must_use]
    pub const fn with_num_labels(mut self, num_labels: usize) -> Self {
        self.num_labels = num_labels;
        self
    }

    /// Set the regression head width (`0` disables the head).
    #[must_use]
    pub const fn with_num_targets(mut self, num_targets: usize) -> Self {
        self.num_targets = num_targets;
        self
    }

    /// Set the dropout probability.
    #[must_use]
    pub const fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    /// Flattened input channel count (`J * C`).
    #[must_use]
    pub const fn input_channels(&self) -> usize {
        self.num_joints * self.channels_per_joint
    }

    /// Receptive field of the full backbone in time steps.
    #[must_use]
    pub fn receptive_field(&self) -> usize {
        let dilation_sum: usize = (0..self.num_blocks).map(|b| 1 << b).sum();
        1 + 2 * (self.kernel_size - 1) * dilation_sum
    }
}

/// A 1D convolution with causal left padding.
///
/// The input is padded on the left by `(kernel - 1) * dilation` zeros and
/// the output truncated to the input length, so output position `t` reads
/// input positions `t, t - dilation, ..., t - (kernel - 1) * dilation`
/// only.
#[derive(Debug, Clone)]
pub struct CausalConv1d {
    /// Weights laid out `[out_channels, in_channels * kernel_size]`.
    weights: Array2<f32>,
    /// Per-output-channel bias.
    bias: Array1<f32>,
    kernel_size: usize,
    dilation: usize,
    in_channels: usize,
    out_channels: usize,
}

impl CausalConv1d {
    /// Create a layer with He-style random initialization and zero bias.
    #[must_use]
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, dilation: usize) -> Self {
        let mut rng = rand::thread_rng();
        let std = (2.0 / (in_channels * kernel_size) as f32).sqrt();
        let weights = Array2::from_shape_fn((out_channels, in_channels * kernel_size), |_| {
            let z: f32 = rng.sample(StandardNormal);
            z * std
        });

        Self {
            weights,
            bias: Array1::zeros(out_channels),
            kernel_size,
            dilation,
            in_channels,
            out_channels,
        }
    }

    /// Left padding required for causal alignment.
    #[must_use]
    pub const fn padding(&self) -> usize {
        (self.kernel_size - 1) * self.dilation
    }

    /// Receptive field of this single layer.
    #[must_use]
    pub const fn receptive_field(&self) -> usize {
        1 + (self.kernel_size - 1) * self.dilation
    }

    /// Number of output channels.
    #[must_use]
    pub const fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Apply the convolution to a `[in_channels, T]` input, producing
    /// `[out_channels, T]`.
    ///
    /// # Panics
    ///
    /// Panics if the input channel count does not match the layer.
    #[must_use]
    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let (in_channels, seq_len) = input.dim();
        assert_eq!(in_channels, self.in_channels, "input channel mismatch");

        let padding = self.padding();
        let mut padded = Array2::zeros((in_channels, seq_len + padding));
        padded
            .slice_mut(ndarray::s![.., padding..])
            .assign(input);

        let mut output = Array2::zeros((self.out_channels, seq_len));
        for t in 0..seq_len {
            for o in 0..self.out_channels {
                let mut sum = self.bias[o];
                for ci in 0..in_channels {
                    for j in 0..self.kernel_size {
                        // Tap j reads original position t - (kernel-1-j)*dilation.
                        sum += self.weights[[o, ci * self.kernel_size + j]]
                            * padded[[ci, t + j * self.dilation]];
                    }
                }
                output[[o, t]] = sum;
            }
        }
        output
    }

    /// Total number of parameters.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

/// One residual temporal block: two dilated causal convolutions separated
/// by ReLU and dropout, with a 1x1 projection on the residual path when the
/// channel width changes.
#[derive(Debug, Clone)]
pub struct TemporalBlock {
    conv1: CausalConv1d,
    conv2: CausalConv1d,
    downsample: Option<CausalConv1d>,
    dropout: f32,
}

impl TemporalBlock {
    /// Create a block with dilation shared by both convolutions.
    #[must_use]
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dilation: usize,
        dropout: f32,
    ) -> Self {
        let downsample = if in_channels != out_channels {
            Some(CausalConv1d::new(in_channels, out_channels, 1, 1))
        } else {
            None
        };

        Self {
            conv1: CausalConv1d::new(in_channels, out_channels, kernel_size, dilation),
            conv2: CausalConv1d::new(out_channels, out_channels, kernel_size, dilation),
            downsample,
            dropout,
        }
    }

    fn relu(x: &Array2<f32>) -> Array2<f32> {
        x.mapv(|v| v.max(0.0))
    }

    /// Inverted dropout: zero with probability `p`, scale kept values by
    /// `1 / (1 - p)` so inference needs no rescaling.
    fn dropout(&self, x: &Array2<f32>, training: bool) -> Array2<f32> {
        if !training || self.dropout <= 0.0 {
            return x.clone();
        }
        let keep = 1.0 - self.dropout;
        let mut rng = rand::thread_rng();
        x.mapv(|v| if rng.gen::<f32>() < keep { v / keep } else { 0.0 })
    }

    /// Apply the block to a `[in_channels, T]` input.
    #[must_use]
    pub fn forward(&self, input: &Array2<f32>, training: bool) -> Array2<f32> {
        let out = self.conv1.forward(input);
        let out = Self::relu(&out);
        let out = self.dropout(&out, training);

        let out = self.conv2.forward(&out);
        let out = Self::relu(&out);
        let out = self.dropout(&out, training);

        let residual = match &self.downsample {
            Some(conv) => conv.forward(input),
            None => input.clone(),
        };
        out + residual
    }

    /// Whether the residual path carries a 1x1 projection.
    #[must_use]
    pub const fn has_projection(&self) -> bool {
        self.downsample.is_some()
    }

    /// Total number of parameters.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        let mut params = self.conv1.num_parameters() + self.conv2.num_parameters();
        if let Some(conv) = &self.downsample {
            params += conv.num_parameters();
        }
        params
    }
}

/// A prediction head: 1x1 projection, ReLU, global average pool over time,
/// then a linear layer to the output width.
#[derive(Debug, Clone)]
struct PredictionHead {
    proj: CausalConv1d,
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl PredictionHead {
    fn new(hidden: usize, out: usize) -> Self {
        let mut rng = rand::thread_rng();
        let std = (2.0 / hidden as f32).sqrt();
        let weight = Array2::from_shape_fn((out, hidden), |_| {
            let z: f32 = rng.sample(StandardNormal);
            z * std
        });

        Self {
            proj: CausalConv1d::new(hidden, hidden, 1, 1),
            weight,
            bias: Array1::zeros(out),
        }
    }

    /// Map backbone features `[hidden, T]` to an output vector.
    fn forward(&self, feats: &Array2<f32>) -> Array1<f32> {
        let h = self.proj.forward(feats).mapv(|v| v.max(0.0));
        let hidden = h.dim().0;
        let pooled = h
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(hidden));

        let mut out = self.bias.clone();
        for (o, row) in self.weight.rows().into_iter().enumerate() {
            out[o] += row.dot(&pooled);
        }
        out
    }
}

/// Output of a forward pass.
///
/// A `None` slot means the corresponding head does not exist on this
/// network, not that it predicted zeros.
#[derive(Debug, Clone, Default)]
pub struct TcnOutput {
    /// Raw multi-label classification logits, `[B, num_labels]`.
    pub logits: Option<Array2<f32>>,
    /// Continuous regression predictions, `[B, num_targets]`.
    pub preds: Option<Array2<f32>>,
}

/// The dilated-causal temporal convolutional network.
///
/// # Example
///
/// ```rust
/// use motionseq::{TcnConfig, TemporalConvNet};
/// use ndarray::Array4;
///
/// let config = TcnConfig::new().with_hidden(16).with_num_blocks(2);
/// let model = TemporalConvNet::new(config);
/// let batch = Array4::<f32>::zeros((1, 12, 33, 3));
/// let output = model.forward(&batch).unwrap();
/// assert_eq!(output.logits.unwrap().dim(), (1, 4));
/// ```
#[derive(Debug, Clone)]
pub struct TemporalConvNet {
    config: TcnConfig,
    blocks: Vec<TemporalBlock>,
    head_cls: Option<PredictionHead>,
    head_reg: Option<PredictionHead>,
    training: bool,
}

impl TemporalConvNet {
    /// Build a network from a configuration.
    ///
    /// The heads are construction-time capabilities: a head exists iff its
    /// configured width is non-zero. The network starts in inference mode.
    #[must_use]
    pub fn new(config: TcnConfig) -> Self {
        let mut blocks = Vec::with_capacity(config.num_blocks);
        let mut channels = config.input_channels();
        for b in 0..config.num_blocks {
            blocks.push(TemporalBlock::new(
                channels,
                config.hidden,
                config.kernel_size,
                1 << b,
                config.dropout,
            ));
            channels = config.hidden;
        }

        let head_cls = (config.num_labels > 0)
            .then(|| PredictionHead::new(channels, config.num_labels));
        let head_reg = (config.num_targets > 0)
            .then(|| PredictionHead::new(channels, config.num_targets));

        Self {
            config,
            blocks,
            head_cls,
            head_reg,
            training: false,
        }
    }

    /// The network configuration.
    #[must_use]
    pub const fn config(&self) -> &TcnConfig {
        &self.config
    }

    /// Switch between training mode (stochastic dropout) and inference
    /// mode (dropout disabled).
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    /// Whether the network is in training mode.
    #[must_use]
    pub const fn is_training(&self) -> bool {
        self.training
    }

    /// Whether the classification head exists.
    #[must_use]
    pub const fn has_classification(&self) -> bool {
        self.head_cls.is_some()
    }

    /// Whether the regression head exists.
    #[must_use]
    pub const fn has_regression(&self) -> bool {
        self.head_reg.is_some()
    }

    /// Run the backbone on a single flattened sequence `[J*C, T]`.
    ///
    /// Exposed separately from [`forward`](Self::forward) because the
    /// causality guarantee is stated (and tested) on backbone features,
    /// before the heads pool over time.
    #[must_use]
    pub fn forward_features(&self, x: &Array2<f32>) -> Array2<f32> {
        let mut feats = x.clone();
        for block in &self.blocks {
            feats = block.forward(&feats, self.training);
        }
        feats
    }

    /// Run a forward pass over a batch of shape `[B, T, J, C]`.
    ///
    /// The input is reshaped channel-major to `[B, J*C, T]` before the
    /// backbone. Each head contributes its output slot only if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Config`] if the joint/channel axes do not
    /// match the configuration or the batch has no time steps.
    pub fn forward(&self, batch: &Array4<f32>) -> Result<TcnOutput> {
        let (b_len, t_len, j_len, c_len) = batch.dim();
        if j_len != self.config.num_joints || c_len != self.config.channels_per_joint {
            return Err(SequenceError::Config(format!(
                "expected input shaped [B, T, {}, {}], got [{b_len}, {t_len}, {j_len}, {c_len}]",
                self.config.num_joints, self.config.channels_per_joint
            )));
        }
        if t_len == 0 {
            return Err(SequenceError::Config(
                "cannot run the network on a zero-length sequence".to_string(),
            ));
        }

        let mut cls_rows: Vec<Array1<f32>> = Vec::with_capacity(b_len);
        let mut reg_rows: Vec<Array1<f32>> = Vec::with_capacity(b_len);

        for b in 0..b_len {
            let sample = batch.index_axis(Axis(0), b);
            let flat = sample
                .to_shape((t_len, j_len * c_len))
                .map_err(|e| SequenceError::Config(format!("failed to flatten input: {e}")))?;
            let x = flat.t().to_owned();

            let feats = self.forward_features(&x);
            if let Some(head) = &self.head_cls {
                cls_rows.push(head.forward(&feats));
            }
            if let Some(head) = &self.head_reg {
                reg_rows.push(head.forward(&feats));
            }
        }

        Ok(TcnOutput {
            logits: stack_rows(&cls_rows)?,
            preds: stack_rows(&reg_rows)?,
        })
    }

    /// Total number of parameters.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        let mut params: usize = self.blocks.iter().map(TemporalBlock::num_parameters).sum();
        for head in [&self.head_cls, &self.head_reg].into_iter().flatten() {
            params += head.proj.num_parameters() + head.weight.len() + head.bias.len();
        }
        params
    }
}

fn stack_rows(rows: &[Array1<f32>]) -> Result<Option<Array2<f32>>> {
    if rows.is_empty() {
        return Ok(None);
    }
    let views: Vec<_> = rows.iter().map(|row| row.view()).collect();
    let stacked = ndarray::stack(Axis(0), &views)
        .map_err(|e| SequenceError::Config(format!("failed to stack head outputs: {e}")))?;
    Ok(Some(stacked))
}

/// Numerically stable sigmoid cross-entropy with mean reduction, for the
/// multi-label classification head.
///
/// # Panics
///
/// Panics if the shapes differ.
#[must_use]
pub fn bce_with_logits_loss(logits: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    assert_eq!(logits.dim(), targets.dim(), "loss shape mismatch");
    if logits.is_empty() {
        return 0.0;
    }
    let total = ndarray::Zip::from(logits)
        .and(targets)
        .fold(0.0f32, |acc, &z, &y| {
            acc + z.max(0.0) - z * y + (-z.abs()).exp().ln_1p()
        });
    total / logits.len() as f32
}

/// Smooth L1 (Huber-style, beta = 1) loss with mean reduction, for the
/// regression head.
///
/// # Panics
///
/// Panics if the shapes differ.
#[must_use]
pub fn smooth_l1_loss(preds: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    assert_eq!(preds.dim(), targets.dim(), "loss shape mismatch");
    if preds.is_empty() {
        return 0.0;
    }
    let total = ndarray::Zip::from(preds)
        .and(targets)
        .fold(0.0f32, |acc, &p, &y| {
            let d = (p - y).abs();
            acc + if d < 1.0 { 0.5 * d * d } else { d - 0.5 }
        });
    total / preds.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn small_config() -> TcnConfig {
        TcnConfig {
            num_joints: 2,
            channels_per_joint: 3,
            hidden: 8,
            num_blocks: 2,
            kernel_size: 3,
            num_labels: 4,
            num_targets: 2,
            dropout: 0.0,
        }
    }

    /// Deterministic pseudo-input without pulling in a seeded RNG.
    fn ramp_input(channels: usize, t_len: usize) -> Array2<f32> {
        Array2::from_shape_fn((channels, t_len), |(c, t)| {
            ((c + 1) as f32 * 0.37 + t as f32 * 0.11).sin()
        })
    }

    #[test]
    fn test_padding_formula() {
        let conv = CausalConv1d::new(4, 4, 3, 1);
        assert_eq!(conv.padding(), 2);
        assert_eq!(conv.receptive_field(), 3);

        let conv = CausalConv1d::new(4, 4, 3, 4);
        assert_eq!(conv.padding(), 8);
        assert_eq!(conv.receptive_field(), 9);
    }

    #[test]
    fn test_conv_preserves_length() {
        for (kernel, dilation) in [(1, 1), (3, 1), (3, 2), (5, 4)] {
            let conv = CausalConv1d::new(2, 6, kernel, dilation);
            let out = conv.forward(&ramp_input(2, 17));
            assert_eq!(out.dim(), (6, 17));
        }
    }

    #[test]
    fn test_conv_is_causal_for_impulse() {
        let conv = CausalConv1d::new(1, 1, 3, 2);
        let mut input = Array2::zeros((1, 12));
        input[[0, 5]] = 1.0;
        let output = conv.forward(&input);

        // Before the impulse only the (zero) bias contributes.
        for t in 0..5 {
            assert_abs_diff_eq!(output[[0, t]], 0.0, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_block_projection_on_channel_change() {
        assert!(TemporalBlock::new(4, 8, 3, 1, 0.0).has_projection());
        assert!(!TemporalBlock::new(8, 8, 3, 1, 0.0).has_projection());
    }

    #[test]
    fn test_block_output_shape() {
        let block = TemporalBlock::new(4, 8, 3, 2, 0.0);
        let out = block.forward(&ramp_input(4, 20), false);
        assert_eq!(out.dim(), (8, 20));
    }

    #[test]
    fn test_backbone_causality() {
        // Zeroing every input position after t must not change the backbone
        // output at or before t.
        let model = TemporalConvNet::new(small_config());
        let channels = model.config().input_channels();
        let full = ramp_input(channels, 16);

        let feats_full = model.forward_features(&full);
        for t_cut in [0usize, 4, 9, 14] {
            let mut truncated = full.clone();
            for t in (t_cut + 1)..16 {
                for c in 0..channels {
                    truncated[[c, t]] = 0.0;
                }
            }
            let feats_cut = model.forward_features(&truncated);
            for t in 0..=t_cut {
                for h in 0..model.config().hidden {
                    assert_abs_diff_eq!(
                        feats_full[[h, t]],
                        feats_cut[[h, t]],
                        epsilon = 1e-5
                    );
                }
            }
        }
    }

    #[test]
    fn test_forward_shapes() {
        let model = TemporalConvNet::new(small_config());
        let batch = Array4::from_elem((3, 10, 2, 3), 0.25f32);
        let output = model.forward(&batch).unwrap();
        assert_eq!(output.logits.unwrap().dim(), (3, 4));
        assert_eq!(output.preds.unwrap().dim(), (3, 2));
    }

    #[test]
    fn test_absent_heads_yield_empty_slots() {
        let model = TemporalConvNet::new(small_config().with_num_labels(0));
        assert!(!model.has_classification());
        assert!(model.has_regression());

        let batch = Array4::zeros((1, 6, 2, 3));
        let output = model.forward(&batch).unwrap();
        assert!(output.logits.is_none());
        assert!(output.preds.is_some());

        let model = TemporalConvNet::new(small_config().with_num_targets(0));
        let output = model.forward(&batch).unwrap();
        assert!(output.preds.is_none());
    }

    #[test]
    fn test_shape_validation() {
        let model = TemporalConvNet::new(small_config());
        let wrong_joints = Array4::zeros((1, 6, 3, 3));
        assert!(matches!(
            model.forward(&wrong_joints),
            Err(SequenceError::Config(_))
        ));

        let no_time = Array4::zeros((1, 0, 2, 3));
        assert!(matches!(
            model.forward(&no_time),
            Err(SequenceError::Config(_))
        ));
    }

    #[test]
    fn test_inference_mode_is_deterministic() {
        let mut model = TemporalConvNet::new(small_config().with_dropout(0.5));
        model.set_training(false);
        let batch = Array4::from_elem((1, 8, 2, 3), 0.5f32);

        let a = model.forward(&batch).unwrap().preds.unwrap();
        let b = model.forward(&batch).unwrap().preds.unwrap();
        for (va, vb) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(va, vb, epsilon = 0.0);
        }
    }

    #[test]
    fn test_receptive_field() {
        // 1 + 2 * (3 - 1) * (1 + 2 + 4 + 8) = 61
        assert_eq!(TcnConfig::default().receptive_field(), 61);
    }

    #[test]
    fn test_bce_with_logits_at_zero() {
        let logits = Array2::zeros((2, 3));
        let targets = Array2::from_elem((2, 3), 1.0f32);
        let loss = bce_with_logits_loss(&logits, &targets);
        assert_abs_diff_eq!(loss, std::f32::consts::LN_2, epsilon = 1e-6);
    }

    #[test]
    fn test_smooth_l1_regimes() {
        let preds = ndarray::arr2(&[[0.5f32, 2.0]]);
        let targets = Array2::zeros((1, 2));
        // Quadratic branch: 0.5 * 0.25 = 0.125; linear branch: 2 - 0.5 = 1.5.
        let loss = smooth_l1_loss(&preds, &targets);
        assert_abs_diff_eq!(loss, (0.125 + 1.5) / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_parameter_count_positive() {
        let model = TemporalConvNet::new(small_config());
        assert!(model.num_parameters() > 0);
    }
}
