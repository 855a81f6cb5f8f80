// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Canonical joint table.
//!
//! The fixed, ordered set of 33 named body landmarks that defines the joint
//! axis of every array in the pipeline. The order is load-bearing: position
//! in this table is the index along the `J` axis everywhere downstream.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Number of canonical joints.
pub const NUM_JOINTS: usize = 33;

/// Number of channels per joint (x, y, visibility).
pub const NUM_CHANNELS: usize = 3;

/// Canonical joint names, in axis order.
pub const JOINT_NAMES: [&str; NUM_JOINTS] = [
    "nose",
    "left_eye_inner",
    "left_eye",
    "left_eye_outer",
    "right_eye_inner",
    "right_eye",
    "right_eye_outer",
    "left_ear",
    "right_ear",
    "mouth_left",
    "mouth_right",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_pinky",
    "right_pinky",
    "left_index",
    "right_index",
    "left_thumb",
    "right_thumb",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
    "left_heel",
    "right_heel",
    "left_foot_index",
    "right_foot_index",
];

/// Index of the nose joint.
pub const NOSE: usize = 0;
/// Index of the left shoulder joint.
pub const LEFT_SHOULDER: usize = 11;
/// Index of the right shoulder joint.
pub const RIGHT_SHOULDER: usize = 12;
/// Index of the left hip joint.
pub const LEFT_HIP: usize = 23;
/// Index of the right hip joint.
pub const RIGHT_HIP: usize = 24;

/// Look up the axis index of a joint by name.
///
/// Returns `None` for names outside the canonical table; callers ignore
/// such landmarks rather than erroring (see the assembler).
#[must_use]
pub fn joint_index(name: &str) -> Option<usize> {
    static INDEX: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    let index = INDEX.get_or_init(|| {
        JOINT_NAMES
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i))
            .collect()
    });
    index.get(name).copied()
}
