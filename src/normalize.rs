// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame normalization of keypoint coordinates.
//!
//! Recenters every frame on the pelvis and rescales by shoulder width so
//! downstream models see coordinates that are invariant to where the person
//! stands in the image and how large they appear. Each frame is normalized
//! independently; no information crosses frame boundaries.

use ndarray::ArrayViewMut3;

use crate::joints::{LEFT_HIP, LEFT_SHOULDER, RIGHT_HIP, RIGHT_SHOULDER};

/// Fallback frame center when hip joints are outside the joint axis.
pub const CANONICAL_CENTER: [f32; 2] = [0.5, 0.5];

/// Shoulder distances at or below this are treated as absent.
const MIN_SHOULDER_DIST: f32 = 1e-6;

/// Floor applied to the scale divisor.
const SCALE_FLOOR: f32 = 1e-3;

/// Normalize an xy coordinate sequence in place.
///
/// For every frame `t` of the `[T, J, 2]` view, independently:
///
/// - pelvis = mean of left and right hip if both indices are present on the
///   joint axis, else the canonical center `(0.5, 0.5)`;
/// - scale = distance between the shoulders if both indices are present and
///   the distance exceeds `1e-6`, else `1.0`;
/// - `out[t] = (raw[t] - pelvis) / max(scale, 1e-3)`.
///
/// The scale floor guarantees no near-zero division, so finite input always
/// yields finite output. Visibility is not part of this view and is left
/// untouched by the caller.
pub fn normalize_sequence_xy(mut seq_xy: ArrayViewMut3<'_, f32>) {
    let (t_len, j_len, c_len) = seq_xy.dim();
    debug_assert_eq!(c_len, 2, "expected an xy view");

    let has_hips = LEFT_HIP < j_len && RIGHT_HIP < j_len;
    let has_shoulders = LEFT_SHOULDER < j_len && RIGHT_SHOULDER < j_len;

    for t in 0..t_len {
        let (cx, cy) = if has_hips {
            (
                0.5 * (seq_xy[[t, LEFT_HIP, 0]] + seq_xy[[t, RIGHT_HIP, 0]]),
                0.5 * (seq_xy[[t, LEFT_HIP, 1]] + seq_xy[[t, RIGHT_HIP, 1]]),
            )
        } else {
            (CANONICAL_CENTER[0], CANONICAL_CENTER[1])
        };

        let mut scale = 1.0f32;
        if has_shoulders {
            let dx = seq_xy[[t, LEFT_SHOULDER, 0]] - seq_xy[[t, RIGHT_SHOULDER, 0]];
            let dy = seq_xy[[t, LEFT_SHOULDER, 1]] - seq_xy[[t, RIGHT_SHOULDER, 1]];
            let dist = dx.hypot(dy);
            if dist > MIN_SHOULDER_DIST {
                scale = dist;
            }
        }
        let denom = scale.max(SCALE_FLOOR);

        for j in 0..j_len {
            seq_xy[[t, j, 0]] = (seq_xy[[t, j, 0]] - cx) / denom;
            seq_xy[[t, j, 1]] = (seq_xy[[t, j, 1]] - cy) / denom;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joints::NUM_JOINTS;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    /// A plausible standing pose with distinct hip and shoulder positions.
    fn standing_pose(frames: usize) -> Array3<f32> {
        let mut seq = Array3::zeros((frames, NUM_JOINTS, 2));
        for t in 0..frames {
            for j in 0..NUM_JOINTS {
                seq[[t, j, 0]] = 0.4 + 0.005 * j as f32;
                seq[[t, j, 1]] = 0.2 + 0.015 * j as f32;
            }
            seq[[t, LEFT_SHOULDER, 0]] = 0.35;
            seq[[t, LEFT_SHOULDER, 1]] = 0.30;
            seq[[t, RIGHT_SHOULDER, 0]] = 0.55;
            seq[[t, RIGHT_SHOULDER, 1]] = 0.31;
            seq[[t, LEFT_HIP, 0]] = 0.40;
            seq[[t, LEFT_HIP, 1]] = 0.55;
            seq[[t, RIGHT_HIP, 0]] = 0.50;
            seq[[t, RIGHT_HIP, 1]] = 0.56;
        }
        seq
    }

    #[test]
    fn test_pelvis_recentered_to_origin() {
        let mut seq = standing_pose(3);
        normalize_sequence_xy(seq.view_mut());

        for t in 0..3 {
            let px = 0.5 * (seq[[t, LEFT_HIP, 0]] + seq[[t, RIGHT_HIP, 0]]);
            let py = 0.5 * (seq[[t, LEFT_HIP, 1]] + seq[[t, RIGHT_HIP, 1]]);
            assert_abs_diff_eq!(px, 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(py, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_scale_invariance() {
        let base = standing_pose(2);

        let mut a = base.clone();
        normalize_sequence_xy(a.view_mut());

        let mut b = base.mapv(|v| v * 3.0);
        normalize_sequence_xy(b.view_mut());

        for (va, vb) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(va, vb, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_degenerate_scale_is_clamped() {
        // Coincident shoulders: the distance test fails, so the scale falls
        // back to 1.0 and every output stays finite.
        let mut seq = Array3::from_elem((1, NUM_JOINTS, 2), 0.5f32);
        normalize_sequence_xy(seq.view_mut());

        for &v in seq.iter() {
            assert!(v.is_finite());
        }
        // All joints sit on the pelvis, so everything lands on the origin.
        assert_abs_diff_eq!(seq[[0, 0, 0]], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_all_zero_frame_stays_zero() {
        let mut seq = Array3::zeros((1, NUM_JOINTS, 2));
        normalize_sequence_xy(seq.view_mut());
        assert!(seq.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_hip_axis_uses_canonical_center() {
        // A truncated joint axis without hips or shoulders triggers both
        // documented fallbacks instead of failing.
        let mut seq = Array3::from_elem((1, 4, 2), 0.5f32);
        normalize_sequence_xy(seq.view_mut());
        // (0.5 - 0.5) / 1.0
        assert!(seq.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_frames_normalized_independently() {
        let mut seq = standing_pose(2);
        // Shift frame 1 wholesale; its normalized form must match frame 0.
        for j in 0..NUM_JOINTS {
            seq[[1, j, 0]] += 0.17;
            seq[[1, j, 1]] -= 0.05;
        }
        normalize_sequence_xy(seq.view_mut());

        for j in 0..NUM_JOINTS {
            assert_abs_diff_eq!(seq[[0, j, 0]], seq[[1, j, 0]], epsilon = 1e-5);
            assert_abs_diff_eq!(seq[[0, j, 1]], seq[[1, j, 1]], epsilon = 1e-5);
        }
    }
}
