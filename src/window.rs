// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Time-windowing of sequences around an anchor event.
//!
//! Training samples are usually much shorter than the videos they come
//! from: the interesting motion sits in a small window around an anchor
//! event (e.g., a release moment). The cropper keeps exactly the frames
//! inside `[anchor - pre, anchor + post]` and records the window on the
//! sample.

use crate::record::{SampleRecord, WindowMeta};

/// Crop a sample to the frames inside an anchor-relative time window.
///
/// Retains exactly the frames whose `time_sec` lies in
/// `[anchor_sec - pre_ms/1000, anchor_sec + post_ms/1000]`, inclusive on
/// both ends, preserving frame content and relative order, and attaches
/// the window metadata to the result.
///
/// Frame timestamps and indices stay absolute; the attached [`WindowMeta`]
/// carries the anchor for consumers that want window-relative time.
///
/// A sample with no frames is returned unchanged, with no window metadata
/// attached.
#[must_use]
pub fn crop_window(
    sample: &SampleRecord,
    anchor_sec: f64,
    pre_ms: u32,
    post_ms: u32,
) -> SampleRecord {
    if sample.frames.is_empty() {
        return sample.clone();
    }

    let start = anchor_sec - f64::from(pre_ms) / 1000.0;
    let end = anchor_sec + f64::from(post_ms) / 1000.0;

    let mut out = sample.clone();
    out.frames = sample
        .frames
        .iter()
        .filter(|frame| start <= frame.time_sec && frame.time_sec <= end)
        .cloned()
        .collect();
    out.window = Some(WindowMeta {
        anchor_sec,
        pre_ms,
        post_ms,
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FrameRecord;

    fn sample_with_times(times: &[f64]) -> SampleRecord {
        SampleRecord {
            frames: times
                .iter()
                .enumerate()
                .map(|(i, &t)| FrameRecord {
                    index: i as u64,
                    time_sec: t,
                    keypoints: Vec::new(),
                })
                .collect(),
            ..SampleRecord::default()
        }
    }

    #[test]
    fn test_inclusive_boundaries() {
        let sample = sample_with_times(&[1.49999, 1.5, 1.8, 2.2, 2.2001]);
        let cropped = crop_window(&sample, 2.0, 500, 200);

        let times: Vec<f64> = cropped.frames.iter().map(|f| f.time_sec).collect();
        assert_eq!(times, [1.5, 1.8, 2.2]);
    }

    #[test]
    fn test_window_metadata_attached() {
        let sample = sample_with_times(&[2.0]);
        let cropped = crop_window(&sample, 2.0, 500, 200);

        let window = cropped.window.expect("window metadata");
        assert_eq!(window.anchor_sec, 2.0);
        assert_eq!(window.pre_ms, 500);
        assert_eq!(window.post_ms, 200);
    }

    #[test]
    fn test_order_and_content_preserved() {
        let sample = sample_with_times(&[1.6, 1.7, 1.8]);
        let cropped = crop_window(&sample, 2.0, 500, 200);

        let indices: Vec<u64> = cropped.frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, [0, 1, 2]);
        // Timestamps stay absolute after cropping.
        assert_eq!(cropped.frames[0].time_sec, 1.6);
    }

    #[test]
    fn test_empty_sequence_unchanged() {
        let sample = sample_with_times(&[]);
        let cropped = crop_window(&sample, 2.0, 500, 200);

        assert!(cropped.frames.is_empty());
        assert!(cropped.window.is_none());
    }

    #[test]
    fn test_window_can_be_empty() {
        let sample = sample_with_times(&[0.1, 0.2]);
        let cropped = crop_window(&sample, 5.0, 100, 100);

        assert!(cropped.frames.is_empty());
        assert!(cropped.window.is_some());
    }
}
