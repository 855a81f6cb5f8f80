// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Integration tests for the sequence modeling pipeline: serialized sample
//! files through dataset assembly, windowing, collation, and a network
//! forward pass.

use std::path::Path;

use motionseq::{
    bce_with_logits_loss, collate, crop_window, smooth_l1_loss, FrameRecord, Keypoint,
    PoseSequenceDataset, SampleRecord, SequenceError, TcnConfig, TemporalConvNet, JOINT_NAMES,
    NUM_CHANNELS, NUM_JOINTS,
};

/// Build a plausible sample: every canonical joint reported on every frame,
/// with labels and targets attached.
fn make_sample(t_len: usize, seed: f32) -> SampleRecord {
    let frames = (0..t_len)
        .map(|i| FrameRecord {
            index: i as u64,
            time_sec: i as f64 / 30.0,
            keypoints: JOINT_NAMES
                .iter()
                .enumerate()
                .map(|(j, &name)| Keypoint {
                    name: name.to_string(),
                    x: 0.3 + 0.01 * j as f32 + 0.001 * seed,
                    y: 0.2 + 0.02 * j as f32,
                    v: 0.9,
                })
                .collect(),
        })
        .collect();

    SampleRecord {
        width: 1920,
        height: 1080,
        fps: 30.0,
        frames,
        labels: Some(
            [("release".to_string(), 1.0), ("balanced".to_string(), 0.0)]
                .into_iter()
                .collect(),
        ),
        targets: Some([("speed".to_string(), 7.5)].into_iter().collect()),
        ..SampleRecord::default()
    }
}

fn write_split(root: &Path, split: &str, lengths: &[usize]) {
    for (i, &t_len) in lengths.iter().enumerate() {
        make_sample(t_len, i as f32)
            .save(root.join(split).join(format!("sample_{i:03}.json")))
            .unwrap();
    }
}

#[test]
fn test_dataset_to_forward_pass() {
    let dir = tempfile::tempdir().unwrap();
    write_split(dir.path(), "train", &[12, 9, 10]);

    let dataset = PoseSequenceDataset::open(dir.path(), "train").unwrap();
    assert_eq!(dataset.len(), 3);
    dataset.validate_annotations().unwrap();

    let samples: Vec<_> = (0..dataset.len())
        .map(|i| dataset.get(i).unwrap())
        .collect();
    assert_eq!(samples[0].x.dim(), (12, NUM_JOINTS, NUM_CHANNELS));

    // Batch truncates to the shortest sequence.
    let batch = collate(&samples).unwrap();
    assert_eq!(batch.x.dim(), (3, 9, NUM_JOINTS, NUM_CHANNELS));

    // Label axis is alphabetical on annotation names.
    let labels = batch.labels.as_ref().unwrap();
    assert_eq!(labels.names, ["balanced", "release"]);
    let targets = batch.targets.as_ref().unwrap();
    assert_eq!(targets.names, ["speed"]);

    let config = TcnConfig::new()
        .with_hidden(16)
        .with_num_blocks(2)
        .with_num_labels(labels.names.len())
        .with_num_targets(targets.names.len());
    let model = TemporalConvNet::new(config);

    let output = model.forward(&batch.x).unwrap();
    let logits = output.logits.unwrap();
    let preds = output.preds.unwrap();
    assert_eq!(logits.dim(), (3, 2));
    assert_eq!(preds.dim(), (3, 1));

    // Both losses evaluate to finite values against the batch annotations.
    assert!(bce_with_logits_loss(&logits, &labels.values).is_finite());
    assert!(smooth_l1_loss(&preds, &targets.values).is_finite());
}

#[test]
fn test_missing_split_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_split(dir.path(), "train", &[8]);

    assert!(PoseSequenceDataset::open(dir.path(), "train").is_ok());
    assert!(matches!(
        PoseSequenceDataset::open(dir.path(), "val"),
        Err(SequenceError::NotFound(_))
    ));
}

#[test]
fn test_windowed_sample_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    // 31 frames at 30 fps covers [0, 1] seconds.
    let sample = make_sample(31, 0.0);
    let cropped = crop_window(&sample, 0.5, 200, 100);

    // [0.3, 0.6] inclusive at 30 fps: frames 9..=18.
    assert_eq!(cropped.frames.len(), 10);
    assert_eq!(cropped.frames[0].index, 9);
    assert_eq!(cropped.frames[9].index, 18);

    let path = dir.path().join("train").join("windowed.json");
    cropped.save(&path).unwrap();
    let reloaded = SampleRecord::load(&path).unwrap();

    let window = reloaded.window.unwrap();
    assert_eq!(window.anchor_sec, 0.5);
    assert_eq!(window.pre_ms, 200);
    assert_eq!(window.post_ms, 100);
    assert_eq!(reloaded.frames.len(), 10);
    // Timestamps stay absolute through crop and reload.
    assert!((reloaded.frames[0].time_sec - 0.3).abs() < 1e-9);
}

#[test]
fn test_assembled_sequence_is_normalized() {
    let sample = make_sample(5, 0.0);
    let seq = motionseq::assemble_sequence(&sample);

    // Pelvis lands on the origin for every frame.
    let (left_hip, right_hip) = (23, 24);
    for t in 0..5 {
        let px = 0.5 * (seq[[t, left_hip, 0]] + seq[[t, right_hip, 0]]);
        let py = 0.5 * (seq[[t, left_hip, 1]] + seq[[t, right_hip, 1]]);
        assert!(px.abs() < 1e-5);
        assert!(py.abs() < 1e-5);
    }
    // Visibility is untouched by normalization.
    assert!((seq[[0, 0, 2]] - 0.9).abs() < 1e-6);
}
