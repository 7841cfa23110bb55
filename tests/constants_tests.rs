// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use camera_controls::constants::{AspectRatioPolicy, get_resolution_label};

#[test]
fn test_aspect_ratio_policy_names() {
    assert_eq!(AspectRatioPolicy::default(), AspectRatioPolicy::InPlaceFirst);
    let restart: AspectRatioPolicy = serde_json::from_str("\"restart\"").unwrap();
    assert_eq!(restart, AspectRatioPolicy::Restart);
    assert_eq!(
        serde_json::to_string(&AspectRatioPolicy::InPlaceFirst).unwrap(),
        "\"in-place-first\""
    );
}

#[test]
fn test_resolution_label_ordering() {
    // Wider frames never get a lesser label
    let labels: Vec<_> = [640, 1280, 1920, 3840]
        .into_iter()
        .map(get_resolution_label)
        .collect();
    assert_eq!(labels, vec![Some("SD"), Some("720p"), Some("HD"), Some("4K")]);
    assert_eq!(get_resolution_label(320), None);
}
