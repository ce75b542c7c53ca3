//! Detector output decoding and non-maximum suppression

use vantage_core::BoundingBox;

use crate::types::RawDetection;

/// Decode a YOLOv8-style output tensor.
///
/// Accepts `[1, 4 + nc, N]` (channels first, the exporter default) or the
/// transposed `[1, N, 4 + nc]`. The layout is decided by which axis matches
/// `4 + num_classes`; channels first wins when both do. Each anchor holds
/// `cx, cy, w, h` followed by one score per class. Anchors whose best class
/// scores below `confidence_floor` are skipped.
pub fn decode_yolov8(
    data: &[f32],
    shape: &[usize],
    num_classes: usize,
    confidence_floor: f32,
) -> Result<Vec<RawDetection>, String> {
    let (dim_a, dim_b) = match shape {
        [1, a, b] => (*a, *b),
        [a, b] => (*a, *b),
        _ => return Err(format!("unexpected output shape: {:?}", shape)),
    };

    if num_classes == 0 {
        return Err("model must have at least one class".to_string());
    }

    let channels = 4 + num_classes;
    let (channels_first, anchors) = if dim_a == channels {
        (true, dim_b)
    } else if dim_b == channels {
        (false, dim_a)
    } else {
        return Err(format!(
            "output shape {:?} has no axis of {} channels (4 box values + {} classes)",
            shape, channels, num_classes
        ));
    };

    if data.len() < channels * anchors {
        return Err(format!(
            "output has {} values, shape {:?} needs {}",
            data.len(),
            shape,
            channels * anchors
        ));
    }

    let at = |channel: usize, anchor: usize| -> f32 {
        if channels_first {
            data[channel * anchors + anchor]
        } else {
            data[anchor * channels + channel]
        }
    };

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let (class_index, confidence) = (4..channels)
            .map(|c| (c - 4, at(c, anchor)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if confidence < confidence_floor {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        detections.push(RawDetection::new(
            class_index as u32,
            confidence,
            BoundingBox::new(cx - w / 2.0, cy - h / 2.0, w, h),
        ));
    }

    Ok(detections)
}

/// Greedy per-class non-maximum suppression.
///
/// Keeps detections in descending confidence order and drops any later
/// detection of the same class overlapping a kept one by more than
/// `iou_threshold`.
pub fn non_max_suppression(raw: &[RawDetection], iou_threshold: f32) -> Vec<RawDetection> {
    let mut sorted: Vec<RawDetection> = raw.to_vec();

    // Sort by confidence (descending)
    sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; sorted.len()];

    for i in 0..sorted.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(sorted[i]);

        // Suppress overlapping detections of same class
        for j in (i + 1)..sorted.len() {
            if suppressed[j] || sorted[i].class_index != sorted[j].class_index {
                continue;
            }
            if sorted[i].bbox.iou(&sorted[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}
