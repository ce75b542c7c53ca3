//! Core detection and targeting types

use std::fmt;

use serde::Deserialize;

/// Bounding box for detected objects
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    /// X coordinate of top-left corner (pixels)
    pub x: f32,
    /// Y coordinate of top-left corner (pixels)
    pub y: f32,
    /// Width of bounding box (pixels)
    pub width: f32,
    /// Height of bounding box (pixels)
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Calculate intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Calculate area
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Integer box centre.
    ///
    /// Each component is truncated to whole pixels first, then
    /// `x + width / 2` is taken in integer arithmetic.
    pub fn center(&self) -> (i32, i32) {
        let (x, y) = (self.x as i32, self.y as i32);
        let (w, h) = (self.width as i32, self.height as i32);
        (x + w / 2, y + h / 2)
    }
}

/// Closed set of detector categories.
///
/// Raw model class indices are mapped onto this set once, at the detector
/// boundary; anything outside it never reaches target selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassId {
    /// Non-target category (index 0)
    Ally,
    /// Target category (index 1)
    Hostile,
}

impl ClassId {
    pub const ALL: [ClassId; 2] = [ClassId::Ally, ClassId::Hostile];

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(ClassId::Ally),
            1 => Some(ClassId::Hostile),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            ClassId::Ally => 0,
            ClassId::Hostile => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ClassId::Ally => "ally",
            ClassId::Hostile => "hostile",
        }
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Bounding box in frame pixel coordinates
    pub bbox: BoundingBox,
    /// Detected category
    pub class_id: ClassId,
    /// Confidence score 0.0-1.0
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: ClassId, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

/// All detections produced from one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionBatch {
    /// Sequence number of the frame the batch was derived from
    pub frame_seq: u64,
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(frame_seq: u64, detections: Vec<Detection>) -> Self {
        Self {
            frame_seq,
            detections,
        }
    }

    pub fn empty(frame_seq: u64) -> Self {
        Self::new(frame_seq, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    /// Number of detections of the given class.
    pub fn count_of(&self, class_id: ClassId) -> usize {
        self.detections
            .iter()
            .filter(|d| d.class_id == class_id)
            .count()
    }
}

impl<'a> IntoIterator for &'a DetectionBatch {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

/// Offset from the reference point to the selected target.
///
/// Renders on the wire as `"<delta_x>,<delta_y>,<flag>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetVector {
    pub delta_x: i32,
    pub delta_y: i32,
    /// Reserved, currently always false
    pub flag: bool,
}

impl TargetVector {
    pub fn new(delta_x: i32, delta_y: i32) -> Self {
        Self {
            delta_x,
            delta_y,
            flag: false,
        }
    }

    /// Datagram payload for the delivery sink.
    pub fn to_datagram(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for TargetVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.delta_x, self.delta_y, self.flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_iou() {
        let box1 = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let box2 = BoundingBox::new(50.0, 50.0, 100.0, 100.0);

        let iou = box1.iou(&box2);
        // Intersection: 50x50 = 2500
        // Union: 100x100 + 100x100 - 2500 = 17500
        assert!((iou - 0.143).abs() < 0.01);
    }

    #[test]
    fn test_disjoint_boxes_have_zero_iou() {
        let box1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let box2 = BoundingBox::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(box1.iou(&box2), 0.0);
    }

    #[test]
    fn test_center_truncates() {
        assert_eq!(BoundingBox::new(900.0, 500.0, 40.0, 60.0).center(), (920, 530));
        // 10.9 -> 10, 5.7 -> 5, 5 / 2 -> 2
        assert_eq!(BoundingBox::new(10.9, 3.2, 5.7, 9.9).center(), (12, 7));
    }

    #[test]
    fn test_class_id_closed_set() {
        assert_eq!(ClassId::from_index(0), Some(ClassId::Ally));
        assert_eq!(ClassId::from_index(1), Some(ClassId::Hostile));
        assert_eq!(ClassId::from_index(2), None);
        for class in ClassId::ALL {
            assert_eq!(ClassId::from_index(class.index()), Some(class));
        }
    }

    #[test]
    fn test_class_id_from_config() {
        let class: ClassId = serde_json::from_str("\"hostile\"").unwrap();
        assert_eq!(class, ClassId::Hostile);
        assert!(serde_json::from_str::<ClassId>("\"neutral\"").is_err());
    }

    #[test]
    fn test_target_vector_wire_form() {
        let vector = TargetVector::new(-40, -10);
        assert_eq!(vector.to_string(), "-40,-10,false");
        assert_eq!(vector.to_datagram(), b"-40,-10,false".to_vec());
    }

    #[test]
    fn test_batch_counts() {
        let batch = DetectionBatch::new(
            3,
            vec![
                Detection::new(BoundingBox::default(), ClassId::Ally, 0.9),
                Detection::new(BoundingBox::default(), ClassId::Hostile, 0.8),
                Detection::new(BoundingBox::default(), ClassId::Hostile, 0.4),
            ],
        );
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.count_of(ClassId::Hostile), 2);
        assert!(DetectionBatch::empty(4).is_empty());
    }
}
