//! Frame preprocessing
//!
//! Converts a captured frame into the planar RGB `f32` tensor layout the
//! detector expects (`[1, 3, H, W]`, values in `[0, 1]`), and keeps the
//! transform so boxes can be mapped back to frame coordinates.

use vantage_core::{BoundingBox, Frame, FrameFormat};

/// Padding value used for letterbox borders (YOLO convention)
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Mapping between frame pixels and model input pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    frame_width: u32,
    frame_height: u32,
}

impl InputTransform {
    /// Uniform scale with centred padding, preserving aspect ratio.
    pub fn letterbox(frame: (u32, u32), input: (u32, u32)) -> Self {
        let (fw, fh) = (frame.0 as f32, frame.1 as f32);
        let (iw, ih) = (input.0 as f32, input.1 as f32);
        let scale = (iw / fw).min(ih / fh);
        let (new_w, new_h) = ((fw * scale).round(), (fh * scale).round());

        Self {
            scale_x: scale,
            scale_y: scale,
            pad_x: ((iw - new_w) / 2.0).floor(),
            pad_y: ((ih - new_h) / 2.0).floor(),
            frame_width: frame.0,
            frame_height: frame.1,
        }
    }

    /// Independent per-axis scale, no padding.
    pub fn stretch(frame: (u32, u32), input: (u32, u32)) -> Self {
        Self {
            scale_x: input.0 as f32 / frame.0 as f32,
            scale_y: input.1 as f32 / frame.1 as f32,
            pad_x: 0.0,
            pad_y: 0.0,
            frame_width: frame.0,
            frame_height: frame.1,
        }
    }

    /// Map a box from model input space back to frame pixels, clamped to the
    /// frame.
    pub fn to_frame(&self, bbox: &BoundingBox) -> BoundingBox {
        let (fw, fh) = (self.frame_width as f32, self.frame_height as f32);

        let x0 = ((bbox.x - self.pad_x) / self.scale_x).clamp(0.0, fw);
        let y0 = ((bbox.y - self.pad_y) / self.scale_y).clamp(0.0, fh);
        let x1 = ((bbox.x + bbox.width - self.pad_x) / self.scale_x).clamp(0.0, fw);
        let y1 = ((bbox.y + bbox.height - self.pad_y) / self.scale_y).clamp(0.0, fh);

        BoundingBox::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Source pixel for an input pixel, or `None` inside the padding.
    fn source_pixel(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        let sx = (x as f32 + 0.5 - self.pad_x) / self.scale_x;
        let sy = (y as f32 + 0.5 - self.pad_y) / self.scale_y;

        if sx < 0.0 || sy < 0.0 {
            return None;
        }
        let (sx, sy) = (sx as u32, sy as u32);
        if sx >= self.frame_width || sy >= self.frame_height {
            return None;
        }
        Some((sx, sy))
    }
}

/// Fill `output` (`3 * input_w * input_h` floats, CHW) from `frame`.
///
/// Nearest-neighbour sampling; BGR and RGBA are converted to RGB, grayscale
/// is replicated across channels.
pub fn preprocess_frame(
    frame: &Frame,
    transform: &InputTransform,
    input: (u32, u32),
    output: &mut [f32],
) {
    let (target_w, target_h) = input;
    let plane = (target_w * target_h) as usize;
    debug_assert_eq!(output.len(), plane * 3);

    let data = frame.data();
    let width = frame.width();
    let format = frame.format();
    let channels = format.bytes_per_pixel();

    for y in 0..target_h {
        for x in 0..target_w {
            let dst = (y * target_w + x) as usize;

            let rgb = match transform.source_pixel(x, y) {
                Some((sx, sy)) => {
                    let src = (sy * width + sx) as usize * channels;
                    read_rgb(data, src, format)
                }
                None => [PAD_VALUE; 3],
            };

            output[dst] = rgb[0];
            output[plane + dst] = rgb[1];
            output[2 * plane + dst] = rgb[2];
        }
    }
}

fn read_rgb(data: &[u8], idx: usize, format: FrameFormat) -> [f32; 3] {
    let px = |i: usize| data.get(idx + i).copied().unwrap_or(0) as f32 / 255.0;
    match format {
        // BGR to RGB
        FrameFormat::BGR8 => [px(2), px(1), px(0)],
        FrameFormat::RGB8 | FrameFormat::RGBA8 => [px(0), px(1), px(2)],
        FrameFormat::Gray8 => {
            let v = px(0);
            [v, v, v]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_wide_frame() {
        let t = InputTransform::letterbox((1920, 1080), (640, 640));
        assert!((t.scale_x - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(t.scale_x, t.scale_y);
        assert_eq!(t.pad_x, 0.0);
        assert_eq!(t.pad_y, 140.0);
    }

    #[test]
    fn test_to_frame_inverts_letterbox() {
        let t = InputTransform::letterbox((1280, 640), (640, 640));
        // scale 0.5, pad_y 160
        let model_box = BoundingBox::new(100.0, 200.0, 20.0, 30.0);
        let frame_box = t.to_frame(&model_box);
        assert_eq!(frame_box, BoundingBox::new(200.0, 80.0, 40.0, 60.0));
    }

    #[test]
    fn test_to_frame_clamps_to_frame() {
        let t = InputTransform::stretch((100, 100), (100, 100));
        let clamped = t.to_frame(&BoundingBox::new(-10.0, 90.0, 30.0, 30.0));
        assert_eq!(clamped, BoundingBox::new(0.0, 90.0, 20.0, 10.0));
    }

    #[test]
    fn test_preprocess_bgr_to_planar_rgb() {
        // 2x1 BGR frame: pure blue then pure red
        let frame = Frame::new(2, 1, FrameFormat::BGR8, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let t = InputTransform::stretch((2, 1), (2, 1));
        let mut out = vec![0.0; 6];
        preprocess_frame(&frame, &t, (2, 1), &mut out);

        // R plane, G plane, B plane
        assert_eq!(out, vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_preprocess_pads_letterbox_border() {
        let frame = Frame::new(4, 2, FrameFormat::Gray8, vec![255; 8]).unwrap();
        let t = InputTransform::letterbox((4, 2), (4, 4));
        let mut out = vec![0.0; 48];
        preprocess_frame(&frame, &t, (4, 4), &mut out);

        // first row is padding, middle rows are image
        assert!((out[0] - PAD_VALUE).abs() < 1e-6);
        assert_eq!(out[4], 1.0);
        assert!((out[12] - PAD_VALUE).abs() < 1e-6);
    }
}
