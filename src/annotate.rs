use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::Serialize;
use std::path::Path;

use crate::error::{MonitorError, Result};
use crate::track::TrackedObject;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_SCALE: f32 = 16.0;

/// What a renderer needs to label one tracked person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub id: u64,
    pub bbox: [i32; 4],
    /// Whole seconds of dwell, truncated.
    pub dwell_seconds: u64,
}

impl Annotation {
    pub fn from_object(obj: &TrackedObject) -> Self {
        let b = &obj.tlbr;
        Annotation {
            id: obj.id,
            bbox: [b[0] as i32, b[1] as i32, b[2] as i32, b[3] as i32],
            dwell_seconds: obj.dwell.as_secs(),
        }
    }

    pub fn label(&self) -> String {
        format!("ID:{} | t:{}", self.id, self.dwell_seconds)
    }
}

pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontArc> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        MonitorError::Configuration(format!("cannot read font {}: {}", path.display(), e))
    })?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| MonitorError::Configuration(format!("invalid font {}: {}", path.display(), e)))
}

/// Draw a box per annotation. Labels and the live count need a font.
pub fn render(frame: &mut RgbImage, annotations: &[Annotation], occupancy: usize, font: Option<&FontArc>) {
    for ann in annotations {
        let [x1, y1, x2, y2] = ann.bbox;
        let rect = Rect::at(x1, y1).of_size((x2 - x1).max(1) as u32, (y2 - y1).max(1) as u32);
        draw_hollow_rect_mut(frame, rect, BOX_COLOR);
        // second pass for a 2px outline
        let inner = Rect::at(x1 + 1, y1 + 1)
            .of_size((x2 - x1 - 2).max(1) as u32, (y2 - y1 - 2).max(1) as u32);
        draw_hollow_rect_mut(frame, inner, BOX_COLOR);

        if let Some(font) = font {
            let y = (y1 - TEXT_SCALE as i32).max(0);
            draw_text_mut(frame, BOX_COLOR, x1, y, PxScale::from(TEXT_SCALE), font, &ann.label());
        }
    }

    if let Some(font) = font {
        let text = format!("Live Person Count: {}", occupancy);
        draw_text_mut(frame, BOX_COLOR, 1, 14, PxScale::from(TEXT_SCALE), font, &text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;
    use std::time::{Duration, Instant};

    #[test]
    fn test_annotation_from_object_truncates_dwell() {
        let det = Detection::from_corners(10.4, 20.6, 50.9, 120.2, 0.9);
        let mut obj = TrackedObject::new(3, &det, Instant::now());
        obj.dwell = Duration::from_millis(4_999);

        let ann = Annotation::from_object(&obj);
        assert_eq!(ann.bbox, [10, 20, 50, 120]);
        assert_eq!(ann.dwell_seconds, 4);
        assert_eq!(ann.label(), "ID:3 | t:4");
    }

    #[test]
    fn test_render_draws_box_outline() {
        let mut frame = RgbImage::new(64, 64);
        let ann = Annotation { id: 0, bbox: [10, 10, 40, 50], dwell_seconds: 0 };
        render(&mut frame, &[ann], 1, None);

        assert_eq!(*frame.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*frame.get_pixel(25, 10), BOX_COLOR);
        assert_eq!(*frame.get_pixel(25, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_render_clips_boxes_outside_frame() {
        let mut frame = RgbImage::new(16, 16);
        let ann = Annotation { id: 0, bbox: [10, 10, 100, 100], dwell_seconds: 0 };
        render(&mut frame, &[ann], 1, None);
        assert_eq!(*frame.get_pixel(12, 10), BOX_COLOR);
    }

    #[test]
    fn test_missing_font_is_configuration_error() {
        let err = load_font("/nonexistent/font.ttf").unwrap_err();
        assert!(matches!(err, MonitorError::Configuration(_)));
    }
}
