//! Draw recognition results onto the displayed image.

use crate::types::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

pub const KNOWN_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const BOX_THICKNESS: i32 = 2;
const BAR_HEIGHT: u32 = 6;
const BAR_GAP: i32 = 4;

/// Outline a face. Known faces also get a confidence bar above the box
/// whose length is `1 - distance` of the box width.
pub fn draw_face(image: &mut RgbImage, bbox: &BoundingBox, distance: Option<f32>) {
    let color = if distance.is_some() { KNOWN_COLOR } else { UNKNOWN_COLOR };
    let x = bbox.x.round() as i32;
    let y = bbox.y.round() as i32;
    let w = bbox.width.round().max(1.0) as u32;
    let h = bbox.height.round().max(1.0) as u32;

    for inset in 0..BOX_THICKNESS {
        let (iw, ih) = (w.saturating_sub(2 * inset as u32), h.saturating_sub(2 * inset as u32));
        if iw == 0 || ih == 0 {
            break;
        }
        draw_hollow_rect_mut(image, Rect::at(x + inset, y + inset).of_size(iw, ih), color);
    }

    if let Some(distance) = distance {
        let filled = ((1.0 - distance.clamp(0.0, 1.0)) * w as f32).round().max(1.0) as u32;
        let bar_y = y - BAR_GAP - BAR_HEIGHT as i32;
        draw_filled_rect_mut(image, Rect::at(x, bar_y).of_size(filled, BAR_HEIGHT), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h, confidence: 0.9, landmarks: None }
    }

    #[test]
    fn test_unknown_face_outlined_red() {
        let mut img = RgbImage::new(100, 100);
        draw_face(&mut img, &bbox(20.0, 30.0, 40.0, 40.0), None);
        assert_eq!(*img.get_pixel(20, 30), UNKNOWN_COLOR);
        assert_eq!(*img.get_pixel(21, 50), UNKNOWN_COLOR);
        // Interior untouched.
        assert_eq!(img.get_pixel(40, 50).0, [0, 0, 0]);
    }

    #[test]
    fn test_known_face_gets_bar() {
        let mut img = RgbImage::new(100, 100);
        draw_face(&mut img, &bbox(20.0, 30.0, 40.0, 40.0), Some(0.5));
        assert_eq!(*img.get_pixel(20, 30), KNOWN_COLOR);
        // Bar spans half the box width, directly above it.
        let bar_y = 30 - BAR_GAP as u32 - 1;
        assert_eq!(*img.get_pixel(20, bar_y), KNOWN_COLOR);
        assert_eq!(*img.get_pixel(39, bar_y), KNOWN_COLOR);
        assert_eq!(img.get_pixel(45, bar_y).0, [0, 0, 0]);
    }

    #[test]
    fn test_box_outside_image_is_clipped() {
        let mut img = RgbImage::new(32, 32);
        draw_face(&mut img, &bbox(-10.0, -10.0, 100.0, 100.0), Some(0.1));
        draw_face(&mut img, &bbox(500.0, 500.0, 10.0, 10.0), None);
    }
}
