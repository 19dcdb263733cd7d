use image::{codecs::jpeg::JpegEncoder, ColorType, Rgb, RgbImage};
use mitra_common::{BBox, Detection};

use crate::camera::Frame;
use crate::error::DetectionError;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;
const JPEG_QUALITY: u8 = 80;
const GLYPH_WIDTH: i32 = 5;
const GLYPH_ADVANCE: i32 = 6;

/// Draws each detection's box and `CLASS NN%` label onto a copy of the frame.
pub fn annotate_frame(frame: &Frame, detections: &[Detection]) -> Result<Frame, DetectionError> {
    if detections.is_empty() {
        return Ok(frame.clone());
    }

    let mut img = image::load_from_memory(&frame.data)?.to_rgb8();
    for det in detections {
        draw_box(&mut img, &det.bbox);
        draw_label(&mut img, det);
    }

    let mut jpeg = Vec::with_capacity(frame.data.len());
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode(
        img.as_raw(),
        img.width(),
        img.height(),
        ColorType::Rgb8,
    )?;

    Ok(frame.with_data(jpeg))
}

fn draw_box(img: &mut RgbImage, bbox: &BBox) {
    let bbox = bbox.clamped(img.width(), img.height());

    for t in 0..BOX_THICKNESS {
        let (left, top) = (bbox.x1 + t, bbox.y1 + t);
        let (right, bottom) = (bbox.x2 - t, bbox.y2 - t);
        if left > right || top > bottom {
            break;
        }
        for x in left..=right {
            img.put_pixel(x as u32, top as u32, BOX_COLOR);
            img.put_pixel(x as u32, bottom as u32, BOX_COLOR);
        }
        for y in top..=bottom {
            img.put_pixel(left as u32, y as u32, BOX_COLOR);
            img.put_pixel(right as u32, y as u32, BOX_COLOR);
        }
    }
}

pub fn label_text(det: &Detection) -> String {
    format!("{} {:.0}%", det.class_label, det.confidence * 100.0)
}

/// Places the label just above the box, or just inside its top edge when
/// there is no room above.
fn draw_label(img: &mut RgbImage, det: &Detection) {
    let bbox = det.bbox.clamped(img.width(), img.height());
    let top = if bbox.y1 - 10 > 10 { bbox.y1 - 10 } else { bbox.y1 + 3 };
    draw_text(img, bbox.x1, top, &label_text(det));
}

fn draw_text(img: &mut RgbImage, mut x: i32, top: i32, text: &str) {
    let (width, height) = (img.width() as i32, img.height() as i32);
    for ch in text.chars().flat_map(char::to_uppercase) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = top + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..GLYPH_WIDTH {
                    let px = x + col;
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 && px >= 0 && px < width {
                        img.put_pixel(px as u32, py as u32, BOX_COLOR);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

/// 5x7 bitmap glyphs, one row per byte, most significant of the low five
/// bits leftmost.
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '%' => [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(rows)
}
