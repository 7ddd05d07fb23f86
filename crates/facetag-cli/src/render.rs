//! Frame annotation: face boxes, names, confidences, and a face counter.
//!
//! Text uses a built-in 5x7 bitmap font covering A-Z, digits, and a little
//! punctuation. Lowercase letters render as capitals; anything else renders
//! as a hollow box.

use facetag_core::LabeledFace;
use image::{Rgb, RgbImage};

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const TEXT_SCALE: u32 = 2;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const BOX_THICKNESS: u32 = 2;
const TEXT_GAP: i64 = 3;

/// Draw every labeled face plus the `faces: N` status line.
pub fn annotate(image: &mut RgbImage, faces: &[LabeledFace]) {
    for face in faces {
        draw_face(image, face);
    }
    draw_text(image, 4, 4, &format!("faces: {}", faces.len()), TEXT_SCALE, BOX_COLOR);
}

/// Box with the name above it and the detector confidence below it.
///
/// Text that would leave the frame is tucked inside the box instead.
pub fn draw_face(image: &mut RgbImage, labeled: &LabeledFace) {
    let Some((x, y, w, h)) = labeled.face.clamp_to(image.width(), image.height()) else {
        return;
    };
    draw_rect(image, x, y, w, h, BOX_THICKNESS, BOX_COLOR);

    let text_h = (GLYPH_HEIGHT * TEXT_SCALE) as i64;
    let (x, y, h) = (x as i64, y as i64, h as i64);
    let (img_w, img_h) = (image.width() as i64, image.height() as i64);
    // Shift left rather than run off the right edge.
    let text_x = |text: &str| x.min(img_w - text_width(text, TEXT_SCALE) as i64).max(0);

    let name = labeled.name();
    let above = y - text_h - TEXT_GAP;
    let name_y = if above >= 0 { above } else { y + TEXT_GAP };
    let name_x = text_x(name);
    draw_text(image, name_x, name_y, name, TEXT_SCALE, BOX_COLOR);

    let confidence = format!("{:.0}%", labeled.face.confidence * 100.0);
    let below = y + h + TEXT_GAP;
    let conf_y = if below + text_h <= img_h {
        below
    } else {
        y + h - text_h - TEXT_GAP
    };
    let conf_x = text_x(&confidence);
    draw_text(image, conf_x, conf_y, &confidence, TEXT_SCALE, BOX_COLOR);
}

/// Hollow rectangle with the border drawn inward, clipped to the image.
pub fn draw_rect(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, thickness: u32, color: Rgb<u8>) {
    let x1 = x.saturating_add(w).min(image.width());
    let y1 = y.saturating_add(h).min(image.height());
    for py in y..y1 {
        for px in x..x1 {
            let edge = px < x + thickness
                || py < y + thickness
                || px + thickness >= x1
                || py + thickness >= y1;
            if edge {
                image.put_pixel(px, py, color);
            }
        }
    }
}

/// Pixel width of `text` at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    (n * (GLYPH_WIDTH + 1) - 1) * scale
}

/// Draw `text` with its top-left corner at (x, y); pixels off the image are dropped.
pub fn draw_text(image: &mut RgbImage, x: i64, y: i64, text: &str, scale: u32, color: Rgb<u8>) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let scale = scale.max(1) as i64;
    let advance = (GLYPH_WIDTH as i64 + 1) * scale;

    for (i, ch) in text.chars().enumerate() {
        let rows = glyph(ch);
        let gx = x + i as i64 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH as i64 {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = gx + col * scale + dx;
                        let py = y + row as i64 * scale + dy;
                        if (0..width).contains(&px) && (0..height).contains(&py) {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

/// Rows of a glyph, top to bottom; bit 4 is the leftmost column.
fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ' ' => [0x00; 7],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '\'' => [0x04, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}
