//! Best-effort frame-index label overlay.
//!
//! Burns an opaque `f<index>` tag near the top-left corner of a JPEG frame so
//! capture order stays visible in galleries. Callers treat every error as
//! "keep the original bytes" — the transform is cosmetic and must never block
//! ingestion.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, Rgb};

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
/// Offset of the label plate from the top-left corner, in pixels.
const MARGIN: u32 = 8;
const JPEG_QUALITY: u8 = 90;

/// Decode `bytes`, composite the `f<frame_index>` label, and re-encode.
///
/// The glyph scale is proportional to the image's shorter dimension so the
/// label stays legible on both thumbnails and full frames.
pub fn burn_index(bytes: &[u8], frame_index: u64) -> Result<Vec<u8>, ImageError> {
    let mut img = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = img.dimensions();

    let scale = (width.min(height) / 100).max(2);
    let pad = scale;
    let label = format!("f{frame_index}");

    let advance = (GLYPH_W + 1) * scale;
    let text_w = advance * label.len() as u32 - scale;
    let plate_w = text_w + 2 * pad;
    let plate_h = GLYPH_H * scale + 2 * pad;

    // opaque white plate, clipped to the image
    for y in 0..plate_h {
        for x in 0..plate_w {
            let (px, py) = (MARGIN + x, MARGIN + y);
            if px < width && py < height {
                img.put_pixel(px, py, Rgb([255, 255, 255]));
            }
        }
    }

    let mut cursor_x = MARGIN + pad;
    let base_y = MARGIN + pad;
    for c in label.chars() {
        let rows = glyph(c);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = cursor_x + col * scale + dx;
                        let py = base_y + row as u32 * scale + dy;
                        if px < width && py < height {
                            img.put_pixel(px, py, Rgb([0, 0, 0]));
                        }
                    }
                }
            }
        }
        cursor_x += advance;
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&img)?;
    Ok(out)
}

/// 5×7 bitmaps for the label alphabet (`f` plus digits), one row per byte,
/// most significant of the low five bits on the left.
fn glyph(c: char) -> [u8; 7] {
    match c {
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
        'f' => [0x06, 0x08, 0x08, 0x1C, 0x08, 0x08, 0x08],
        _ => [0; 7],
    }
}
