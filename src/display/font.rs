//! 5x7 bitmap font for clock digits
//!
//! Covers `0-9`, `:`, `-` and space. Each glyph row is a 5-bit mask with
//! bit 4 as the leftmost column. Unknown characters advance the cursor
//! without drawing.

use super::framebuffer::{Framebuffer, Rgb565};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;

const DIGITS: [[u8; 7]; 10] = [
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E], // 0
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E], // 1
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F], // 2
    [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E], // 3
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02], // 4
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E], // 5
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E], // 6
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08], // 7
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E], // 8
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C], // 9
];

const COLON: [u8; 7] = [0x00, 0x08, 0x08, 0x00, 0x08, 0x08, 0x00];
const DASH: [u8; 7] = [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00];

fn glyph(c: char) -> Option<&'static [u8; 7]> {
    match c {
        '0'..='9' => Some(&DIGITS[(c as u8 - b'0') as usize]),
        ':' => Some(&COLON),
        '-' => Some(&DASH),
        _ => None,
    }
}

/// Horizontal advance in unscaled columns. Colons are narrow.
fn advance(c: char) -> u32 {
    if c == ':' {
        4
    } else {
        6
    }
}

/// Rendered width of `text` at `scale`, without the trailing gap
pub fn text_width(text: &str, scale: u32) -> u32 {
    let columns: u32 = text.chars().map(advance).sum();
    columns.saturating_sub(1) * scale
}

/// Draw `text` with its top-left corner at `(x, y)`, clipped to the frame
pub fn draw_text(fb: &mut Framebuffer, x: i32, y: i32, text: &str, color: Rgb565, scale: u32) {
    let step = scale as i32;
    let mut cursor = x;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0x10 >> col) != 0 {
                        fb.fill_rect(cursor + col as i32 * step, y + row as i32 * step, scale, scale, color);
                    }
                }
            }
        }
        cursor += advance(c) as i32 * step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(fb: &Framebuffer) -> usize {
        fb.as_slice().iter().filter(|&&p| p != Rgb565::BLACK).count()
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("12:34:56", 1), 6 * 6 + 2 * 4 - 1);
        assert_eq!(text_width("12:34:56", 7), 43 * 7);
        assert_eq!(text_width("", 3), 0);
    }

    #[test]
    fn test_draw_digit_one() {
        let mut fb = Framebuffer::new(10, 10);
        draw_text(&mut fb, 0, 0, "1", Rgb565::WHITE, 1);

        // Stem in column 2, base spans columns 1-3
        for row in 0..7 {
            assert_eq!(fb.get_pixel(2, row), Some(Rgb565::WHITE));
        }
        assert_eq!(fb.get_pixel(1, 6), Some(Rgb565::WHITE));
        assert_eq!(fb.get_pixel(3, 6), Some(Rgb565::WHITE));
        assert_eq!(fb.get_pixel(0, 0), Some(Rgb565::BLACK));
        assert_eq!(lit(&fb), 7 + 1 + 2);
    }

    #[test]
    fn test_scale_multiplies_pixels() {
        let mut small = Framebuffer::new(40, 40);
        let mut large = Framebuffer::new(40, 40);
        draw_text(&mut small, 0, 0, "8", Rgb565::CYAN, 1);
        draw_text(&mut large, 0, 0, "8", Rgb565::CYAN, 3);
        assert_eq!(lit(&large), lit(&small) * 9);
    }

    #[test]
    fn test_clipped_and_unknown_characters() {
        let mut fb = Framebuffer::new(8, 8);
        draw_text(&mut fb, -3, -3, "88", Rgb565::RED, 2);
        draw_text(&mut fb, 0, 0, "?x", Rgb565::GREEN, 1);
        assert!(lit(&fb) > 0);
        assert!(!fb.as_slice().contains(&Rgb565::GREEN));
    }
}
