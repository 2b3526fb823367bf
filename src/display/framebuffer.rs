//! RGB565 framebuffer with bounds-checked drawing
//!
//! Dense, row-major pixel grid sized for the panel's current orientation.
//! The renderer owns it; the driver borrows it read-only while streaming.

/// RGB565 color (16-bit: 5 red, 6 green, 5 blue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb565(pub u16);

impl Rgb565 {
    pub const BLACK: Self = Self(0x0000);
    pub const WHITE: Self = Self(0xFFFF);
    pub const RED: Self = Self(0xF800);
    pub const GREEN: Self = Self(0x07E0);
    pub const BLUE: Self = Self(0x001F);
    pub const CYAN: Self = Self(0x07FF);
    pub const MAGENTA: Self = Self(0xF81F);
    pub const YELLOW: Self = Self(0xFFE0);

    /// Create RGB565 from RGB888 components
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let r5 = (r >> 3) as u16;
        let g6 = (g >> 2) as u16;
        let b5 = (b >> 3) as u16;
        Self((r5 << 11) | (g6 << 5) | b5)
    }

    /// Pack already-reduced 5/6/5-bit channels
    pub const fn from_channels(r5: u8, g6: u8, b5: u8) -> Self {
        Self((((r5 & 0x1F) as u16) << 11) | (((g6 & 0x3F) as u16) << 5) | (b5 & 0x1F) as u16)
    }
}

impl From<u16> for Rgb565 {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// Framebuffer for an RGB565 panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    width: u16,
    height: u16,
    buffer: Vec<Rgb565>,
}

impl Framebuffer {
    /// Create a new framebuffer initialized to black
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            buffer: vec![Rgb565::BLACK; usize::from(width) * usize::from(height)],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Always `width * height`
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height).then(|| usize::from(y) * usize::from(self.width) + usize::from(x))
    }

    /// Get pixel at coordinates
    pub fn get_pixel(&self, x: u16, y: u16) -> Option<Rgb565> {
        self.index(x, y).map(|idx| self.buffer[idx])
    }

    /// Set pixel at coordinates (bounds-checked)
    pub fn set_pixel(&mut self, x: u16, y: u16, color: Rgb565) -> bool {
        match self.index(x, y) {
            Some(idx) => {
                self.buffer[idx] = color;
                true
            }
            None => false,
        }
    }

    /// Clear framebuffer to a solid color
    pub fn clear(&mut self, color: Rgb565) {
        self.buffer.fill(color);
    }

    /// Row-major pixels, ready to stream
    pub fn as_slice(&self) -> &[Rgb565] {
        &self.buffer
    }

    /// Fill a rectangle, clipped to the frame. Origin may be negative.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgb565) {
        let x_start = x.max(0);
        let y_start = y.max(0);
        let x_end = (i64::from(x) + i64::from(w)).min(i64::from(self.width)) as i32;
        let y_end = (i64::from(y) + i64::from(h)).min(i64::from(self.height)) as i32;
        if x_start >= x_end || y_start >= y_end {
            return;
        }

        let width = usize::from(self.width);
        for row in y_start as usize..y_end as usize {
            let offset = row * width;
            self.buffer[offset + x_start as usize..offset + x_end as usize].fill(color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb() {
        assert_eq!(Rgb565::from_rgb(255, 0, 0), Rgb565::RED);
        assert_eq!(Rgb565::from_rgb(0, 255, 0), Rgb565::GREEN);
        assert_eq!(Rgb565::from_rgb(0, 0, 255), Rgb565::BLUE);
        assert_eq!(Rgb565::from_rgb(255, 255, 255), Rgb565::WHITE);
        assert_eq!(Rgb565::from_channels(31, 63, 31), Rgb565::WHITE);
    }

    #[test]
    fn test_len_matches_dimensions() {
        let fb = Framebuffer::new(320, 240);
        assert_eq!(fb.len(), 320 * 240);
        assert_eq!(fb.as_slice().len(), usize::from(fb.width()) * usize::from(fb.height()));
    }

    #[test]
    fn test_set_pixel_bounds() {
        let mut fb = Framebuffer::new(4, 3);
        assert!(fb.set_pixel(3, 2, Rgb565::RED));
        assert!(!fb.set_pixel(4, 0, Rgb565::RED));
        assert!(!fb.set_pixel(0, 3, Rgb565::RED));
        assert_eq!(fb.get_pixel(3, 2), Some(Rgb565::RED));
        assert_eq!(fb.as_slice()[2 * 4 + 3], Rgb565::RED);
        assert_eq!(fb.get_pixel(4, 0), None);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut fb = Framebuffer::new(4, 4);
        fb.fill_rect(-2, -2, 4, 4, Rgb565::BLUE);

        assert_eq!(fb.get_pixel(0, 0), Some(Rgb565::BLUE));
        assert_eq!(fb.get_pixel(1, 1), Some(Rgb565::BLUE));
        assert_eq!(fb.get_pixel(2, 0), Some(Rgb565::BLACK));
        assert_eq!(fb.get_pixel(0, 2), Some(Rgb565::BLACK));

        fb.fill_rect(3, 3, 10, 10, Rgb565::RED);
        assert_eq!(fb.get_pixel(3, 3), Some(Rgb565::RED));

        // Entirely outside: no-op
        fb.fill_rect(10, 10, 2, 2, Rgb565::GREEN);
        fb.fill_rect(-5, 0, 2, 2, Rgb565::GREEN);
        assert!(!fb.as_slice().contains(&Rgb565::GREEN));
    }
}
