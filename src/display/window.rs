//! Address window: the target rectangle for the next pixel stream

use std::fmt;

/// Inclusive pixel rectangle `(x0, y0)..=(x1, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl AddressWindow {
    pub const fn new(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Whole frame of the given size
    pub const fn full(width: u16, height: u16) -> Self {
        Self::new(0, 0, width.saturating_sub(1), height.saturating_sub(1))
    }

    pub fn width(&self) -> usize {
        usize::from(self.x1 - self.x0) + 1
    }

    pub fn height(&self) -> usize {
        usize::from(self.y1 - self.y0) + 1
    }

    /// Number of pixels covered
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// `0 <= x0 <= x1 < width` and `0 <= y0 <= y1 < height`
    pub fn fits(&self, width: u16, height: u16) -> bool {
        self.x0 <= self.x1 && self.x1 < width && self.y0 <= self.y1 && self.y1 < height
    }

    /// Column address (CASET) payload: start and end, big-endian
    pub fn column_bytes(&self) -> [u8; 4] {
        span_bytes(self.x0, self.x1)
    }

    /// Row address (RASET) payload: start and end, big-endian
    pub fn row_bytes(&self) -> [u8; 4] {
        span_bytes(self.y0, self.y1)
    }
}

fn span_bytes(start: u16, end: u16) -> [u8; 4] {
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}

impl fmt::Display for AddressWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})-({},{})", self.x0, self.y0, self.x1, self.y1)
    }
}
