//! Test patterns for the hardware self-test

use super::framebuffer::{Framebuffer, Rgb565};

/// Bar colors, left to right
pub const BAR_COLORS: [Rgb565; 8] = [
    Rgb565::WHITE,
    Rgb565::YELLOW,
    Rgb565::CYAN,
    Rgb565::GREEN,
    Rgb565::MAGENTA,
    Rgb565::RED,
    Rgb565::BLUE,
    Rgb565::BLACK,
];

/// Eight vertical bars of equal width; leftover columns extend the last bar
pub fn color_bars(fb: &mut Framebuffer) {
    let bar_width = (u32::from(fb.width()) / BAR_COLORS.len() as u32).max(1);
    for x in 0..fb.width() {
        let bar = (u32::from(x) / bar_width).min(BAR_COLORS.len() as u32 - 1) as usize;
        for y in 0..fb.height() {
            fb.set_pixel(x, y, BAR_COLORS[bar]);
        }
    }
}

/// Red ramps left to right, green top to bottom, blue along the diagonal
pub fn gradient(fb: &mut Framebuffer) {
    let (w, h) = (u32::from(fb.width()), u32::from(fb.height()));
    for y in 0..fb.height() {
        for x in 0..fb.width() {
            let (xu, yu) = (u32::from(x), u32::from(y));
            let r = xu * 31 / w;
            let g = yu * 63 / h;
            let b = (xu + yu) * 31 / (w + h);
            fb.set_pixel(x, y, Rgb565::from_channels(r as u8, g as u8, b as u8));
        }
    }
}

/// White and black squares of `size` pixels, white at the origin
pub fn checkerboard(fb: &mut Framebuffer, size: u16) {
    let size = size.max(1);
    for y in 0..fb.height() {
        for x in 0..fb.width() {
            let white = (x / size + y / size) % 2 == 0;
            fb.set_pixel(x, y, if white { Rgb565::WHITE } else { Rgb565::BLACK });
        }
    }
}
