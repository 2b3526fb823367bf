//! Clock face layout
//!
//! Time as `HH:MM:SS` in cyan near the top, date as `YYYY-MM-DD` in
//! yellow below it, both horizontally centered on a black background.

use super::font::{draw_text, text_width};
use super::framebuffer::{Framebuffer, Rgb565};
use chrono::NaiveDateTime;

pub const TIME_Y: i32 = 60;
pub const TIME_MAX_SCALE: u32 = 8;
pub const DATE_Y: i32 = 160;
pub const DATE_SCALE: u32 = 3;

pub const TIME_COLOR: Rgb565 = Rgb565::CYAN;
pub const DATE_COLOR: Rgb565 = Rgb565::YELLOW;
pub const BACKGROUND: Rgb565 = Rgb565::BLACK;

/// Largest scale up to `max_scale` at which `text` fits in `width` (at least 1)
pub fn fit_scale(text: &str, width: u16, max_scale: u32) -> u32 {
    (1..=max_scale)
        .rev()
        .find(|&scale| text_width(text, scale) <= u32::from(width))
        .unwrap_or(1)
}

fn centered_x(text: &str, width: u16, scale: u32) -> i32 {
    (i32::from(width) - text_width(text, scale) as i32) / 2
}

/// Render the face for `now` into `fb`
pub fn render(fb: &mut Framebuffer, now: &NaiveDateTime) {
    fb.clear(BACKGROUND);

    let time = now.format("%H:%M:%S").to_string();
    let scale = fit_scale(&time, fb.width(), TIME_MAX_SCALE);
    draw_text(fb, centered_x(&time, fb.width(), scale), TIME_Y, &time, TIME_COLOR, scale);

    let date = now.format("%Y-%m-%d").to_string();
    draw_text(fb, centered_x(&date, fb.width(), DATE_SCALE), DATE_Y, &date, DATE_COLOR, DATE_SCALE);
}
