//! Stateless PNG rendering of bar and pie charts

use super::{RecommendationSplit, StarsHistogram, STAR_BUCKETS};
use crate::config::ChartConfig;
use crate::error::Result;
use crate::models::Recommendation;
use image::{ImageFormat, Rgb, RgbImage};
use std::f64::consts::PI;
use std::io::Cursor;

pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
pub const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
pub const GRID: Rgb<u8> = Rgb([220, 220, 220]);
pub const BAR: Rgb<u8> = Rgb([65, 105, 225]);
pub const RECOMMENDED: Rgb<u8> = Rgb([0, 128, 0]);
pub const NOT_RECOMMENDED: Rgb<u8> = Rgb([220, 20, 60]);
pub const UNSPECIFIED: Rgb<u8> = Rgb([211, 211, 211]);

const GRID_LINES: u32 = 5;

/// Pixel rectangle, half-open on the right and bottom edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn center(&self) -> (u32, u32) {
        ((self.x0 + self.x1) / 2, (self.y0 + self.y1) / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

/// Area inside the axes
fn plot_area(width: u32, height: u32) -> Rect {
    Rect {
        x0: width / 10,
        y0: height / 10,
        x1: width - width / 20,
        y1: height - height / 10,
    }
}

/// Rectangle of one histogram bar. The y axis tops out at 110% of the largest bucket.
pub fn bar_rect(index: usize, count: u32, max_count: u32, width: u32, height: u32) -> Rect {
    let area = plot_area(width, height);
    let slot = (area.x1 - area.x0) / STAR_BUCKETS as u32;
    let bar_width = slot * 3 / 5;
    let x0 = area.x0 + slot * index as u32 + (slot - bar_width) / 2;

    let plot_height = (area.y1 - area.y0) as f64;
    let bar_height = if max_count == 0 {
        0
    } else {
        (count as f64 / (max_count as f64 * 1.1) * plot_height).round() as u32
    };

    Rect {
        x0,
        y0: area.y1 - bar_height,
        x1: x0 + bar_width,
        y1: area.y1,
    }
}

fn fill_rect(img: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    for y in rect.y0..rect.y1.min(img.height()) {
        for x in rect.x0..rect.x1.min(img.width()) {
            img.put_pixel(x, y, color);
        }
    }
}

fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Bar chart of review counts per star bucket
pub fn render_stars_chart(histogram: &StarsHistogram, config: &ChartConfig) -> Result<Vec<u8>> {
    let (width, height) = (config.width, config.height);
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    let area = plot_area(width, height);

    for step in 1..=GRID_LINES {
        let y = area.y1 - (area.y1 - area.y0) * step / GRID_LINES;
        fill_rect(
            &mut img,
            Rect {
                x0: area.x0,
                y0: y,
                x1: area.x1,
                y1: y + 1,
            },
            GRID,
        );
    }

    let max = histogram.max();
    for (index, count) in histogram.counts.iter().enumerate() {
        let rect = bar_rect(index, *count, max, width, height);
        if !rect.is_empty() {
            fill_rect(&mut img, rect, BAR);
        }
    }

    // Axes drawn last so bars never cover them
    fill_rect(
        &mut img,
        Rect {
            x0: area.x0,
            y0: area.y1,
            x1: area.x1,
            y1: area.y1 + 2,
        },
        AXIS,
    );
    fill_rect(
        &mut img,
        Rect {
            x0: area.x0.saturating_sub(2),
            y0: area.y0,
            x1: area.x0,
            y1: area.y1 + 2,
        },
        AXIS,
    );

    encode_png(&img)
}

pub fn recommendation_color(recommendation: Recommendation) -> Rgb<u8> {
    match recommendation {
        Recommendation::Recommended => RECOMMENDED,
        Recommendation::NotRecommended => NOT_RECOMMENDED,
        Recommendation::Unspecified => UNSPECIFIED,
    }
}

/// Centre and radius of the pie
pub fn pie_geometry(width: u32, height: u32) -> (f64, f64, f64) {
    let radius = width.min(height) as f64 * 0.4;
    (width as f64 / 2.0, height as f64 / 2.0, radius)
}

/// Category covering the given angle, measured counter-clockwise from the
/// positive x axis in radians. `None` for an empty split.
pub fn slice_at(split: &RecommendationSplit, angle: f64) -> Option<Recommendation> {
    let total = split.total();
    if total == 0 {
        return None;
    }
    let fraction = angle.rem_euclid(2.0 * PI) / (2.0 * PI);
    let mut cumulative = 0.0;
    let mut last = None;
    for (rec, count) in split.categories() {
        if count == 0 {
            continue;
        }
        cumulative += count as f64 / total as f64;
        last = Some(rec);
        if fraction < cumulative {
            return Some(rec);
        }
    }
    last
}

/// Pie chart of the recommendation split; an empty split draws only the outline
pub fn render_recommendation_chart(
    split: &RecommendationSplit,
    config: &ChartConfig,
) -> Result<Vec<u8>> {
    let (width, height) = (config.width, config.height);
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    let (cx, cy, radius) = pie_geometry(width, height);

    for y in 0..height {
        for x in 0..width {
            let dx = x as f64 + 0.5 - cx;
            // Image rows grow downwards; flip so angles run counter-clockwise
            let dy = cy - (y as f64 + 0.5);
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > radius {
                continue;
            }
            if distance > radius - 1.5 {
                img.put_pixel(x, y, AXIS);
                continue;
            }
            if let Some(rec) = slice_at(split, dy.atan2(dx)) {
                img.put_pixel(x, y, recommendation_color(rec));
            }
        }
    }

    encode_png(&img)
}
