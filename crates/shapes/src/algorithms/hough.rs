//! Gradient Hough transform for circles.
//!
//! Edge pixels vote along their gradient direction into an accumulator whose
//! cells are `dp` pixels wide. Local maxima above the threshold become centre
//! candidates; each candidate then takes the radius most edge pixels agree on.
//!
//! Gradient directions are taken from the image smoothed the same way Canny
//! smooths it. On hard binary edges the raw 3x3 Sobel snaps directions towards
//! the axes, which scatters the votes of a circle over many cells.

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use serde::{Deserialize, Serialize};

use super::geometry::Circle;

/// Smoothing `canny` applies before its own gradients
const EDGE_SIGMA: f32 = 1.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoughParams {
    /// Inverse accumulator resolution
    pub dp: f64,
    /// Minimum distance between accepted centres
    pub min_dist: f64,
    /// Upper Canny threshold; the lower one is half of it
    pub canny_high: f32,
    /// Votes a centre and a radius both need to exceed
    pub acc_threshold: u32,
    pub min_radius: u32,
    /// Zero means the larger image side
    pub max_radius: u32,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            dp: 1.5,
            min_dist: 100.0,
            canny_high: 100.0,
            acc_threshold: 35,
            min_radius: 0,
            max_radius: 0,
        }
    }
}

struct Accumulator {
    cols: usize,
    rows: usize,
    votes: Vec<u32>,
}

impl Accumulator {
    fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            votes: vec![0; cols * rows],
        }
    }

    fn vote(&mut self, col: f64, row: f64) -> bool {
        if col < 0.0 || row < 0.0 {
            return false;
        }
        let (c, r) = (col as usize, row as usize);
        if c >= self.cols || r >= self.rows {
            return false;
        }
        self.votes[r * self.cols + c] += 1;
        true
    }

    fn at(&self, c: usize, r: usize) -> u32 {
        self.votes[r * self.cols + c]
    }

    /// Cells above `threshold` that beat their four neighbours, strongest first.
    fn peaks(&self, threshold: u32) -> Vec<(usize, usize, u32)> {
        let mut peaks = Vec::new();
        for r in 1..self.rows.saturating_sub(1) {
            for c in 1..self.cols.saturating_sub(1) {
                let v = self.at(c, r);
                if v > threshold
                    && v > self.at(c - 1, r)
                    && v >= self.at(c + 1, r)
                    && v > self.at(c, r - 1)
                    && v >= self.at(c, r + 1)
                {
                    peaks.push((c, r, v));
                }
            }
        }
        peaks.sort_by(|a, b| b.2.cmp(&a.2).then((a.1, a.0).cmp(&(b.1, b.0))));
        peaks
    }
}

pub fn find_circles(image: &GrayImage, params: &HoughParams) -> Vec<Circle> {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let edges = canny(image, params.canny_high / 2.0, params.canny_high);
    let smoothed = gaussian_blur_f32(image, EDGE_SIGMA);
    let gx = horizontal_sobel(&smoothed);
    let gy = vertical_sobel(&smoothed);

    let min_r = f64::from(params.min_radius.max(1));
    let max_r = match params.max_radius {
        0 => f64::from(w.max(h)),
        r => f64::from(r),
    };
    let dp = params.dp.max(1.0);

    let mut acc = Accumulator::new((f64::from(w) / dp) as usize + 2, (f64::from(h) / dp) as usize + 2);
    let mut edge_points = Vec::new();

    for (x, y, p) in edges.enumerate_pixels() {
        if p[0] == 0 {
            continue;
        }
        edge_points.push((f64::from(x), f64::from(y)));

        let dx = f64::from(gx.get_pixel(x, y)[0]);
        let dy = f64::from(gy.get_pixel(x, y)[0]);
        let norm = dx.hypot(dy);
        if norm == 0.0 {
            continue;
        }
        let (ux, uy) = (dx / norm, dy / norm);

        for sign in [1.0, -1.0] {
            let mut r = min_r;
            while r <= max_r {
                let cx = f64::from(x) + sign * r * ux;
                let cy = f64::from(y) + sign * r * uy;
                if !acc.vote(cx / dp, cy / dp) {
                    break;
                }
                r += dp;
            }
        }
    }

    let mut circles: Vec<Circle> = Vec::new();
    for (c, r, _) in acc.peaks(params.acc_threshold) {
        let cx = (c as f64 + 0.5) * dp;
        let cy = (r as f64 + 0.5) * dp;
        if circles
            .iter()
            .any(|k| (k.x - cx).hypot(k.y - cy) < params.min_dist)
        {
            continue;
        }

        let mut distances: Vec<f64> = edge_points
            .iter()
            .map(|&(ex, ey)| (ex - cx).hypot(ey - cy))
            .filter(|d| (min_r..=max_r).contains(d))
            .collect();
        distances.sort_by(f64::total_cmp);

        if let Some((radius, count)) = densest_band(&distances, dp) {
            if count > params.acc_threshold {
                circles.push(Circle {
                    x: cx,
                    y: cy,
                    r: radius,
                });
            }
        }
    }
    circles
}

/// Median and size of the most populated window of sorted distances no wider
/// than `width`. Earlier windows win ties.
fn densest_band(sorted: &[f64], width: f64) -> Option<(f64, u32)> {
    let mut best: Option<(f64, u32)> = None;
    let mut start = 0;
    for end in 0..sorted.len() {
        while sorted[end] - sorted[start] > width {
            start += 1;
        }
        let count = (end - start + 1) as u32;
        if best.is_none_or(|(_, most)| count > most) {
            best = Some((sorted[(start + end) / 2], count));
        }
    }
    best
}
