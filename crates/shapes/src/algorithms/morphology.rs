//! Binary morphology and mask algebra on `0/255` grayscale masks.
//!
//! Structuring elements are `k×k` squares anchored at `(k/2, k/2)`. Pixels
//! outside the image never contribute to a result.

use std::collections::VecDeque;

use image::{GrayImage, Luma};

pub const ON: u8 = 255;
pub const OFF: u8 = 0;

#[derive(Debug, Clone, Copy)]
enum Extremum {
    Max,
    Min,
}

impl Extremum {
    fn pick(self, a: u8, b: u8) -> u8 {
        match self {
            Self::Max => a.max(b),
            Self::Min => a.min(b),
        }
    }
}

/// Offsets covered by a kernel of `size` along one axis.
fn window(size: u32) -> (i64, i64) {
    let anchor = i64::from(size / 2);
    (-anchor, i64::from(size.max(1)) - 1 - anchor)
}

fn pass(mask: &GrayImage, size: u32, op: Extremum, horizontal: bool) -> GrayImage {
    let (w, h) = mask.dimensions();
    let (lo, hi) = window(size);
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let (pos, len) = if horizontal {
                (i64::from(x), i64::from(w))
            } else {
                (i64::from(y), i64::from(h))
            };
            let from = (pos + lo).max(0);
            let to = (pos + hi).min(len - 1);
            let mut acc = mask.get_pixel(x, y)[0];
            for i in from..=to {
                let (sx, sy) = if horizontal { (i as u32, y) } else { (x, i as u32) };
                acc = op.pick(acc, mask.get_pixel(sx, sy)[0]);
            }
            out.put_pixel(x, y, Luma([acc]));
        }
    }
    out
}

fn morph(mask: &GrayImage, size: u32, iterations: usize, op: Extremum) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = pass(&pass(&out, size, op, true), size, op, false);
    }
    out
}

pub fn dilate(mask: &GrayImage, size: u32, iterations: usize) -> GrayImage {
    morph(mask, size, iterations, Extremum::Max)
}

pub fn erode(mask: &GrayImage, size: u32, iterations: usize) -> GrayImage {
    morph(mask, size, iterations, Extremum::Min)
}

/// Erode `iterations` times, then dilate as many times.
pub fn open(mask: &GrayImage, size: u32, iterations: usize) -> GrayImage {
    dilate(&erode(mask, size, iterations), size, iterations)
}

/// Dilate `iterations` times, then erode as many times.
pub fn close(mask: &GrayImage, size: u32, iterations: usize) -> GrayImage {
    erode(&dilate(mask, size, iterations), size, iterations)
}

fn zip(a: &GrayImage, b: &GrayImage, f: impl Fn(u8, u8) -> u8) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([f(a.get_pixel(x, y)[0], b.get_pixel(x, y)[0])])
    })
}

pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    zip(a, b, |p, q| p | q)
}

pub fn intersect(a: &GrayImage, b: &GrayImage) -> GrayImage {
    zip(a, b, |p, q| p & q)
}

/// Pixels of `a` that are not in `b`.
pub fn subtract(a: &GrayImage, b: &GrayImage) -> GrayImage {
    zip(a, b, |p, q| p & !q)
}

pub fn xor(a: &GrayImage, b: &GrayImage) -> GrayImage {
    zip(a, b, |p, q| p ^ q)
}

pub fn invert(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([!mask.get_pixel(x, y)[0]])
    })
}

/// Mask of the pixels equal to `value`.
pub fn select(mask: &GrayImage, value: u8) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([if mask.get_pixel(x, y)[0] == value { ON } else { OFF }])
    })
}

/// Paint the 4-connected region of pixels sharing the seed's value with `value`.
pub fn flood_fill(mask: &mut GrayImage, seed: (u32, u32), value: u8) {
    let (w, h) = mask.dimensions();
    if seed.0 >= w || seed.1 >= h {
        return;
    }
    let target = mask.get_pixel(seed.0, seed.1)[0];
    if target == value {
        return;
    }

    let mut queue = VecDeque::from([seed]);
    mask.put_pixel(seed.0, seed.1, Luma([value]));
    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx < w && ny < h && mask.get_pixel(nx, ny)[0] == target {
                mask.put_pixel(nx, ny, Luma([value]));
                queue.push_back((nx, ny));
            }
        }
    }
}

/// First non-zero pixel in raster order.
pub fn first_set_pixel(mask: &GrayImage) -> Option<(u32, u32)> {
    mask.enumerate_pixels()
        .find(|(_, _, p)| p[0] != OFF)
        .map(|(x, y, _)| (x, y))
}

pub fn count_set(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != OFF).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_pixels(w: u32, h: u32, on: &[(u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for &(x, y) in on {
            mask.put_pixel(x, y, Luma([ON]));
        }
        mask
    }

    #[test]
    fn test_even_kernel_anchor() {
        // a 2x2 kernel anchored at (1, 1) spreads a pixel right and down
        let dilated = dilate(&with_pixels(5, 5, &[(2, 2)]), 2, 1);
        let on: Vec<(u32, u32)> = dilated
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == ON)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(on, vec![(2, 2), (3, 2), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_erode_ignores_outside() {
        let full = GrayImage::from_pixel(4, 4, Luma([ON]));
        assert_eq!(count_set(&erode(&full, 3, 1)), 16);
    }

    #[test]
    fn test_open_removes_specks_close_fills_gaps() {
        let mut mask = GrayImage::new(20, 20);
        for y in 5..15 {
            for x in 5..15 {
                mask.put_pixel(x, y, Luma([ON]));
            }
        }
        mask.put_pixel(1, 1, Luma([ON]));
        let opened = open(&mask, 2, 1);
        assert_eq!(opened.get_pixel(1, 1)[0], OFF);
        assert_eq!(count_set(&opened), 100);

        mask.put_pixel(9, 9, Luma([OFF]));
        assert_eq!(close(&mask, 2, 1).get_pixel(9, 9)[0], ON);
    }

    #[test]
    fn test_flood_fill_is_four_connected() {
        let mut mask = with_pixels(4, 4, &[(1, 0), (0, 1)]);
        flood_fill(&mut mask, (0, 0), 100);
        assert_eq!(mask.get_pixel(0, 0)[0], 100);
        // walled off by the two set pixels
        assert_eq!(mask.get_pixel(1, 1)[0], OFF);
        assert_eq!(first_set_pixel(&select(&mask, ON)), Some((1, 0)));
    }

    #[test]
    fn test_algebra() {
        let a = with_pixels(3, 1, &[(0, 0), (1, 0)]);
        let b = with_pixels(3, 1, &[(1, 0), (2, 0)]);
        assert_eq!(count_set(&union(&a, &b)), 3);
        assert_eq!(count_set(&intersect(&a, &b)), 1);
        assert_eq!(first_set_pixel(&subtract(&a, &b)), Some((0, 0)));
        assert_eq!(count_set(&xor(&a, &b)), 2);
        assert_eq!(first_set_pixel(&invert(&a)), Some((2, 0)));
    }
}
