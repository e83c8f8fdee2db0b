use image::{GrayImage, Luma, RgbImage};
use tracing::{debug, info};

use crate::{
    algorithms::{
        extraction::strip_border_contours,
        morphology::{close, invert, open, subtract, union, OFF, ON},
    },
    error::{Result, ShapesError},
    traits::MaskExtractor,
};

pub type Color = [u8; 3];

/// Colours read off the image edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub background: Vec<Color>,
    pub shape: Vec<Color>,
    pub path: Vec<Color>,
}

#[derive(Debug, Clone)]
pub struct MaskSet {
    pub palette: Palette,
    /// Everything that is not background colour
    pub foreground: GrayImage,
    pub shape: GrayImage,
    pub path: GrayImage,
    /// Neither shape nor path
    pub background: GrayImage,
}

/// Reads the background colours from the bottom edge, shape colours from the
/// left edge and path colours from the right edge.
#[derive(Debug, Clone, Default)]
pub struct EdgeColorMaskExtractor;

impl MaskExtractor for EdgeColorMaskExtractor {
    fn extract(&self, image: &RgbImage) -> Result<MaskSet> {
        let palette = read_palette(image)?;
        info!(
            background = ?palette.background,
            shape = ?palette.shape,
            path = ?palette.path,
            "Colors found"
        );

        let foreground = open(&invert(&color_ranges_mask(&palette.background, image)), 2, 2);

        let shape = close(&strip_border_contours(&color_ranges_mask(&palette.shape, image)), 2, 1);
        let path = close(&strip_border_contours(&color_ranges_mask(&palette.path, image)), 2, 1);
        let path = subtract(&path, &shape);

        let shape = close(&open(&shape, 2, 1), 2, 2);
        let path = close(&open(&path, 2, 1), 2, 1);
        let background = invert(&union(&shape, &path));
        debug!("Masks extracted");

        Ok(MaskSet {
            palette,
            foreground,
            shape,
            path,
            background,
        })
    }
}

/// Distinct colours in order of appearance, with consecutive repeats collapsed.
pub fn ordered_colors(pixels: impl IntoIterator<Item = Color>) -> Vec<Color> {
    let mut colors: Vec<Color> = Vec::new();
    for pixel in pixels {
        if colors.last() != Some(&pixel) {
            colors.push(pixel);
        }
    }
    colors
}

/// Number of distinct colours in the whole image.
pub fn distinct_color_count(image: &RgbImage) -> usize {
    let mut colors: Vec<Color> = image.pixels().map(|p| p.0).collect();
    colors.sort_unstable();
    colors.dedup();
    colors.len()
}

/// All but the last pixel along one edge, or the whole edge when that leaves
/// nothing.
fn edge(len: u32, at: impl Fn(u32) -> Color) -> Vec<Color> {
    let end = if len > 1 { len - 1 } else { len };
    (0..end).map(at).collect()
}

pub fn read_palette(image: &RgbImage) -> Result<Palette> {
    let (w, h) = image.dimensions();
    let bottom = edge(w, |x| image.get_pixel(x, h - 1).0);
    let left = edge(h, |y| image.get_pixel(0, y).0);
    let right = edge(h, |y| image.get_pixel(w - 1, y).0);

    let mut background = ordered_colors(bottom);
    if background.len() == 1 {
        background.push(background[0]);
    }

    let shape: Vec<Color> = ordered_colors(left)
        .into_iter()
        .filter(|c| !background.contains(c))
        .collect();

    let mut path = Vec::new();
    for c in ordered_colors(right) {
        if background.contains(&c) {
            continue;
        }
        if shape.contains(&c) {
            return Err(ShapesError::ColorOverlap(c));
        }
        path.push(c);
    }

    if shape.is_empty() {
        return Err(ShapesError::MissingColors("shape"));
    }
    if path.is_empty() {
        return Err(ShapesError::MissingColors("path"));
    }

    Ok(Palette {
        background,
        shape,
        path,
    })
}

fn in_box(pixel: Color, lo: Color, hi: Color) -> bool {
    (0..3).all(|i| lo[i] <= pixel[i] && pixel[i] <= hi[i])
}

/// Pixels equal to one of `colors`, or inside the per-channel box spanned by
/// two adjacent colours in either order.
pub fn color_ranges_mask(colors: &[Color], image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y).0;
        let hit = colors.contains(&pixel)
            || colors
                .windows(2)
                .any(|pair| in_box(pixel, pair[0], pair[1]) || in_box(pixel, pair[1], pair[0]));
        Luma([if hit { ON } else { OFF }])
    })
}
