use image::{GrayImage, RgbImage};
use imageproc::point::Point;

use crate::{
    algorithms::{extraction::TracedContour, masks::MaskSet},
    error::Result,
};

/// Trait for splitting a program image into shape, path and background masks
pub trait MaskExtractor: Send + Sync {
    fn extract(&self, image: &RgbImage) -> Result<MaskSet>;
}

/// Trait for hierarchical contour tracing on a binary mask
pub trait ContourTracer: Send + Sync {
    /// Contours in discovery order, each pointing at its parent
    fn trace(&self, mask: &GrayImage) -> Result<Vec<TracedContour>>;
}

/// Trait for deciding whether a traced contour is round
pub trait CircleDetector: Send + Sync {
    fn is_circular(&self, contour: &[Point<i32>]) -> Result<bool>;
}
