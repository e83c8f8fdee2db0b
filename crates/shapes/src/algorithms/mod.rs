pub mod connections;
pub mod detection;
pub mod extraction;
pub mod geometry;
pub mod hough;
pub mod masks;
pub mod morphology;
pub mod simplification;

pub use detection::HoughCircularity;
pub use extraction::{ImageprocContourTracer, TracedContour};
pub use geometry::Circle;
pub use hough::HoughParams;
pub use masks::{EdgeColorMaskExtractor, MaskSet, Palette};
