use geo::BoundingRect;
use geo_types::{MultiPoint, Point as GeoPoint};
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::{algorithms::morphology::{OFF, ON}, error::Result, traits::ContourTracer};

use super::simplification::compress_chain;

/// A contour with its place in the nesting hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedContour {
    pub points: Vec<Point<i32>>,
    /// Index of the enclosing contour in the same trace
    pub parent: Option<usize>,
    pub is_hole: bool,
}

/// Imageproc border following, compressed to the corners of straight runs
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourTracer;

impl ContourTracer for ImageprocContourTracer {
    fn trace(&self, mask: &GrayImage) -> Result<Vec<TracedContour>> {
        Ok(trace_contours(mask))
    }
}

pub fn trace_contours(mask: &GrayImage) -> Vec<TracedContour> {
    find_contours::<i32>(mask)
        .into_iter()
        .map(|contour| TracedContour {
            points: compress_chain(&contour.points),
            parent: contour.parent,
            is_hole: contour.border_type == BorderType::Hole,
        })
        .collect()
}

/// Axis-aligned `(x, y, width, height)` of a point set, counting pixels, so a
/// single point is one wide. Empty input gives all zeros.
pub fn bounding_rect(points: &[Point<i32>]) -> (i32, i32, i32, i32) {
    let cloud: MultiPoint<i32> = points.iter().map(|p| GeoPoint::new(p.x, p.y)).collect();
    match cloud.bounding_rect() {
        Some(rect) => (rect.min().x, rect.min().y, rect.width() + 1, rect.height() + 1),
        None => (0, 0, 0, 0),
    }
}

/// Paint the interior and boundary of a closed contour onto `canvas`.
pub fn paint_contour(canvas: &mut GrayImage, points: &[Point<i32>], value: u8) {
    let mut polygon = points.to_vec();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() >= 3 {
        draw_polygon_mut(canvas, &polygon, Luma([value]));
    }

    for (i, p) in polygon.iter().enumerate() {
        let next = polygon[(i + 1) % polygon.len()];
        draw_line_segment_mut(
            canvas,
            (p.x as f32, p.y as f32),
            (next.x as f32, next.y as f32),
            Luma([value]),
        );
    }
}

/// A `width × height` mask with the contour filled in.
pub fn fill_contour(points: &[Point<i32>], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    paint_contour(&mut mask, points, ON);
    mask
}

/// Clear every region whose contour touches the image border.
pub fn strip_border_contours(mask: &GrayImage) -> GrayImage {
    let (w, h) = (mask.width() as i32, mask.height() as i32);
    let mut out = mask.clone();
    for contour in trace_contours(mask) {
        let (x, y, cw, ch) = bounding_rect(&contour.points);
        if x == 0 || y == 0 || x + cw == w || y + ch == h {
            paint_contour(&mut out, &contour.points, OFF);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::morphology::count_set;

    fn rect(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([value]));
            }
        }
    }

    #[test]
    fn test_trace_nesting() {
        let mut mask = GrayImage::new(60, 60);
        rect(&mut mask, 10, 10, 50, 50, ON);
        rect(&mut mask, 20, 20, 40, 40, OFF);
        rect(&mut mask, 25, 25, 35, 35, ON);

        let contours = trace_contours(&mask);
        assert_eq!(contours.len(), 3);
        assert_eq!(contours[0].parent, None);
        assert!(!contours[0].is_hole);
        assert_eq!(contours[0].points.len(), 4);
        assert_eq!(contours[1].parent, Some(0));
        assert!(contours[1].is_hole);
        assert_eq!(contours[2].parent, Some(1));
    }

    #[test]
    fn test_fill_contour_covers_region() {
        let points = vec![
            Point::new(5, 5),
            Point::new(14, 5),
            Point::new(14, 14),
            Point::new(5, 14),
        ];
        let filled = fill_contour(&points, 20, 20);
        assert_eq!(count_set(&filled), 100);
        assert_eq!(bounding_rect(&points), (5, 5, 10, 10));
    }

    #[test]
    fn test_bounding_rect_edges() {
        assert_eq!(bounding_rect(&[]), (0, 0, 0, 0));
        assert_eq!(bounding_rect(&[Point::new(7, -3)]), (7, -3, 1, 1));
        let spread = [Point::new(4, 9), Point::new(-2, 1), Point::new(6, 3)];
        assert_eq!(bounding_rect(&spread), (-2, 1, 9, 9));
    }

    #[test]
    fn test_strip_border_contours() {
        let mut mask = GrayImage::new(30, 30);
        rect(&mut mask, 0, 5, 4, 10, ON);
        rect(&mut mask, 26, 20, 30, 25, ON);
        rect(&mut mask, 10, 10, 20, 20, ON);

        let stripped = strip_border_contours(&mask);
        assert_eq!(count_set(&stripped), 100);
        assert_eq!(stripped.get_pixel(15, 15)[0], ON);
    }
}
