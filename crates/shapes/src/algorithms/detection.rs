use geo::{ConvexHull, EuclideanLength};
use geo_types::{Coord, MultiPoint, Point as GeoPoint};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::geometry::{arc_length, min_area_rect};
use imageproc::point::Point;

use crate::{
    algorithms::{
        extraction::{bounding_rect, paint_contour, trace_contours},
        hough::{HoughParams, find_circles},
        morphology::ON,
    },
    error::{Result, ShapesError},
    traits::CircleDetector,
};

/// Judges a contour round when a Hough circle shows up in its filled crop or
/// in the rotation-normalised crop, and its outline is not too ragged.
#[derive(Debug, Clone)]
pub struct HoughCircularity {
    pub params: HoughParams,
    /// Largest accepted ratio of perimeter to convex hull perimeter
    pub max_roughness: f64,
}

impl Default for HoughCircularity {
    fn default() -> Self {
        Self {
            params: HoughParams::default(),
            max_roughness: 2.0,
        }
    }
}

impl CircleDetector for HoughCircularity {
    fn is_circular(&self, contour: &[Point<i32>]) -> Result<bool> {
        if roughness(contour)? >= self.max_roughness {
            return Ok(false);
        }

        let crop = crop_contour(contour);
        if !find_circles(&crop, &self.params).is_empty() {
            return Ok(true);
        }

        let normalised = normalise_rotation(contour, &crop)?;
        Ok(!find_circles(&normalised, &self.params).is_empty())
    }
}

const PADDING: i32 = 2;

/// Perimeter over convex hull perimeter.
pub fn roughness(contour: &[Point<i32>]) -> Result<f64> {
    let perimeter = arc_length(contour, true);
    let points: MultiPoint<f64> = contour
        .iter()
        .map(|p| GeoPoint::from(Coord { x: f64::from(p.x), y: f64::from(p.y) }))
        .collect();
    let hull_perimeter = points.convex_hull().exterior().euclidean_length();
    if hull_perimeter <= 0.0 {
        return Err(ShapesError::GeometricComputation(
            "degenerate convex hull".to_string(),
        ));
    }
    Ok(perimeter / hull_perimeter)
}

/// The filled contour cut out to its bounding box with a small margin.
fn crop_contour(contour: &[Point<i32>]) -> GrayImage {
    let (x, y, w, h) = bounding_rect(contour);
    let shifted: Vec<Point<i32>> = contour
        .iter()
        .map(|p| Point::new(p.x - x + PADDING, p.y - y + PADDING))
        .collect();
    let mut crop = GrayImage::new((w + 2 * PADDING) as u32, (h + 2 * PADDING) as u32);
    paint_contour(&mut crop, &shifted, ON);
    crop
}

/// Angle in degrees of the minimum-area rectangle, in `[0, 90)`.
fn min_rect_angle(contour: &[Point<i32>]) -> f64 {
    let [a, b, ..] = min_area_rect(contour);
    let degrees = f64::from(b.y - a.y).atan2(f64::from(b.x - a.x)).to_degrees();
    degrees.rem_euclid(90.0)
}

/// Rotate the crop so the minimum-area rectangle is axis aligned, cut the
/// result back to its outline and squash it into a square.
fn normalise_rotation(contour: &[Point<i32>], crop: &GrayImage) -> Result<GrayImage> {
    let (w, h) = crop.dimensions();
    let side = f64::from(w).hypot(f64::from(h)).ceil() as u32 + 2;

    let mut canvas = GrayImage::new(side, side);
    imageops::replace(
        &mut canvas,
        crop,
        i64::from((side - w) / 2),
        i64::from((side - h) / 2),
    );

    let theta = (min_rect_angle(contour) - 90.0).to_radians() as f32;
    let rotated = rotate_about_center(&canvas, theta, Interpolation::Nearest, Luma([0]));

    let outline = trace_contours(&rotated)
        .into_iter()
        .next()
        .ok_or_else(|| ShapesError::GeometricComputation("rotated shape vanished".to_string()))?;
    let recropped = crop_contour(&outline.points);

    let square = w.min(h).max(1);
    Ok(imageops::resize(&recropped, square, square, FilterType::Nearest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline_of(mask: &GrayImage) -> Vec<Point<i32>> {
        trace_contours(mask).remove(0).points
    }

    fn disc_mask(r: f64) -> GrayImage {
        GrayImage::from_fn(100, 100, |x, y| {
            let d = (f64::from(x) - 50.0).hypot(f64::from(y) - 50.0);
            Luma([if d <= r { ON } else { 0 }])
        })
    }

    #[test]
    fn test_disc_is_circular() {
        let contour = outline_of(&disc_mask(30.0));
        assert!(HoughCircularity::default().is_circular(&contour).unwrap());
    }

    #[test]
    fn test_square_is_not_circular() {
        let square = GrayImage::from_fn(100, 100, |x, y| {
            let inside = (20..70).contains(&x) && (20..70).contains(&y);
            Luma([if inside { ON } else { 0 }])
        });
        let contour = outline_of(&square);
        assert!(!HoughCircularity::default().is_circular(&contour).unwrap());
    }

    #[test]
    fn test_roughness() {
        let square = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert!((roughness(&square).unwrap() - 1.0).abs() < 1e-9);
        assert!(roughness(&[Point::new(3, 3)]).is_err());
    }
}
