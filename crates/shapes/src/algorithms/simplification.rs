use geo::Simplify;
use geo_types::{Coord, LineString};
use imageproc::geometry::arc_length;
use imageproc::point::Point;

/// Approximation tolerance as a fraction of the closed perimeter.
pub const APPROXIMATION_FACTOR: f64 = 0.023;

/// Keep only the points of a closed pixel chain where its direction changes,
/// so straight horizontal, vertical and diagonal runs collapse to their ends.
pub fn compress_chain(chain: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = chain.len();
    if n < 3 {
        return chain.to_vec();
    }

    let step = |from: Point<i32>, to: Point<i32>| (to.x - from.x, to.y - from.y);
    let kept: Vec<Point<i32>> = (0..n)
        .filter(|&i| {
            let prev = chain[(i + n - 1) % n];
            let next = chain[(i + 1) % n];
            step(prev, chain[i]) != step(chain[i], next)
        })
        .map(|i| chain[i])
        .collect();

    if kept.is_empty() {
        chain.to_vec()
    } else {
        kept
    }
}

/// Douglas-Peucker approximation of a closed contour with a tolerance
/// proportional to its perimeter.
///
/// The contour is simplified as a closed ring, so the segment from the last
/// point back to the first is judged like every other edge.
pub fn approximate_polygon(contour: &[Point<i32>]) -> Vec<Point<i32>> {
    if contour.len() < 3 {
        return contour.to_vec();
    }

    let epsilon = APPROXIMATION_FACTOR * arc_length(contour, true);
    let ring: LineString<f64> = contour
        .iter()
        .chain(contour.first())
        .map(|p| Coord {
            x: f64::from(p.x),
            y: f64::from(p.y),
        })
        .collect();

    let mut polygon: Vec<Point<i32>> = ring
        .simplify(&epsilon)
        .coords()
        .map(|c| Point::new(c.x.round() as i32, c.y.round() as i32))
        .collect();
    if polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}
