use geo::{Area, ConvexHull, IsConvex};
use geo_types::{Coord, LineString, Polygon};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

pub fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = f64::from(a.x - b.x);
    let dy = f64::from(a.y - b.y);
    dx.hypot(dy)
}

/// Mean of the vertices, truncated towards zero. Empty input gives the origin.
pub fn vertex_centroid(points: &[Point<i32>]) -> Point<i32> {
    if points.is_empty() {
        return Point::new(0, 0);
    }
    let n = points.len() as i64;
    let (sx, sy) = points.iter().fold((0i64, 0i64), |(sx, sy), p| {
        (sx + i64::from(p.x), sy + i64::from(p.y))
    });
    Point::new((sx / n) as i32, (sy / n) as i32)
}

/// Whether a closed polygon is convex and simple.
///
/// Collinear vertices are allowed. The polygon must enclose its whole convex
/// hull, which rules out self-intersecting outlines. Fewer than three vertices
/// is never convex.
pub fn is_convex(points: &[Point<i32>]) -> bool {
    if points.len() < 3 {
        return false;
    }

    let ring: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: f64::from(p.x),
            y: f64::from(p.y),
        })
        .collect();
    let polygon = Polygon::new(ring, vec![]);
    let area = polygon.unsigned_area();

    area > 0.0
        && polygon.exterior().is_convex()
        && (polygon.convex_hull().unsigned_area() - area).abs() < 1e-6
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

impl Circle {
    fn contains(&self, p: (f64, f64)) -> bool {
        (p.0 - self.x).hypot(p.1 - self.y) <= self.r * (1.0 + 1e-9) + 1e-9
    }

    fn from_two(a: (f64, f64), b: (f64, f64)) -> Self {
        let x = (a.0 + b.0) / 2.0;
        let y = (a.1 + b.1) / 2.0;
        Self {
            x,
            y,
            r: (a.0 - x).hypot(a.1 - y),
        }
    }

    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < f64::EPSILON {
            // collinear: the widest pair spans the others
            return [Self::from_two(a, b), Self::from_two(a, c), Self::from_two(b, c)]
                .into_iter()
                .max_by(|p, q| p.r.total_cmp(&q.r))
                .unwrap_or(Self::from_two(a, b));
        }
        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let x = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let y = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        Self {
            x,
            y,
            r: (a.0 - x).hypot(a.1 - y),
        }
    }
}

/// Smallest circle enclosing every point. Empty input gives a zero circle at
/// the origin.
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Circle {
    let Some(&first) = points.first() else {
        return Circle {
            x: 0.0,
            y: 0.0,
            r: 0.0,
        };
    };
    let mut pts: Vec<(f64, f64)> = convex_hull(points)
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect();
    if pts.is_empty() {
        pts.push((f64::from(first.x), f64::from(first.y)));
    }

    let mut circle = Circle {
        x: pts[0].0,
        y: pts[0].1,
        r: 0.0,
    };
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle {
            x: pts[i].0,
            y: pts[i].1,
            r: 0.0,
        };
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_two(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = Circle::from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    circle
}
