use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::algorithms::geometry::{distance, is_convex, vertex_centroid};
use crate::classify::{Fingerprint, Opcode, classify};
use crate::interpreter::value::Value;

/// Stable index of a shape inside a [`ShapeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShapeId(pub usize);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of the path contour a connection was discovered on.
pub type PathId = usize;

/// One end of a connection: the shape reached and where the path enters it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub shape: ShapeId,
    pub entry: Point<i32>,
}

/// Everything a single path connects a shape to.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    /// Where the path touches the owning shape
    pub anchor: Point<i32>,
    /// Shapes reached along the path, in discovery order
    pub targets: Vec<Target>,
}

/// Mutable payload of a shape. Only this changes while a program runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Slot {
    #[default]
    Empty,
    /// A single register value (containers)
    Held(Value),
    /// A shape-local stack (stack shapes)
    Stack(Vec<Value>),
}

#[derive(Debug, Clone)]
pub struct Shape {
    /// Traced boundary of the region
    pub contour: Vec<Point<i32>>,
    /// Approximated polygon of the contour
    pub points: Vec<Point<i32>>,
    pub circular: bool,
    /// Vertex centroid of `points`
    pub center: Point<i32>,
    pub value: Slot,
    pub outer: Option<ShapeId>,
    pub insides: Vec<ShapeId>,
    pub connecteds: BTreeMap<PathId, Connection>,
}

impl Shape {
    pub fn new(contour: Vec<Point<i32>>, points: Vec<Point<i32>>, circular: bool) -> Self {
        let center = vertex_centroid(&points);
        Self {
            contour,
            points,
            circular,
            center,
            value: Slot::Empty,
            outer: None,
            insides: Vec::new(),
            connecteds: BTreeMap::new(),
        }
    }

    /// Side count (1 for round shapes) and convexity of the approximated polygon.
    pub fn fingerprint(&self) -> Fingerprint {
        let sides = if self.circular { 1 } else { self.points.len() };
        Fingerprint::new(sides, is_convex(&self.points))
    }

    /// Record that `path` leads from `anchor` on this shape to `entry` on `target`.
    ///
    /// The anchor of the first recording for a path is kept; later recordings
    /// only add targets.
    pub fn connect_shape(
        &mut self,
        path: PathId,
        target: ShapeId,
        anchor: Point<i32>,
        entry: Point<i32>,
    ) {
        self.connecteds
            .entry(path)
            .or_insert_with(|| Connection {
                anchor,
                targets: Vec::new(),
            })
            .targets
            .push(Target {
                shape: target,
                entry,
            });
    }

    /// Every `(path, target)` pair leaving this shape, in path order.
    pub fn all_connections(&self) -> impl Iterator<Item = (PathId, Target)> + '_ {
        self.connecteds
            .iter()
            .flat_map(|(&path, conn)| conn.targets.iter().map(move |&t| (path, t)))
    }

    /// Successor when the shape has no branching semantics: the connection
    /// whose anchor is farthest from `from` (a zero distance never qualifies),
    /// then the target entering nearest to that anchor.
    pub fn default_next(&self, from: Point<i32>) -> Option<(PathId, Target)> {
        let mut farthest: Option<(f64, PathId, &Connection)> = None;
        for (&path, conn) in &self.connecteds {
            let dist = distance(conn.anchor, from);
            if dist > farthest.map_or(0.0, |(best, _, _)| best) {
                farthest = Some((dist, path, conn));
            }
        }

        let (_, path, conn) = farthest?;
        conn.targets
            .iter()
            .min_by(|a, b| {
                distance(conn.anchor, a.entry).total_cmp(&distance(conn.anchor, b.entry))
            })
            .map(|&target| (path, target))
    }
}

/// Arena of every shape found in a program image, holes included.
#[derive(Debug, Clone, Default)]
pub struct ShapeGraph {
    shapes: Vec<Shape>,
}

impl ShapeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, shape: Shape) -> ShapeId {
        self.shapes.push(shape);
        ShapeId(self.shapes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter().enumerate().map(|(i, s)| (ShapeId(i), s))
    }

    pub fn ids(&self) -> impl Iterator<Item = ShapeId> {
        (0..self.shapes.len()).map(ShapeId)
    }

    /// Shapes that are not nested in anything.
    pub fn top_level(&self) -> impl Iterator<Item = ShapeId> {
        self.iter()
            .filter(|(_, s)| s.outer.is_none())
            .map(|(id, _)| id)
    }

    /// Place `child` directly inside `parent`.
    pub fn nest(&mut self, parent: ShapeId, child: ShapeId) {
        self[parent].insides.push(child);
        self[child].outer = Some(parent);
    }

    pub fn hops_to_root(&self, id: ShapeId) -> usize {
        std::iter::successors(self[id].outer, |&p| self[p].outer).count()
    }

    /// Every descendant, depth first in nesting order.
    pub fn all_children(&self, id: ShapeId) -> Vec<ShapeId> {
        let mut children = Vec::new();
        let mut pending: Vec<ShapeId> = self[id].insides.iter().rev().copied().collect();
        while let Some(child) = pending.pop() {
            children.push(child);
            pending.extend(self[child].insides.iter().rev().copied());
        }
        children
    }

    /// Descendants at an odd distance from their root.
    pub fn holes(&self, id: ShapeId) -> Vec<ShapeId> {
        self.all_children(id)
            .into_iter()
            .filter(|&c| self.hops_to_root(c) % 2 == 1)
            .collect()
    }

    pub fn hole_count(&self, id: ShapeId) -> usize {
        self.holes(id).len()
    }

    /// Opcode of a shape, derived from its geometry every time it is asked.
    pub fn opcode(&self, id: ShapeId) -> Opcode {
        let holes: Vec<Fingerprint> = self
            .holes(id)
            .into_iter()
            .map(|h| self[h].fingerprint())
            .collect();
        classify(self[id].fingerprint(), &holes)
    }

    /// The value a shape stands for when matched by a control shape.
    pub fn value_of(&self, id: ShapeId) -> Option<Value> {
        match (self.opcode(id), &self[id].value) {
            (Opcode::Number, _) => Some(Value::Int(self.hole_count(id) as i64)),
            (_, Slot::Stack(local)) => local.last().cloned(),
            (_, Slot::Held(value)) => Some(value.clone()),
            (_, Slot::Empty) => None,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.shapes
            .iter()
            .flat_map(|s| s.connecteds.values())
            .map(|c| c.targets.len())
            .sum()
    }

    /// Serializable overview of every top-level shape.
    pub fn summaries(&self) -> Vec<ShapeSummary> {
        self.top_level()
            .map(|id| {
                let shape = &self[id];
                ShapeSummary {
                    id,
                    opcode: self.opcode(id),
                    hole_sides: self
                        .holes(id)
                        .into_iter()
                        .map(|h| self[h].points.len())
                        .collect(),
                    center: [shape.center.x, shape.center.y],
                    circular: shape.circular,
                    connections: shape
                        .connecteds
                        .iter()
                        .map(|(&path, c)| ConnectionSummary {
                            path,
                            anchor: [c.anchor.x, c.anchor.y],
                            targets: c.targets.iter().map(|t| t.shape).collect(),
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

impl Index<ShapeId> for ShapeGraph {
    type Output = Shape;

    fn index(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0]
    }
}

impl IndexMut<ShapeId> for ShapeGraph {
    fn index_mut(&mut self, id: ShapeId) -> &mut Shape {
        &mut self.shapes[id.0]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeSummary {
    pub id: ShapeId,
    pub opcode: Opcode,
    /// Vertex count of each hole
    pub hole_sides: Vec<usize>,
    pub center: [i32; 2],
    pub circular: bool,
    pub connections: Vec<ConnectionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub path: PathId,
    pub anchor: [i32; 2],
    pub targets: Vec<ShapeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, size: i32) -> Shape {
        let points = vec![
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
        ];
        Shape::new(points.clone(), points, false)
    }

    #[test]
    fn test_hole_parity() {
        let mut graph = ShapeGraph::new();
        let outer = graph.push(square(0, 0, 100));
        let hole = graph.push(square(10, 10, 80));
        let nested = graph.push(square(20, 20, 60));
        let nested_hole = graph.push(square(30, 30, 40));
        graph.nest(outer, hole);
        graph.nest(hole, nested);
        graph.nest(nested, nested_hole);

        assert_eq!(graph.hops_to_root(nested_hole), 3);
        assert_eq!(graph.holes(outer), vec![hole, nested_hole]);
        assert_eq!(graph.holes(nested), vec![nested_hole]);
        assert_eq!(graph.top_level().collect::<Vec<_>>(), vec![outer]);
    }

    #[test]
    fn test_connect_shape_keeps_first_anchor() {
        let mut shape = square(0, 0, 10);
        shape.connect_shape(3, ShapeId(1), Point::new(10, 5), Point::new(50, 5));
        shape.connect_shape(3, ShapeId(2), Point::new(99, 99), Point::new(50, 50));

        let conn = &shape.connecteds[&3];
        assert_eq!(conn.anchor, Point::new(10, 5));
        assert_eq!(conn.targets.len(), 2);
        assert_eq!(shape.all_connections().count(), 2);
    }

    #[test]
    fn test_default_next_farthest_then_nearest() {
        let mut shape = square(0, 0, 10);
        // arrival path, anchored exactly where we came in
        shape.connect_shape(0, ShapeId(1), Point::new(0, 5), Point::new(-20, 5));
        shape.connect_shape(1, ShapeId(2), Point::new(10, 5), Point::new(60, 5));
        shape.connect_shape(1, ShapeId(3), Point::new(10, 5), Point::new(30, 5));

        let (path, target) = shape.default_next(Point::new(0, 5)).unwrap();
        assert_eq!(path, 1);
        assert_eq!(target.shape, ShapeId(3));
    }

    #[test]
    fn test_default_next_zero_distance_is_dead_end() {
        let mut shape = square(0, 0, 10);
        shape.connect_shape(0, ShapeId(1), Point::new(0, 5), Point::new(-20, 5));
        assert!(shape.default_next(Point::new(0, 5)).is_none());
        assert!(square(0, 0, 10).default_next(Point::new(0, 0)).is_none());
    }
}
