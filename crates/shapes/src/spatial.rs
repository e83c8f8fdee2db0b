//! Static k-d tree over `(x, y, r)` of enclosing circles.

use crate::{algorithms::geometry::Circle, types::ShapeId};

const DIMS: usize = 3;

type Key = [f64; DIMS];

fn key(circle: &Circle) -> Key {
    [circle.x, circle.y, circle.r]
}

fn squared_distance(a: &Key, b: &Key) -> f64 {
    a.iter().zip(b).map(|(p, q)| (p - q) * (p - q)).sum()
}

#[derive(Debug, Clone)]
struct Node {
    key: Key,
    id: ShapeId,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Nearest-neighbour lookup from a circle to the shape it was built from.
#[derive(Debug, Clone, Default)]
pub struct CircleIndex {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl CircleIndex {
    pub fn build(entries: Vec<(Circle, ShapeId)>) -> Self {
        let mut items: Vec<(Key, ShapeId)> = entries.iter().map(|(c, id)| (key(c), *id)).collect();
        let mut index = Self::default();
        index.root = index.split(&mut items, 0);
        index
    }

    fn split(&mut self, items: &mut [(Key, ShapeId)], depth: usize) -> Option<usize> {
        if items.is_empty() {
            return None;
        }
        let axis = depth % DIMS;
        items.sort_by(|a, b| a.0[axis].total_cmp(&b.0[axis]).then(a.1.cmp(&b.1)));
        let mid = items.len() / 2;
        let (key, id) = items[mid];

        let slot = self.nodes.len();
        self.nodes.push(Node {
            key,
            id,
            axis,
            left: None,
            right: None,
        });
        let (lower, upper) = items.split_at_mut(mid);
        let left = self.split(lower, depth + 1);
        let right = self.split(&mut upper[1..], depth + 1);
        self.nodes[slot].left = left;
        self.nodes[slot].right = right;
        Some(slot)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Shape whose circle is closest in `(x, y, r)` space; equal distances go
    /// to the lower id.
    pub fn nearest(&self, circle: &Circle) -> Option<ShapeId> {
        let query = key(circle);
        let mut best: Option<(f64, ShapeId)> = None;
        self.search(self.root, &query, &mut best);
        best.map(|(_, id)| id)
    }

    fn search(&self, node: Option<usize>, query: &Key, best: &mut Option<(f64, ShapeId)>) {
        let Some(node) = node.map(|i| &self.nodes[i]) else {
            return;
        };

        let d = squared_distance(&node.key, query);
        let better = match *best {
            None => true,
            Some((bd, bid)) => d < bd || (d == bd && node.id < bid),
        };
        if better {
            *best = Some((d, node.id));
        }

        let diff = query[node.axis] - node.key[node.axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        self.search(near, query, best);
        if best.is_none_or(|(bd, _)| diff * diff <= bd) {
            self.search(far, query, best);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(x: f64, y: f64, r: f64) -> Circle {
        Circle { x, y, r }
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let circles: Vec<(Circle, ShapeId)> = (0..40)
            .map(|i| {
                let f = f64::from(i);
                (circle((f * 37.0) % 101.0, (f * 53.0) % 89.0, 5.0 + f % 7.0), ShapeId(i as usize))
            })
            .collect();
        let index = CircleIndex::build(circles.clone());
        assert_eq!(index.len(), 40);

        for q in [circle(10.0, 10.0, 6.0), circle(90.0, 3.0, 1.0), circle(50.0, 44.0, 20.0)] {
            let expected = circles
                .iter()
                .min_by(|a, b| {
                    squared_distance(&key(&a.0), &key(&q))
                        .total_cmp(&squared_distance(&key(&b.0), &key(&q)))
                        .then(a.1.cmp(&b.1))
                })
                .map(|(_, id)| *id);
            assert_eq!(index.nearest(&q), expected);
        }
    }

    #[test]
    fn test_ties_go_to_lower_id() {
        let index = CircleIndex::build(vec![
            (circle(0.0, 0.0, 1.0), ShapeId(7)),
            (circle(10.0, 0.0, 1.0), ShapeId(2)),
        ]);
        assert_eq!(index.nearest(&circle(5.0, 0.0, 1.0)), Some(ShapeId(2)));
        assert!(CircleIndex::default().nearest(&circle(0.0, 0.0, 0.0)).is_none());
    }
}
