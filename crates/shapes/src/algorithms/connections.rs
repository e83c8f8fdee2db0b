//! Works out which shapes each path joins and where it touches them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use image::GrayImage;
use tracing::{debug, error};

use crate::{
    algorithms::{
        extraction::{TracedContour, fill_contour, trace_contours},
        geometry::{min_enclosing_circle, vertex_centroid},
        masks::MaskSet,
        morphology::{
            close, dilate, erode, first_set_pixel, flood_fill, intersect, invert, open, select,
            subtract, union, xor, OFF,
        },
    },
    debug::DebugDumper,
    error::{Result, ShapesError},
    spatial::CircleIndex,
    types::{PathId, ShapeGraph, ShapeId},
};

const MARK: u8 = 100;

/// Reach of a path when locating where it meets a shape.
const CONTACT_REACH: u32 = 10;

/// Shape mask with every hole filled in.
fn fill_holes(shape: &GrayImage) -> GrayImage {
    let outside = invert(shape);
    let mut flooded = outside.clone();
    flood_fill(&mut flooded, (0, 0), OFF);
    invert(&xor(&flooded, &outside))
}

/// Regions of the shape mask a single path runs into.
fn touched_regions(
    path: &TracedContour,
    masks: &MaskSet,
    shape_eroded: &GrayImage,
    shapes_no_holes: &GrayImage,
) -> Vec<TracedContour> {
    let (w, h) = masks.shape.dimensions();
    let footprint = fill_contour(&path.points, w, h);
    let near = dilate(&footprint, 2, 1);
    let wide = dilate(&footprint, 6, 1);

    let mut fused = close(&union(&near, &masks.shape), 2, 1);
    let other_paths = xor(&masks.path, &footprint);

    if let Some(seed) = first_set_pixel(&intersect(&wide, shape_eroded)) {
        flood_fill(&mut fused, seed, MARK);
    }

    let reached = subtract(&subtract(&select(&fused, MARK), &masks.background), &other_paths);
    let reached = close(&dilate(&open(&reached, 2, 1), 2, 1), 16, 2);
    let reached = intersect(&reached, shapes_no_holes);

    let mut detached = subtract(&reached, &near);
    flood_fill(&mut detached, (0, 0), MARK);
    let regions = close(&invert(&select(&detached, MARK)), 2, 1);

    trace_contours(&regions)
}

/// Find the shapes every path connects and record each directed pair on the
/// source shape.
pub fn connect_shapes(
    graph: &mut ShapeGraph,
    path_contours: &[TracedContour],
    masks: &MaskSet,
    dumper: &DebugDumper,
) -> Result<()> {
    let index = CircleIndex::build(
        graph
            .top_level()
            .map(|id| (min_enclosing_circle(&graph[id].contour), id))
            .collect(),
    );

    let shapes_no_holes = fill_holes(&masks.shape);
    let shape_eroded = erode(&masks.shape, 2, 1);

    let mut connections: BTreeMap<PathId, BTreeSet<ShapeId>> = BTreeMap::new();
    for (path, contour) in path_contours.iter().enumerate() {
        for region in touched_regions(contour, masks, &shape_eroded, &shapes_no_holes) {
            if let Some(id) = index.nearest(&min_enclosing_circle(&region.points)) {
                connections.entry(path).or_default().insert(id);
            }
        }
        debug!(path, shapes = ?connections.get(&path), "Path traced");
    }

    let (w, h) = masks.shape.dimensions();
    let mut filled: HashMap<ShapeId, GrayImage> = HashMap::new();
    let mut filled_shape = |graph: &ShapeGraph, id: ShapeId| {
        filled
            .entry(id)
            .or_insert_with(|| fill_contour(&graph[id].contour, w, h))
            .clone()
    };

    for (&path, shapes) in &connections {
        let reach = dilate(&fill_contour(&path_contours[path].points, w, h), CONTACT_REACH, 1);

        for &from in shapes {
            for &to in shapes {
                if from == to {
                    continue;
                }
                let from_mask = filled_shape(&*graph, from);
                let to_mask = filled_shape(&*graph, to);
                let from_contact = intersect(&from_mask, &reach);
                let to_contact = intersect(&to_mask, &reach);

                let anchor = trace_contours(&from_contact).into_iter().next();
                let entry = trace_contours(&to_contact).into_iter().next();
                match (anchor, entry) {
                    (Some(anchor), Some(entry)) => graph[from].connect_shape(
                        path,
                        to,
                        vertex_centroid(&anchor.points),
                        vertex_centroid(&entry.points),
                    ),
                    _ => {
                        error!(path, %from, %to, "Shape connection could not be resolved");
                        let everything = union(&union(&from_mask, &to_mask), &reach);
                        dumper.save_always(&from_contact, &format!("problem-{path}.png"))?;
                        dumper.save_always(&to_contact, "problem2.png")?;
                        dumper.save_always(&reach, "problem_path.png")?;
                        dumper.save_always(&everything, "problem_all.png")?;
                        dumper.save_always(&from_mask, "problem_shape.png")?;
                        dumper.save_always(&to_mask, "problem_shape2.png")?;
                        return Err(ShapesError::UnresolvedConnection { path, from, to });
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::morphology::{count_set, ON};
    use image::Luma;

    #[test]
    fn test_fill_holes() {
        let mut shape = GrayImage::new(30, 30);
        for y in 5..25 {
            for x in 5..25 {
                let border = !(10..20).contains(&x) || !(10..20).contains(&y);
                if border {
                    shape.put_pixel(x, y, Luma([ON]));
                }
            }
        }
        let filled = fill_holes(&shape);
        assert_eq!(filled.get_pixel(15, 15)[0], ON);
        assert_eq!(filled.get_pixel(2, 2)[0], OFF);
        assert_eq!(count_set(&filled), 400);
    }
}
