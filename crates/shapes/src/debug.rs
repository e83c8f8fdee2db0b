use std::path::{Path, PathBuf};

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};
use imageproc::point::Point;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::{classify::Opcode, error::Result, types::ShapeGraph};

/// Outline colours, cycled through in opcode order
const MARKS: [[u8; 3]; 6] = [
    [0, 170, 0],
    [230, 120, 0],
    [150, 0, 200],
    [0, 150, 210],
    [210, 0, 120],
    [90, 90, 90],
];

/// Writes intermediate masks into a `debugging/` directory next to the program.
#[derive(Debug, Clone)]
pub struct DebugDumper {
    dir: PathBuf,
    enabled: bool,
}

impl DebugDumper {
    pub fn new(home_dir: &Path, enabled: bool) -> Self {
        Self {
            dir: home_dir.join("debugging"),
            enabled,
        }
    }

    /// A dumper that only writes failure diagnostics, into the working directory.
    pub fn disabled() -> Self {
        Self::new(Path::new("."), false)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save only when debugging is on.
    pub fn save(&self, mask: &GrayImage, name: &str) -> Result<()> {
        if self.enabled {
            self.save_always(mask, name)?;
        }
        Ok(())
    }

    pub fn save_always(&self, mask: &GrayImage, name: &str) -> Result<()> {
        let path = self.target(name)?;
        mask.save(&path)?;
        debug!(path = %path.display(), "Saved debug image");
        Ok(())
    }

    /// Write `seen.png`, the program image annotated with what the parser
    /// recognised. Only when debugging is on.
    pub fn save_overlay(&self, image: &RgbImage, graph: &ShapeGraph) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.target("seen.png")?;
        overlay(image, graph).save(&path)?;
        debug!(path = %path.display(), "Saved recognised shapes");
        Ok(())
    }

    fn target(&self, name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(name))
    }
}

fn mark_color(opcode: Opcode) -> Rgb<u8> {
    let index = Opcode::iter().position(|o| o == opcode).unwrap_or(0);
    Rgb(MARKS[index % MARKS.len()])
}

fn outline(canvas: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
    for (i, p) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        draw_line_segment_mut(
            canvas,
            (p.x as f32, p.y as f32),
            (next.x as f32, next.y as f32),
            color,
        );
    }
}

/// Copy of `image` with every top-level shape and its holes outlined in its
/// opcode's colour, a cross on each centre and a line from every connection
/// anchor to the entry point it leads to.
pub fn overlay(image: &RgbImage, graph: &ShapeGraph) -> RgbImage {
    let mut canvas = image.clone();
    for id in graph.top_level() {
        let shape = &graph[id];
        let opcode = graph.opcode(id);
        let color = mark_color(opcode);
        debug!(shape = %id, %opcode, x = shape.center.x, y = shape.center.y, "Recognised");

        outline(&mut canvas, &shape.points, color);
        for hole in graph.holes(id) {
            outline(&mut canvas, &graph[hole].points, color);
        }
        draw_cross_mut(&mut canvas, color, shape.center.x, shape.center.y);

        for conn in shape.connecteds.values() {
            for target in &conn.targets {
                draw_line_segment_mut(
                    &mut canvas,
                    (conn.anchor.x as f32, conn.anchor.y as f32),
                    (target.entry.x as f32, target.entry.y as f32),
                    color,
                );
            }
        }
    }
    canvas
}
