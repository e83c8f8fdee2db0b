pub mod builder;

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
    algorithms::{
        connections::connect_shapes, extraction::TracedContour, masks::distinct_color_count,
        simplification::approximate_polygon,
    },
    debug::DebugDumper,
    error::{Result, ShapesError},
    traits::{CircleDetector, ContourTracer, MaskExtractor},
    types::{Shape, ShapeGraph, ShapeId},
};

/// A parsed program and the directory its relative paths resolve against.
#[derive(Debug, Clone)]
pub struct ParsedProgram {
    pub graph: ShapeGraph,
    pub home_dir: PathBuf,
}

/// Turns a program image into a shape graph
pub struct Parser {
    masks: Box<dyn MaskExtractor>,
    tracer: Box<dyn ContourTracer>,
    circles: Box<dyn CircleDetector>,
    debug: bool,
}

impl Parser {
    /// Create a new parser builder
    pub fn builder() -> builder::ParserBuilder {
        builder::ParserBuilder::new()
    }

    pub fn new(
        masks: Box<dyn MaskExtractor>,
        tracer: Box<dyn ContourTracer>,
        circles: Box<dyn CircleDetector>,
        debug: bool,
    ) -> Self {
        Self {
            masks,
            tracer,
            circles,
            debug,
        }
    }

    /// Load and parse the image at `path`.
    pub fn parse_file(&self, path: &Path) -> Result<ParsedProgram> {
        if !path.is_file() {
            return Err(ShapesError::MissingFile(path.to_path_buf()));
        }
        let image = image::open(path)?.to_rgb8();

        let colors = distinct_color_count(&image);
        if colors < 2 {
            return Err(ShapesError::TooFewColors(colors));
        }

        let home_dir = std::fs::canonicalize(path)?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let dumper = DebugDumper::new(&home_dir, self.debug);

        let graph = self.parse_image(&image, &dumper)?;
        Ok(ParsedProgram { graph, home_dir })
    }

    /// Parse an already decoded program image.
    pub fn parse_image(&self, image: &RgbImage, dumper: &DebugDumper) -> Result<ShapeGraph> {
        let masks = self.masks.extract(image)?;
        dumper.save(&masks.shape, "shape.png")?;
        dumper.save(&masks.path, "path.png")?;
        dumper.save(&masks.foreground, "back.png")?;

        let shape_contours = self.tracer.trace(&masks.shape)?;
        let path_contours = self.tracer.trace(&masks.path)?;
        debug!(
            shapes = shape_contours.len(),
            paths = path_contours.len(),
            "Contours traced"
        );

        let mut graph = self.build_shapes(shape_contours);
        if graph.is_empty() {
            return Err(ShapesError::NoShapes);
        }

        connect_shapes(&mut graph, &path_contours, &masks, dumper)?;
        dumper.save_overlay(image, &graph)?;
        info!(
            shapes = graph.len(),
            top_level = graph.top_level().count(),
            connections = graph.connection_count(),
            "Parsed program"
        );
        Ok(graph)
    }

    fn build_shapes(&self, contours: Vec<TracedContour>) -> ShapeGraph {
        let parents: Vec<Option<usize>> = contours.iter().map(|c| c.parent).collect();

        let mut graph = ShapeGraph::new();
        for (i, contour) in contours.into_iter().enumerate() {
            let circular = self.circles.is_circular(&contour.points).unwrap_or_else(|e| {
                warn!(contour = i, error = %e, "Circle detection failed");
                false
            });
            let points = approximate_polygon(&contour.points);
            graph.push(Shape::new(contour.points, points, circular));
        }

        for (child, parent) in parents.into_iter().enumerate() {
            if let Some(parent) = parent {
                graph.nest(ShapeId(parent), ShapeId(child));
            }
        }
        graph
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Parse the program at `path` with the default components.
pub fn parse(path: &Path, debug: bool) -> Result<ParsedProgram> {
    Parser::builder().debug(debug).build().parse_file(path)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_6, TAU};

    use super::*;
    use crate::classify::Opcode;
    use crate::interpreter::{Halt, Interpreter, InterpreterConfig};
    use image::Rgb;
    use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
    use imageproc::point::Point;

    const WHITE: [u8; 3] = [255, 255, 255];
    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];

    struct NeverCircular;

    impl CircleDetector for NeverCircular {
        fn is_circular(&self, _contour: &[Point<i32>]) -> Result<bool> {
            Ok(false)
        }
    }

    fn fill(img: &mut RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>, color: [u8; 3]) {
        for y in ys {
            for x in xs.clone() {
                img.put_pixel(x, y, Rgb(color));
            }
        }
    }

    /// Two red squares joined by a blue bar, with the legend on the edges.
    fn two_squares() -> RgbImage {
        let mut img = RgbImage::from_pixel(120, 80, Rgb(WHITE));
        fill(&mut img, 0..1, 5..15, RED);
        fill(&mut img, 119..120, 5..15, BLUE);
        fill(&mut img, 20..40, 30..50, RED);
        fill(&mut img, 80..100, 30..50, RED);
        fill(&mut img, 40..80, 38..42, BLUE);
        img
    }

    fn parser() -> Parser {
        Parser::builder().circle_detector(NeverCircular).build()
    }

    #[test]
    fn test_parse_two_connected_squares() {
        let graph = parser()
            .parse_image(&two_squares(), &DebugDumper::disabled())
            .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.opcode(ShapeId(0)), Opcode::Junction);

        let left = &graph[ShapeId(0)];
        assert_eq!(left.connecteds.len(), 1);
        let conn = &left.connecteds[&0];
        assert_eq!(conn.targets.len(), 1);
        assert_eq!(conn.targets[0].shape, ShapeId(1));
        assert!((30..=45).contains(&conn.anchor.x), "{:?}", conn.anchor);
        assert!((78..=92).contains(&conn.targets[0].entry.x), "{:?}", conn.targets[0]);

        let right = &graph[ShapeId(1)];
        assert_eq!(right.connecteds[&0].targets[0].shape, ShapeId(0));
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_no_shapes() {
        let mut img = RgbImage::from_pixel(60, 60, Rgb(WHITE));
        fill(&mut img, 0..1, 5..15, RED);
        fill(&mut img, 59..60, 5..15, BLUE);
        let err = parser().parse_image(&img, &DebugDumper::disabled()).unwrap_err();
        assert!(matches!(err, ShapesError::NoShapes));
    }

    #[test]
    fn test_parse_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("nope.png");
        assert!(matches!(parser().parse_file(&missing), Err(ShapesError::MissingFile(_))));

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"not an image").unwrap();
        assert!(matches!(parser().parse_file(&garbage), Err(ShapesError::ImageLoad(_))));

        let blank = dir.path().join("blank.png");
        RgbImage::from_pixel(10, 10, Rgb(WHITE)).save(&blank).unwrap();
        assert!(matches!(parser().parse_file(&blank), Err(ShapesError::TooFewColors(1))));
    }

    #[test]
    fn test_parse_file_sets_home_dir() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("program.png");
        two_squares().save(&program).unwrap();

        let parsed = parser().parse_file(&program).unwrap();
        assert_eq!(parsed.home_dir, std::fs::canonicalize(dir.path()).unwrap());
        assert_eq!(parsed.graph.top_level().count(), 2);
    }

    fn regular(cx: i32, cy: i32, radius: f64, sides: usize, turn: f64) -> Vec<Point<i32>> {
        (0..sides)
            .map(|i| {
                let angle = turn + TAU * i as f64 / sides as f64;
                Point::new(
                    cx + (radius * angle.cos()).round() as i32,
                    cy + (radius * angle.sin()).round() as i32,
                )
            })
            .collect()
    }

    /// START, NUMBER, OUT and END left to right on one blue line.
    fn start_number_out_end() -> RgbImage {
        let mut img = RgbImage::from_pixel(450, 140, Rgb(WHITE));
        fill(&mut img, 0..1, 5..15, RED);
        fill(&mut img, 449..450, 5..15, BLUE);
        fill(&mut img, 60..390, 67..73, BLUE);

        draw_filled_circle_mut(&mut img, (60, 70), 40, Rgb(RED));
        draw_polygon_mut(&mut img, &regular(60, 70, 22.0, 3, -FRAC_PI_2), Rgb(WHITE));

        draw_polygon_mut(&mut img, &regular(170, 70, 38.0, 5, -FRAC_PI_2), Rgb(RED));
        draw_polygon_mut(&mut img, &regular(280, 70, 38.0, 6, FRAC_PI_6), Rgb(RED));

        draw_filled_circle_mut(&mut img, (390, 70), 40, Rgb(RED));
        fill(&mut img, 375..405, 55..85, WHITE);
        img
    }

    fn find(graph: &ShapeGraph, opcode: Opcode) -> ShapeId {
        graph
            .top_level()
            .find(|&id| graph.opcode(id) == opcode)
            .unwrap_or_else(|| panic!("no {opcode} among {:?}", graph.summaries()))
    }

    #[test]
    fn test_drawn_program_prints_zero() {
        let graph = Parser::default()
            .parse_image(&start_number_out_end(), &DebugDumper::disabled())
            .unwrap();
        assert_eq!(graph.top_level().count(), 4);

        let start = find(&graph, Opcode::Start);
        let number = find(&graph, Opcode::Number);
        let out = find(&graph, Opcode::Out);
        let end = find(&graph, Opcode::End);
        assert!(graph[start].circular && graph[end].circular);
        assert!(!graph[number].circular && !graph[out].circular);
        assert_eq!(graph[start].all_connections().count(), 1);
        assert_eq!(graph[number].connecteds.len(), 2);

        let mut interpreter =
            Interpreter::new(graph, InterpreterConfig::default(), &b""[..], Vec::new()).unwrap();
        let report = interpreter.run().unwrap();
        assert_eq!(report.halt, Halt::Finished);
        assert_eq!(report.steps, 4);
        assert_eq!(
            String::from_utf8_lossy(interpreter.output()),
            "0\n\n--------------|finished|--------------\n"
        );
    }

    #[test]
    fn test_default_parser_tells_round_from_angular() {
        let mut img = RgbImage::from_pixel(260, 140, Rgb(WHITE));
        fill(&mut img, 0..1, 5..15, RED);
        fill(&mut img, 259..260, 5..15, BLUE);

        draw_filled_circle_mut(&mut img, (60, 70), 40, Rgb(RED));
        draw_polygon_mut(&mut img, &regular(60, 70, 22.0, 3, -FRAC_PI_2), Rgb(WHITE));

        // notched block with a round hole
        let block = [(140, 25), (240, 25), (240, 115), (202, 115), (190, 83), (178, 115), (140, 115)]
            .map(|(x, y)| Point::new(x, y));
        draw_polygon_mut(&mut img, &block, Rgb(RED));
        draw_filled_circle_mut(&mut img, (190, 53), 16, Rgb(WHITE));

        let graph = Parser::default()
            .parse_image(&img, &DebugDumper::disabled())
            .unwrap();
        assert_eq!(graph.top_level().count(), 2);

        let start = find(&graph, Opcode::Start);
        let read = find(&graph, Opcode::Read);
        assert!(graph[start].circular);
        assert!(!graph[read].circular);
        assert_eq!(graph[read].points.len(), 7);

        let start_holes = graph.holes(start);
        assert_eq!(start_holes.len(), 1);
        assert!(!graph[start_holes[0]].circular);
        assert_eq!(graph[start_holes[0]].points.len(), 3);

        let read_holes = graph.holes(read);
        assert_eq!(read_holes.len(), 1);
        assert!(graph[read_holes[0]].circular);
    }

    #[test]
    fn test_debug_run_writes_overlay() {
        let home = tempfile::tempdir().unwrap();
        let dumper = DebugDumper::new(home.path(), true);
        parser().parse_image(&two_squares(), &dumper).unwrap();

        for name in ["shape.png", "path.png", "back.png", "seen.png"] {
            assert!(dumper.dir().join(name).is_file(), "{name}");
        }
    }
}
