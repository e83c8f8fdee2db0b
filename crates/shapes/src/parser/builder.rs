use crate::{
    algorithms::{
        detection::HoughCircularity, extraction::ImageprocContourTracer,
        hough::HoughParams, masks::EdgeColorMaskExtractor,
    },
    parser::Parser,
    traits::{CircleDetector, ContourTracer, MaskExtractor},
};

/// Builder for creating parsers with a fluent API
pub struct ParserBuilder {
    masks: Option<Box<dyn MaskExtractor>>,
    tracer: Option<Box<dyn ContourTracer>>,
    circles: Option<Box<dyn CircleDetector>>,
    debug: bool,
}

impl ParserBuilder {
    pub fn new() -> Self {
        Self {
            masks: None,
            tracer: None,
            circles: None,
            debug: false,
        }
    }

    /// Write intermediate masks to `debugging/` next to the program
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the mask extractor (replaces any existing one)
    pub fn mask_extractor<M>(mut self, extractor: M) -> Self
    where
        M: MaskExtractor + 'static,
    {
        self.masks = Some(Box::new(extractor));
        self
    }

    /// Set the contour tracer (replaces any existing one)
    pub fn contour_tracer<T>(mut self, tracer: T) -> Self
    where
        T: ContourTracer + 'static,
    {
        self.tracer = Some(Box::new(tracer));
        self
    }

    /// Set the circle detector (replaces any existing one)
    pub fn circle_detector<C>(mut self, detector: C) -> Self
    where
        C: CircleDetector + 'static,
    {
        self.circles = Some(Box::new(detector));
        self
    }

    /// Use the Hough circle detector with custom parameters
    pub fn with_hough_params(self, params: HoughParams) -> Self {
        self.circle_detector(HoughCircularity {
            params,
            ..HoughCircularity::default()
        })
    }

    /// Build the parser with default components if not specified
    pub fn build(self) -> Parser {
        let masks = self
            .masks
            .unwrap_or_else(|| Box::new(EdgeColorMaskExtractor));
        let tracer = self
            .tracer
            .unwrap_or_else(|| Box::new(ImageprocContourTracer));
        let circles = self
            .circles
            .unwrap_or_else(|| Box::new(HoughCircularity::default()));

        Parser::new(masks, tracer, circles, self.debug)
    }
}

impl Default for ParserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
