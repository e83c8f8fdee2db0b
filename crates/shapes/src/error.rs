use std::path::PathBuf;

use thiserror::Error;

use crate::types::{PathId, ShapeId};

#[derive(Error, Debug)]
pub enum ShapesError {
    #[error("Can't find a program image at {0}")]
    MissingFile(PathBuf),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Image needs at least two colors, found {0}")]
    TooFewColors(usize),

    #[error("Shape color {0:?} can't also be a path color")]
    ColorOverlap([u8; 3]),

    #[error("No {0} colors found on the image edge")]
    MissingColors(&'static str),

    #[error("No shapes found")]
    NoShapes,

    #[error("Connection from shape {from} to shape {to} along path {path} could not be resolved")]
    UnresolvedConnection {
        path: PathId,
        from: ShapeId,
        to: ShapeId,
    },

    #[error("Geometric computation error: {0}")]
    GeometricComputation(String),

    #[error("No start found")]
    NoStart,

    #[error("You can't have more than one start, found {0}")]
    MultipleStarts(usize),

    #[error("Start isn't connected to anything")]
    StartDisconnected,

    #[error("Start can't be connected to more than one shape")]
    StartFanOut,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShapesError>;
