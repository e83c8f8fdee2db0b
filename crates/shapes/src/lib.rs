//! # Shapes
//!
//! Parser and interpreter for Shapes, a visual programming language whose
//! programs are images. Coloured regions are instructions, picked by their
//! side count, convexity and holes; coloured strokes between them are the
//! paths control flow follows.
//!
//! ## Core Features
//!
//! - **Colour legend**: the shape and path colours are read from the left and
//!   right image edges
//! - **Trait-based parsing**: mask extraction, contour tracing and circle
//!   detection are swappable components
//! - **Stack machine**: a single global operand stack plus per-shape registers
//!   and local stacks
//! - **Debug dumps**: intermediate masks can be written next to the program
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::io;
//! use std::path::Path;
//! use shapes::{Interpreter, InterpreterConfig, parse};
//!
//! let program = parse(Path::new("hello.png"), false)?;
//! let config = InterpreterConfig {
//!     home_dir: Some(program.home_dir),
//!     ..InterpreterConfig::default()
//! };
//!
//! let mut interpreter = Interpreter::new(program.graph, config, io::stdin().lock(), io::stdout())?;
//! interpreter.run()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Parser
//!
//! ```rust,no_run
//! use shapes::{Parser, algorithms::HoughParams};
//!
//! let parser = Parser::builder()
//!     .with_hough_params(HoughParams {
//!         acc_threshold: 40,
//!         ..HoughParams::default()
//!     })
//!     .debug(true)
//!     .build();
//! let program = parser.parse_file("hello.png".as_ref())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod algorithms;
pub mod classify;
pub mod debug;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod spatial;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use classify::{Fingerprint, Opcode, classify};
pub use debug::DebugDumper;
pub use error::{Result, ShapesError};
pub use interpreter::{Halt, Interpreter, InterpreterConfig, MachineState, RunReport, Value};
pub use parser::{ParsedProgram, Parser, builder::ParserBuilder, parse};
pub use traits::*;
pub use types::{Shape, ShapeGraph, ShapeId, ShapeSummary, Slot};
