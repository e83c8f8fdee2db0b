use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use shapes::InterpreterConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Settings for running a program, loadable from a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Seconds between steps; negative waits for enter
    pub delay: Option<f64>,
    pub verbose: bool,
    /// Dump intermediate masks next to the program
    pub debug: bool,
}

impl RunConfig {
    /// Load RunConfig from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load RunConfig from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        let parse = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml,
            Some("json") => Self::from_json,
            _ => return Err(CliError::UnsupportedFileFormat),
        };
        parse(&fs::read_to_string(path_ref)?)
    }

    /// Convert RunConfig to TOML string
    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Command-line flags override the file; switches can only be turned on.
    pub fn merge_flags(mut self, delay: Option<f64>, verbose: bool, debug: bool) -> Self {
        if delay.is_some() {
            self.delay = delay;
        }
        self.verbose |= verbose;
        self.debug |= debug;
        self
    }

    pub fn interpreter_config(&self, home_dir: PathBuf) -> InterpreterConfig {
        InterpreterConfig {
            verbose: self.verbose,
            delay: self.delay.unwrap_or(0.0),
            home_dir: Some(home_dir),
        }
    }
}

/// Program paths without an image extension get `.png` appended.
pub fn resolve_program_path(path: &Path) -> PathBuf {
    let has_image_extension = path
        .extension()
        .is_some_and(|ext| ImageFormat::from_extension(ext).is_some());
    if has_image_extension {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".png");
        PathBuf::from(name)
    }
}
