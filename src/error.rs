use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the extraction and compositing pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no foreground contour found in frame")]
    NoForeground,

    #[error("cannot resize an image with zero width")]
    ZeroWidth,

    #[error("image has {channels} channel(s), expected a color image")]
    NotColor { channels: u8 },

    #[error("bounding box ({left},{top})-({right},{bottom}) is empty or outside the {width}x{height} image")]
    InvalidBoundingBox {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        width: u32,
        height: u32,
    },

    #[error("mask {mask_width}x{mask_height} does not fit background {width}x{height}")]
    MaskDoesNotFit {
        mask_width: u32,
        mask_height: u32,
        width: u32,
        height: u32,
    },

    #[error("label center ({center_x}, {center_y}) lies outside the unit square")]
    CenterOutOfRange { center_x: f64, center_y: f64 },

    #[error("label box did not fit the image after {iterations} shrink steps")]
    ClampDidNotConverge { iterations: usize },

    #[error("class {0} is not in the target class set")]
    UnknownClass(u32),

    #[error("malformed label line {line:?}: {reason}")]
    MalformedLabel { line: String, reason: String },

    #[error("malformed mask catalog record at line {line_number}: {reason}")]
    MalformedCatalog { line_number: usize, reason: String },

    #[error("mask catalog {0} contains no records")]
    EmptyCatalog(PathBuf),

    #[error("missing required configuration key {0}")]
    MissingKey(&'static str),

    #[error("invalid value {value:?} for configuration key {key}")]
    InvalidValue { key: String, value: String },
}

impl PipelineError {
    /// Whether the error only invalidates the current item.
    ///
    /// Item-local errors are logged and skipped during a batch; everything
    /// else (configuration and catalog defects) aborts the batch.
    pub fn is_item_local(&self) -> bool {
        !matches!(
            self,
            PipelineError::MalformedCatalog { .. }
                | PipelineError::EmptyCatalog(_)
                | PipelineError::MissingKey(_)
                | PipelineError::InvalidValue { .. }
        )
    }
}
