mod dataset_writer;

pub use dataset_writer::DatasetWriter;

use crate::labels::YoloLabel;
use anyhow::Result;
use image::RgbImage;
use std::path::PathBuf;

/// Trait for dataset destinations
pub trait OutputSink {
    /// Store one labeled image under the given sample index
    ///
    /// Returns the path the image was written to.
    fn write_sample(&mut self, index: usize, image: &RgbImage, labels: &[YoloLabel]) -> Result<PathBuf>;
}
