mod image_sequence;

pub use image_sequence::ImageSequence;

use anyhow::Result;
use image::RgbImage;

/// Trait for video frame sources
pub trait FrameSource {
    /// Next frame in order, or `None` once the source is exhausted
    ///
    /// A frame that fails to decode is reported as an error and consumed;
    /// the following call moves on to the next frame.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the resolution of delivered frames
    fn resolution(&self) -> (u32, u32);
}
