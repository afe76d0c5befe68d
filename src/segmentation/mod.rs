mod extractor;
mod preprocess;
pub mod types;

pub use extractor::MaskExtractor;
pub use types::{BoundingBox, Segmenter};
