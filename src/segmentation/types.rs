use crate::error::PipelineError;
use image::RgbImage;
use imageproc::point::Point;

/// Axis-aligned box in source-image pixel coordinates
///
/// `right` and `bottom` are the coordinates of the extreme foreground
/// pixels. Cropping takes rows `[top, bottom)` and columns `[left, right)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Box spanned by the leftmost, rightmost, topmost and bottommost points
    ///
    /// Returns `None` for an empty point set.
    pub fn from_extremes(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::new(
            first.x.max(0) as u32,
            first.y.max(0) as u32,
            first.x.max(0) as u32,
            first.y.max(0) as u32,
        );
        for p in points {
            let (x, y) = (p.x.max(0) as u32, p.y.max(0) as u32);
            bbox.left = bbox.left.min(x);
            bbox.right = bbox.right.max(x);
            bbox.top = bbox.top.min(y);
            bbox.bottom = bbox.bottom.max(y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Check the crop window is non-empty and lies inside a `width`x`height` image
    pub fn validate(&self, width: u32, height: u32) -> Result<(), PipelineError> {
        if self.left < self.right
            && self.top < self.bottom
            && self.right <= width
            && self.bottom <= height
        {
            Ok(())
        } else {
            Err(PipelineError::InvalidBoundingBox {
                left: self.left,
                top: self.top,
                right: self.right,
                bottom: self.bottom,
                width,
                height,
            })
        }
    }
}

/// Trait for foreground extraction backends
pub trait Segmenter {
    /// Extract the dominant foreground object of a frame
    ///
    /// # Returns
    /// * The frame with every background pixel zeroed, and the object's
    ///   bounding box
    fn extract(&self, frame: &RgbImage) -> Result<(RgbImage, BoundingBox), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_give_tight_box() {
        let points = [
            Point::new(5, 9),
            Point::new(2, 4),
            Point::new(8, 6),
            Point::new(4, 12),
        ];
        let bbox = BoundingBox::from_extremes(&points).unwrap();
        assert_eq!(bbox, BoundingBox::new(2, 4, 8, 12));
        assert_eq!((bbox.width(), bbox.height()), (6, 8));
        assert!(BoundingBox::from_extremes(&[]).is_none());
    }

    #[test]
    fn validate_rejects_empty_and_out_of_bounds_boxes() {
        assert!(BoundingBox::new(1, 1, 5, 5).validate(5, 5).is_ok());
        assert!(BoundingBox::new(3, 1, 3, 5).validate(10, 10).is_err());
        assert!(BoundingBox::new(1, 1, 11, 5).validate(10, 10).is_err());
    }
}
