use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;

/// Binarizes frames ahead of contour detection
pub struct Preprocessor {
    low: u8,
    high: u8,
}

impl Preprocessor {
    pub fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    /// Convert a color frame into a cleaned binary image
    ///
    /// Steps:
    /// 1. Convert to grayscale
    /// 2. Fixed threshold: intensities above `low` become `high`, the rest 0
    /// 3. One 3x3 erosion to drop thin noise
    ///
    /// Returns: GrayImage with foreground 255 and background 0
    pub fn binarize(&self, frame: &RgbImage) -> GrayImage {
        let _span = tracing::debug_span!("binarize").entered();

        let mut gray = imageops::grayscale(frame);
        for pixel in gray.pixels_mut() {
            *pixel = if pixel[0] > self.low {
                Luma([self.high])
            } else {
                Luma([0])
            };
        }

        erode(&gray, Norm::LInf, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn threshold_then_erode_shrinks_blob_by_one_pixel() {
        let frame = RgbImage::from_fn(30, 30, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                Rgb([220, 220, 220])
            } else {
                Rgb([30, 30, 30])
            }
        });

        let binary = Preprocessor::new(100, 255).binarize(&frame);
        assert_eq!(binary.get_pixel(10, 10)[0], 0);
        assert_eq!(binary.get_pixel(11, 11)[0], 255);
        assert_eq!(binary.get_pixel(18, 18)[0], 255);
        assert_eq!(binary.get_pixel(19, 15)[0], 0);
        assert_eq!(binary.get_pixel(2, 2)[0], 0);
    }

    #[test]
    fn single_pixel_noise_is_removed() {
        let mut frame = RgbImage::new(10, 10);
        frame.put_pixel(5, 5, Rgb([255, 255, 255]));
        let binary = Preprocessor::new(100, 255).binarize(&frame);
        assert!(binary.pixels().all(|p| p[0] == 0));
    }
}
