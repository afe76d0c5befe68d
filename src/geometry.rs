use crate::error::PipelineError;
use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// Rotate an image clockwise about its center, growing the canvas so no
/// content is cropped.
///
/// Right angles are exact pixel permutations. Any other angle is resampled
/// with nearest-neighbour interpolation onto a canvas of
/// `h·|sin θ| + w·|cos θ|` by `h·|cos θ| + w·|sin θ|`, with the uncovered
/// corners left at zero.
pub fn rotate_bounded(image: &RgbImage, angle_degrees: f64) -> RgbImage {
    let angle = angle_degrees.rem_euclid(360.0);
    let quarter = (angle / 90.0).round();
    if (angle - quarter * 90.0).abs() < 1e-9 {
        return match quarter as u32 % 4 {
            0 => image.clone(),
            1 => imageops::rotate90(image),
            2 => imageops::rotate180(image),
            _ => imageops::rotate270(image),
        };
    }

    let (width, height) = image.dimensions();
    let theta = angle.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let new_width = ((height as f64 * sin + width as f64 * cos) as u32).max(1);
    let new_height = ((height as f64 * cos + width as f64 * sin) as u32).max(1);

    let projection = Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0)
        .and_then(Projection::rotate(theta as f32))
        .and_then(Projection::translate(
            new_width as f32 / 2.0,
            new_height as f32 / 2.0,
        ));

    let mut rotated = RgbImage::new(new_width, new_height);
    warp_into(
        image,
        &projection,
        Interpolation::Nearest,
        Rgb([0, 0, 0]),
        &mut rotated,
    );
    rotated
}

/// Resize to `target_width`, keeping the aspect ratio.
///
/// Height is `round(target_width · h / w)`, never less than one pixel.
pub fn resize_to_width(image: &RgbImage, target_width: u32) -> Result<RgbImage, PipelineError> {
    let (width, height) = image.dimensions();
    if width == 0 || target_width == 0 {
        return Err(PipelineError::ZeroWidth);
    }

    let target_height =
        ((target_width as f64 * (height as f64 / width as f64)).round() as u32).max(1);

    let resized = if (width, height) != (target_width, target_height) {
        imageops::resize(
            image,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        )
    } else {
        image.clone()
    };

    Ok(resized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foreground(image: &RgbImage) -> usize {
        image.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    fn blob(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if x >= 2 && y >= 1 && x < width - 1 && y < height - 3 {
                Rgb([200, 120, 40])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn right_angle_rotations_never_crop() {
        let image = blob(40, 20);
        let expected = foreground(&image);

        for angle in [0.0, 90.0, 180.0, 270.0] {
            let rotated = rotate_bounded(&image, angle);
            let quarter_turn = angle == 90.0 || angle == 270.0;
            let dims = if quarter_turn { (20, 40) } else { (40, 20) };
            assert_eq!(rotated.dimensions(), dims, "angle {angle}");
            assert_eq!(foreground(&rotated), expected, "angle {angle}");
        }
    }

    #[test]
    fn positive_angles_rotate_clockwise() {
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(0, 0, Rgb([9, 9, 9]));

        // top-left corner ends up top-right after a clockwise quarter turn
        let rotated = rotate_bounded(&image, 90.0);
        assert_eq!(rotated.get_pixel(1, 0).0, [9, 9, 9]);
        assert_eq!(rotate_bounded(&image, -270.0), rotated);
    }

    #[test]
    fn oblique_rotation_expands_the_canvas() {
        let image = RgbImage::from_pixel(40, 20, Rgb([50, 60, 70]));
        let rotated = rotate_bounded(&image, 45.0);

        let s = std::f64::consts::FRAC_1_SQRT_2;
        let side = (20.0 * s + 40.0 * s) as u32;
        assert_eq!(rotated.dimensions(), (side, side));
        assert_eq!(rotated.get_pixel(side / 2, side / 2).0, [50, 60, 70]);
        assert_eq!(rotated.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn resize_keeps_aspect_ratio() {
        let image = blob(40, 30);
        let resized = resize_to_width(&image, 25).unwrap();
        assert_eq!(resized.dimensions(), (25, 19));

        let wide = blob(300, 7);
        let resized = resize_to_width(&wide, 100).unwrap();
        assert_eq!(resized.dimensions(), (100, 2));
    }

    #[test]
    fn resize_to_same_width_is_identity() {
        let image = blob(16, 12);
        assert_eq!(resize_to_width(&image, 16).unwrap(), image);
    }

    #[test]
    fn resize_rejects_zero_width() {
        let empty = RgbImage::new(0, 10);
        assert!(matches!(
            resize_to_width(&empty, 10),
            Err(PipelineError::ZeroWidth)
        ));
    }
}
