use crate::catalog::MaskRecord;
use crate::error::PipelineError;
use crate::geometry::{resize_to_width, rotate_bounded};
use crate::random::Sampler;
use crate::segmentation::BoundingBox;
use anyhow::{Context, Result};
use image::{imageops, Rgb, RgbImage};

/// Rotations that keep the matte axis-aligned
pub const RIGHT_ANGLES: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

/// Draw one of the four right-angle rotations
pub fn random_rotation<S: Sampler + ?Sized>(sampler: &mut S) -> f64 {
    RIGHT_ANGLES[sampler.index(RIGHT_ANGLES.len())]
}

/// Crop a mask to its object, rotate it, and resize it to `target_width`
pub fn prepare(
    mask: &RgbImage,
    bbox: &BoundingBox,
    target_width: u32,
    rotation_degrees: f64,
) -> Result<RgbImage, PipelineError> {
    let _span = tracing::debug_span!("prepare_mask").entered();

    bbox.validate(mask.width(), mask.height())?;
    let cropped = imageops::crop_imm(mask, bbox.left, bbox.top, bbox.width(), bbox.height()).to_image();
    let rotated = rotate_bounded(&cropped, rotation_degrees);
    resize_to_width(&rotated, target_width)
}

/// Load a catalog record's mask from disk and [`prepare`] it
pub fn prepare_record(record: &MaskRecord, target_width: u32, rotation_degrees: f64) -> Result<RgbImage> {
    let mask = image::open(&record.path)
        .with_context(|| format!("Failed to read mask {}", record.path.display()))?
        .to_rgb8();
    let prepared = prepare(&mask, &record.bbox, target_width, rotation_degrees)
        .with_context(|| format!("Failed to prepare mask {}", record.path.display()))?;
    Ok(prepared)
}

/// Random brightness/contrast change applied to foreground pixels only
///
/// Each channel becomes `clip(a·v + b, 0, 255)` with `a` in `[0.5, 1.5]` and
/// `b` in `[-100, 100]`. Background pixels stay exactly zero.
pub fn jitter_color<S: Sampler + ?Sized>(image: &RgbImage, sampler: &mut S) -> RgbImage {
    let gain = sampler.uniform(0.5, 1.5);
    let bias = sampler.uniform(-100.0, 100.0);
    apply_gain_bias(image, gain, bias)
}

fn apply_gain_bias(image: &RgbImage, gain: f64, bias: f64) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        if pixel.0 == [0, 0, 0] {
            continue;
        }
        let Rgb(channels) = *pixel;
        *pixel = Rgb(channels.map(|v| (gain * v as f64 + bias).clamp(0.0, 255.0) as u8));
    }
    out
}
