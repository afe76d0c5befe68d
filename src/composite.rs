use crate::error::PipelineError;
use crate::random::Sampler;
use image::{imageops, DynamicImage, RgbImage};

/// Largest fraction of the background a placement offset is drawn from
const MAX_OFFSET_FRACTION: f64 = 0.9;

/// Object box in detector geometry: center and extent, as fractions of the
/// image size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloBox {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Top-left corner of a pasted mask in background pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// Accept a decoded background only if it carries color channels
pub fn background_from_dynamic(image: DynamicImage) -> Result<RgbImage, PipelineError> {
    let channels = image.color().channel_count();
    if channels < 3 {
        return Err(PipelineError::NotColor { channels });
    }
    Ok(image.into_rgb8())
}

/// Halve a mask taller than the background, then require that it fits
pub fn fit_to_background(mask: RgbImage, background: (u32, u32)) -> Result<RgbImage, PipelineError> {
    let (bg_width, bg_height) = background;
    let mask = if mask.height() > bg_height {
        let (width, height) = ((mask.width() / 2).max(1), (mask.height() / 2).max(1));
        tracing::debug!(
            "Halving {}x{} mask for {}x{} background",
            mask.width(),
            mask.height(),
            bg_width,
            bg_height
        );
        imageops::resize(&mask, width, height, imageops::FilterType::Triangle)
    } else {
        mask
    };

    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 || width > bg_width || height > bg_height {
        return Err(PipelineError::MaskDoesNotFit {
            mask_width: width,
            mask_height: height,
            width: bg_width,
            height: bg_height,
        });
    }
    Ok(mask)
}

/// Draw a top-left corner that keeps the whole mask inside the background
///
/// The vertical offset is drawn before the horizontal one. Both dimensions
/// of `mask` must not exceed those of `background`.
pub fn choose_placement<S: Sampler + ?Sized>(
    background: (u32, u32),
    mask: (u32, u32),
    sampler: &mut S,
) -> Placement {
    let y = draw_offset(background.1, mask.1, sampler);
    let x = draw_offset(background.0, mask.0, sampler);
    Placement { x, y }
}

fn draw_offset<S: Sampler + ?Sized>(extent: u32, size: u32, sampler: &mut S) -> u32 {
    let room = extent.saturating_sub(size);
    let upper = room as f64 / extent as f64;
    let fraction = (sampler.fraction() * MAX_OFFSET_FRACTION).min(upper).max(0.0);
    ((fraction * extent as f64) as u32).min(room)
}

/// Paste the non-zero pixels of `mask` onto a copy of `background`
///
/// The mask must fit at `placement`.
pub fn composite_at(background: &RgbImage, mask: &RgbImage, placement: Placement) -> (RgbImage, YoloBox) {
    let mut composite = background.clone();
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0 != [0, 0, 0] {
            composite.put_pixel(placement.x + x, placement.y + y, *pixel);
        }
    }

    let (bg_width, bg_height) = (background.width() as f64, background.height() as f64);
    let (mask_width, mask_height) = (mask.width() as f64, mask.height() as f64);
    let yolo = YoloBox {
        center_x: (2.0 * placement.x as f64 + mask_width) / (2.0 * bg_width),
        center_y: (2.0 * placement.y as f64 + mask_height) / (2.0 * bg_height),
        width: mask_width / bg_width,
        height: mask_height / bg_height,
    };

    (composite, yolo)
}

/// Insert a prepared mask at a random in-bounds position
pub fn place<S: Sampler + ?Sized>(
    background: &RgbImage,
    mask: RgbImage,
    sampler: &mut S,
) -> Result<(RgbImage, YoloBox), PipelineError> {
    let _span = tracing::debug_span!("place").entered();

    let mask = fit_to_background(mask, background.dimensions())?;
    let placement = choose_placement(background.dimensions(), mask.dimensions(), sampler);
    tracing::debug!(
        "Placing {}x{} mask at ({}, {})",
        mask.width(),
        mask.height(),
        placement.x,
        placement.y
    );
    Ok(composite_at(background, &mask, placement))
}
