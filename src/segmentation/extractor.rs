use super::preprocess::Preprocessor;
use super::types::{BoundingBox, Segmenter};
use crate::config::ExtractorConfig;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// Threshold and contour based foreground extractor
///
/// The largest outer contour of the binarized frame is taken as the object.
/// When several contours share the maximum area the first one reported by
/// the contour tracer wins; that order follows a raster scan of the frame
/// and carries no further meaning.
pub struct MaskExtractor {
    config: ExtractorConfig,
    preprocessor: Preprocessor,
}

impl MaskExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        tracing::info!(
            "Mask extractor for {:?}, threshold {}-{}, one mask every {} frames",
            config.object,
            config.low,
            config.high,
            config.every
        );
        let preprocessor = Preprocessor::new(config.low, config.high);
        Self {
            config,
            preprocessor,
        }
    }

    /// Whether a frame is one of the decimated samples that get persisted
    pub fn should_sample(&self, frame_index: u64) -> bool {
        frame_index % self.config.every as u64 == 0
    }

    /// Deterministic location of the mask for a frame
    pub fn mask_path(&self, frame_index: u64) -> PathBuf {
        let sample = frame_index / self.config.every as u64;
        self.config
            .out_dir
            .join(&self.config.object)
            .join(format!("{}_{}.png", self.config.object, sample))
    }

    /// Write a masked frame as PNG so the zero background survives storage
    pub fn persist(&self, masked: &RgbImage, frame_index: u64) -> Result<PathBuf> {
        let path = self.mask_path(frame_index);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create mask directory {}", dir.display()))?;
        }
        masked
            .save(&path)
            .with_context(|| format!("Failed to write mask {}", path.display()))?;
        tracing::debug!("Wrote mask {}", path.display());
        Ok(path)
    }
}

impl Segmenter for MaskExtractor {
    fn extract(&self, frame: &RgbImage) -> Result<(RgbImage, BoundingBox), PipelineError> {
        let _span = tracing::debug_span!("extract").entered();

        let binary = self.preprocessor.binarize(frame);
        let contours = find_contours::<i32>(&binary);

        let largest = largest_outer_contour(&contours).ok_or(PipelineError::NoForeground)?;
        let bbox = BoundingBox::from_extremes(&largest.points).ok_or(PipelineError::NoForeground)?;
        bbox.validate(frame.width(), frame.height())?;
        let seed = largest.points[0];
        let fill = fill_component(&binary, (seed.x as u32, seed.y as u32), &bbox);

        let masked = RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
            if fill.get_pixel(x, y)[0] != 0 {
                *frame.get_pixel(x, y)
            } else {
                Rgb([0, 0, 0])
            }
        });

        tracing::debug!(
            "Foreground box ({}, {})-({}, {}) from {} contours",
            bbox.left,
            bbox.top,
            bbox.right,
            bbox.bottom,
            contours.len()
        );

        Ok((masked, bbox))
    }
}

/// Outer, top-level contour with the largest enclosed area; first wins ties
fn largest_outer_contour(contours: &[Contour<i32>]) -> Option<&Contour<i32>> {
    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| !c.points.is_empty())
    {
        let area = contour_area(contour);
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((contour, area)),
        }
    }
    best.map(|(contour, _)| contour)
}

/// Polygon area of a closed contour (shoelace formula)
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    (twice_area as f64 / 2.0).abs()
}

/// Filled mask of the component containing `seed`, holes included
fn fill_component(binary: &GrayImage, seed: (u32, u32), bbox: &BoundingBox) -> GrayImage {
    let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));
    let target = labels.get_pixel(seed.0, seed.1)[0];

    let window_width = bbox.right - bbox.left + 1;
    let window_height = bbox.bottom - bbox.top + 1;

    // Everything in the window that is not the object, split into 4-connected gaps
    let gaps = GrayImage::from_fn(window_width, window_height, |x, y| {
        if labels.get_pixel(bbox.left + x, bbox.top + y)[0] == target {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    let gap_labels = connected_components(&gaps, Connectivity::Four, Luma([0u8]));

    // Gaps reaching the window edge are open to the outside; the rest are holes
    let mut exterior = HashSet::new();
    for x in 0..window_width {
        exterior.insert(gap_labels.get_pixel(x, 0)[0]);
        exterior.insert(gap_labels.get_pixel(x, window_height - 1)[0]);
    }
    for y in 0..window_height {
        exterior.insert(gap_labels.get_pixel(0, y)[0]);
        exterior.insert(gap_labels.get_pixel(window_width - 1, y)[0]);
    }
    exterior.remove(&0);

    let mut fill = GrayImage::new(binary.width(), binary.height());
    for (x, y, gap) in gap_labels.enumerate_pixels() {
        if !exterior.contains(&gap[0]) {
            fill.put_pixel(bbox.left + x, bbox.top + y, Luma([255]));
        }
    }
    fill
}
