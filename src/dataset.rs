use crate::catalog::MaskCatalog;
use crate::composite::{background_from_dynamic, place};
use crate::config::Config;
use crate::error::PipelineError;
use crate::labels::{parse_label_file, Decision, Reconciler, TargetClasses, YoloLabel};
use crate::output::OutputSink;
use crate::random::Sampler;
use crate::transform::{jitter_color, prepare_record, random_rotation};
use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Progress is reported every this many label files
const PROGRESS_EVERY: usize = 100;

/// Synthetic masks span this fraction range of the background width
const MIN_WIDTH_RATIO: f64 = 0.1;
const MAX_WIDTH_RATIO: f64 = 0.5;

/// Counts reported at the end of a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub processed: usize,
    pub kept: usize,
    pub synthesized: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Kept,
    Synthesized,
    Skipped,
}

/// Builds one dataset split from source labels and the mask catalog
pub struct DatasetBuilder<S, O> {
    reconciler: Reconciler,
    catalog: MaskCatalog,
    quota: usize,
    synthetic_class: usize,
    sampler: S,
    output: O,
}

impl<S: Sampler, O: OutputSink> DatasetBuilder<S, O> {
    pub fn new(config: &Config, catalog: MaskCatalog, sampler: S, output: O) -> Self {
        Self {
            reconciler: Reconciler::new(config.targets.clone(), config.excluded.clone()),
            catalog,
            quota: config.synthetic_quota,
            synthetic_class: config.synthetic_class(),
            sampler,
            output,
        }
    }

    /// Process every label file in order
    ///
    /// A failing item is logged and skipped; configuration and catalog
    /// errors abort the build.
    pub fn build(&mut self, label_files: &[PathBuf]) -> Result<BuildSummary> {
        let mut summary = BuildSummary::default();

        for (index, label_path) in label_files.iter().enumerate() {
            let quota_open = summary.synthesized < self.quota;
            match self.process(index, label_path, quota_open) {
                Ok(Outcome::Kept) => summary.kept += 1,
                Ok(Outcome::Synthesized) => summary.synthesized += 1,
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    let item_local = e
                        .downcast_ref::<PipelineError>()
                        .map_or(true, PipelineError::is_item_local);
                    if !item_local {
                        return Err(e);
                    }
                    tracing::warn!("Skipping {}: {:#}", label_path.display(), e);
                    summary.failed += 1;
                }
            }
            summary.processed += 1;

            if index % PROGRESS_EVERY == 0 {
                tracing::info!("{} of {} processed", index, label_files.len());
            }
        }

        tracing::info!(
            "Done: {} kept, {} synthesized, {} skipped, {} failed",
            summary.kept,
            summary.synthesized,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    fn process(&mut self, index: usize, label_path: &Path, quota_open: bool) -> Result<Outcome> {
        let text = fs::read_to_string(label_path)
            .with_context(|| format!("Failed to read labels {}", label_path.display()))?;
        let labels = parse_label_file(&text)?;

        match self.reconciler.decide(&labels, quota_open)? {
            Decision::Keep(kept) => {
                let image = load_color_image(label_path)?;
                self.output.write_sample(index, &image, &kept)?;
                Ok(Outcome::Kept)
            }
            Decision::Synthesize => {
                let background = load_color_image(label_path)?;
                let (composite, label) = self.synthesize(&background)?;
                self.output.write_sample(index, &composite, &[label])?;
                Ok(Outcome::Synthesized)
            }
            Decision::Skip => Ok(Outcome::Skipped),
        }
    }

    /// Paste a random, transformed catalog mask onto `background`
    pub fn synthesize(&mut self, background: &RgbImage) -> Result<(RgbImage, YoloLabel)> {
        let record = self.catalog.choose(&mut self.sampler).clone();

        let ratio = (self.sampler.fraction() * MAX_WIDTH_RATIO).clamp(MIN_WIDTH_RATIO, MAX_WIDTH_RATIO);
        let target_width = ((ratio * background.width() as f64) as u32).max(1);
        let rotation = random_rotation(&mut self.sampler);

        let prepared = prepare_record(&record, target_width, rotation)?;
        let jittered = jitter_color(&prepared, &mut self.sampler);
        let (composite, yolo) = place(background, jittered, &mut self.sampler)
            .with_context(|| format!("Failed to place mask {}", record.path.display()))?;

        Ok((composite, YoloLabel::from_box(self.synthetic_class, &yolo)))
    }

    #[cfg(test)]
    pub fn into_output(self) -> O {
        self.output
    }
}

/// Image that belongs to a label file: the last `labels` directory becomes
/// `images` and the extension becomes `.jpg`
pub fn image_path_for_label(label_path: &Path) -> Option<PathBuf> {
    let components: Vec<_> = label_path.components().collect();
    let labels_at = components.iter().rposition(|c| c.as_os_str() == "labels")?;

    let mut path = PathBuf::new();
    for (i, component) in components.iter().enumerate() {
        if i == labels_at {
            path.push("images");
        } else {
            path.push(component.as_os_str());
        }
    }
    path.set_extension("jpg");
    Some(path)
}

fn load_color_image(label_path: &Path) -> Result<RgbImage> {
    let path = image_path_for_label(label_path)
        .ok_or_else(|| anyhow!("No images directory for {}", label_path.display()))?;
    let decoded = image::open(&path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let image = background_from_dynamic(decoded).with_context(|| format!("Unusable image {}", path.display()))?;
    Ok(image)
}

/// All `.txt` files of a label directory, sorted by name
pub fn list_label_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read label directory {}", dir.display()))?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            (path.extension()? == "txt").then_some(path)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Tally target-class instances across label files
pub fn count_targets(label_files: &[PathBuf], targets: &TargetClasses) -> BTreeMap<u32, usize> {
    let mut tally: BTreeMap<u32, usize> = targets.ids().iter().map(|&id| (id, 0)).collect();

    for (index, path) in label_files.iter().enumerate() {
        let labels = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|text| Ok(parse_label_file(&text)?));
        match labels {
            Ok(labels) => {
                for label in labels {
                    if let Some(count) = tally.get_mut(&label.class_id) {
                        *count += 1;
                    }
                }
            }
            Err(e) => tracing::warn!("Skipping {}: {:#}", path.display(), e),
        }

        if index % PROGRESS_EVERY == 0 {
            tracing::info!("[COUNT] {} of {} processed", index, label_files.len());
        }
    }

    tally
}
