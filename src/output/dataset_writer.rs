use super::OutputSink;
use crate::config::Split;
use crate::labels::YoloLabel;
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes a detector dataset split to disk
///
/// Layout under the destination root:
/// `images/<split>/<prefix><i>.jpg`, `labels/<split>/<prefix><i>.txt`, and
/// the image list `<split>.txt`.
pub struct DatasetWriter {
    image_dir: PathBuf,
    label_dir: PathBuf,
    prefix: String,
    list: File,
}

impl DatasetWriter {
    pub fn new<P: AsRef<Path>>(destination: P, split: Split, prefix: &str) -> Result<Self> {
        let destination = destination.as_ref();
        tracing::info!(
            "Writing {} split to {}",
            split.name(),
            destination.display()
        );

        for kind in ["images", "labels"] {
            for name in [Split::Train.name(), Split::Test.name()] {
                let dir = destination.join(kind).join(name);
                fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        let list_path = destination.join(format!("{}.txt", split.name()));
        let list = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&list_path)
            .with_context(|| format!("Failed to open image list {}", list_path.display()))?;

        Ok(Self {
            image_dir: destination.join("images").join(split.name()),
            label_dir: destination.join("labels").join(split.name()),
            prefix: prefix.to_string(),
            list,
        })
    }
}

impl OutputSink for DatasetWriter {
    fn write_sample(&mut self, index: usize, image: &RgbImage, labels: &[YoloLabel]) -> Result<PathBuf> {
        let image_path = self.image_dir.join(format!("{}{}.jpg", self.prefix, index));
        let label_path = self.label_dir.join(format!("{}{}.txt", self.prefix, index));

        image
            .save(&image_path)
            .with_context(|| format!("Failed to write image {}", image_path.display()))?;

        let mut text = String::new();
        for label in labels {
            text.push_str(&label.to_string());
            text.push('\n');
        }
        fs::write(&label_path, text)
            .with_context(|| format!("Failed to write labels {}", label_path.display()))?;

        writeln!(self.list, "{}", image_path.display())
            .context("Failed to append to image list")?;

        Ok(image_path)
    }
}
