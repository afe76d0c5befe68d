mod capture;
mod catalog;
mod composite;
mod config;
mod dataset;
mod error;
mod geometry;
mod labels;
mod output;
mod random;
mod segmentation;
mod transform;

use anyhow::{Context, Result};
use capture::{FrameSource, ImageSequence};
use catalog::{MaskCatalog, MaskRecord};
use clap::{Parser, Subcommand, ValueEnum};
use config::{Config, ExtractorConfig, Split};
use dataset::DatasetBuilder;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use output::DatasetWriter;
use random::RngSampler;
use segmentation::{MaskExtractor, Segmenter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Seed for every random draw; omit for a fresh seed per run
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract object masks from video frames
    Mask {
        /// test: preview extraction only, generate: write masks and catalog
        #[arg(short, long, value_enum)]
        mode: MaskMode,

        /// Directory of frames decoded from the source video
        #[arg(short = 'v', long)]
        frames: PathBuf,

        /// Name of the object, used for mask file names
        #[arg(short, long)]
        object: String,

        /// Binary threshold range (low high), 0-255
        #[arg(short, long, num_args = 2, default_values_t = [100u8, 255u8])]
        thresh: Vec<u8>,

        /// Keep one mask every N frames
        #[arg(long, default_value_t = 10)]
        every: u32,

        /// Directory receiving masks (generate) or previews (test)
        #[arg(long, default_value = "masks")]
        out_dir: PathBuf,

        /// Mask catalog to append to
        #[arg(long, default_value = "bbox.txt")]
        catalog: PathBuf,
    },

    /// Build a detector dataset split with synthetic objects
    Dataset {
        #[arg(short, long, value_enum)]
        split: Split,

        /// Path to the key-value config file
        #[arg(short, long)]
        cfg: PathBuf,
    },

    /// Count target-class instances in a label directory
    Count {
        #[arg(short, long, value_enum)]
        split: Split,

        /// Path to the key-value config file
        #[arg(short, long)]
        cfg: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MaskMode {
    Test,
    Generate,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match args.command {
        Command::Mask {
            mode,
            frames,
            object,
            thresh,
            every,
            out_dir,
            catalog,
        } => {
            let config = ExtractorConfig::new(thresh[0], thresh[1], object, every, out_dir)
                .context("Invalid mask extraction settings")?;
            let mut source = ImageSequence::open(&frames).context("Failed to open frame source")?;
            let extractor = MaskExtractor::new(config);
            run_extraction(&mut source, &extractor, mode, &catalog)?;
            Ok(())
        }
        Command::Dataset { split, cfg } => {
            let config = Config::load(&cfg)?;
            run_dataset(&config, split, args.seed)
        }
        Command::Count { split, cfg } => {
            let config = Config::load(&cfg)?;
            let label_files = dataset::list_label_files(config.label_dir(split)?)?;
            let tally = dataset::count_targets(&label_files, &config.targets);
            tracing::info!("[COUNT] done counting targets in {} label files", label_files.len());
            for (class_id, count) in tally {
                tracing::info!("class {}: {}", class_id, count);
            }
            Ok(())
        }
    }
}

/// Counts reported at the end of a mask extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ExtractionSummary {
    frames: u64,
    extracted: u64,
    written: u64,
    failed: u64,
}

fn run_extraction<F: FrameSource>(
    source: &mut F,
    extractor: &MaskExtractor,
    mode: MaskMode,
    catalog_path: &Path,
) -> Result<ExtractionSummary> {
    let (width, height) = source.resolution();
    tracing::info!("Extracting masks from {}x{} frames, mode={:?}", width, height, mode);

    let preview_dir = extractor.mask_path(0).with_file_name("preview");
    if mode == MaskMode::Test {
        fs::create_dir_all(&preview_dir)
            .with_context(|| format!("Failed to create {}", preview_dir.display()))?;
    }

    let mut summary = ExtractionSummary::default();
    let mut total_extract_time = Duration::ZERO;

    loop {
        let index = summary.frames;
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                summary.frames += 1;
                summary.failed += 1;
                tracing::warn!("Frame {}: {:#}", index, e);
                continue;
            }
        };
        summary.frames += 1;

        // Test mode extracts every frame; only sampled frames are written
        let sampled = extractor.should_sample(index);
        if mode == MaskMode::Generate && !sampled {
            continue;
        }

        let extract_start = Instant::now();
        let extracted = extractor.extract(&frame);
        total_extract_time += extract_start.elapsed();

        let (masked, bbox) = match extracted {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Frame {}: {}", index, e);
                summary.failed += 1;
                continue;
            }
        };
        summary.extracted += 1;
        tracing::debug!(
            "Frame {}: box ({}, {})-({}, {})",
            index,
            bbox.left,
            bbox.top,
            bbox.right,
            bbox.bottom
        );

        match mode {
            MaskMode::Test if sampled => {
                let mut preview = masked;
                let rect = Rect::at(bbox.left as i32, bbox.top as i32).of_size(bbox.width(), bbox.height());
                draw_hollow_rect_mut(&mut preview, rect, Rgb([0, 255, 0]));
                let path = preview_dir.join(format!("frame_{index}.png"));
                preview
                    .save(&path)
                    .with_context(|| format!("Failed to write preview {}", path.display()))?;
            }
            MaskMode::Test => continue,
            MaskMode::Generate => {
                let path = extractor.persist(&masked, index)?;
                catalog::append_record(catalog_path, &MaskRecord { path, bbox })?;
            }
        }
        summary.written += 1;

        if summary.written % 30 == 0 {
            let attempts = summary.extracted + summary.failed;
            let avg_extract_ms = total_extract_time.as_secs_f64() * 1000.0 / attempts as f64;
            tracing::info!(
                "Frame {}: {} written, {} failed, extract={:.1}ms",
                index,
                summary.written,
                summary.failed,
                avg_extract_ms
            );
        }
    }

    tracing::info!(
        "Done: {} frames read, {} extracted, {} written, {} failed",
        summary.frames,
        summary.extracted,
        summary.written,
        summary.failed
    );
    Ok(summary)
}

fn run_dataset(config: &Config, split: Split, seed: Option<u64>) -> Result<()> {
    // Resolve every required input before touching the destination
    let label_dir = config.label_dir(split)?;
    let catalog = MaskCatalog::load(config.catalog_path()?)?;
    let label_files = dataset::list_label_files(label_dir)?;
    tracing::info!(
        "Building {} split from {} label files and {} masks, {} synthetic images wanted",
        split.name(),
        label_files.len(),
        catalog.len(),
        config.synthetic_quota
    );

    let output = DatasetWriter::new(&config.destination, split, &config.prefix)
        .context("Failed to prepare dataset destination")?;
    let sampler = RngSampler::from_seed(seed);

    let mut builder = DatasetBuilder::new(config, catalog, sampler, output);
    let summary = builder.build(&label_files)?;
    tracing::info!(
        "Processed {} label files into {}",
        summary.processed,
        config.destination.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct Workspace {
        root: PathBuf,
    }

    impl Workspace {
        fn new(name: &str) -> Self {
            let root = std::env::temp_dir().join(format!("maskforge-{name}-{}", std::process::id()));
            fs::remove_dir_all(&root).ok();
            fs::create_dir_all(root.join("frames")).unwrap();
            Self { root }
        }

        fn add_frame(&self, name: &str) {
            RgbImage::from_fn(40, 40, |x, y| {
                if (10..30).contains(&x) && (10..30).contains(&y) {
                    Rgb([200, 200, 200])
                } else {
                    Rgb([0, 0, 0])
                }
            })
            .save(self.root.join("frames").join(name))
            .unwrap();
        }

        fn extractor(&self, every: u32) -> MaskExtractor {
            let config = ExtractorConfig::new(100, 255, "cup", every, self.root.join("masks")).unwrap();
            MaskExtractor::new(config)
        }
    }

    impl Drop for Workspace {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.root).ok();
        }
    }

    #[test]
    fn unreadable_frame_is_skipped() {
        let ws = Workspace::new("corrupt-frame");
        ws.add_frame("frame_0000.png");
        fs::write(ws.root.join("frames").join("frame_0001.png"), b"not an image").unwrap();
        ws.add_frame("frame_0002.png");

        let mut source = ImageSequence::open(ws.root.join("frames")).unwrap();
        let catalog_path = ws.root.join("bbox.txt");
        let summary = run_extraction(&mut source, &ws.extractor(1), MaskMode::Generate, &catalog_path).unwrap();

        assert_eq!(
            summary,
            ExtractionSummary {
                frames: 3,
                extracted: 2,
                written: 2,
                failed: 1,
            }
        );
        let catalog = MaskCatalog::load(&catalog_path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(ws.root.join("masks").join("cup").join("cup_2.png").exists());
    }

    #[test]
    fn test_mode_extracts_every_frame() {
        let ws = Workspace::new("preview");
        for i in 0..3 {
            ws.add_frame(&format!("frame_{i:04}.png"));
        }

        let mut source = ImageSequence::open(ws.root.join("frames")).unwrap();
        let catalog_path = ws.root.join("bbox.txt");
        let summary = run_extraction(&mut source, &ws.extractor(2), MaskMode::Test, &catalog_path).unwrap();

        assert_eq!(summary.extracted, 3);
        assert_eq!(summary.written, 2);
        let preview_dir = ws.root.join("masks").join("cup").join("preview");
        assert!(preview_dir.join("frame_0.png").exists());
        assert!(!preview_dir.join("frame_1.png").exists());
        assert!(preview_dir.join("frame_2.png").exists());
        assert!(!catalog_path.exists());
    }
}
