use super::FrameSource;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Frames already decoded from a video into a directory of images,
/// replayed in filename order
pub struct ImageSequence {
    frames: Vec<PathBuf>,
    position: usize,
    width: u32,
    height: u32,
}

impl ImageSequence {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        tracing::info!("Opening frame sequence in {}", dir.display());

        let mut frames: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                let extension = path.extension()?.to_str()?.to_ascii_lowercase();
                FRAME_EXTENSIONS.contains(&extension.as_str()).then_some(path)
            })
            .collect();
        frames.sort();

        let Some(first) = frames.first() else {
            bail!("No frames found in {}", dir.display());
        };
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("Failed to read frame {}", first.display()))?;

        tracing::info!("Found {} frames at {}x{}", frames.len(), width, height);

        Ok(Self {
            frames,
            position: 0,
            width,
            height,
        })
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let frame = image::open(path)
            .with_context(|| format!("Failed to decode frame {}", path.display()))?
            .into_rgb8();
        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn replays_frames_in_name_order() {
        let dir = std::env::temp_dir().join(format!("maskforge-frames-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for (i, shade) in [(2u8, 20u8), (0, 0), (1, 10)] {
            RgbImage::from_pixel(6, 4, Rgb([shade; 3]))
                .save(dir.join(format!("frame_{i:04}.png")))
                .unwrap();
        }
        fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequence::open(&dir).unwrap();
        assert_eq!(source.resolution(), (6, 4));

        let shades: Vec<u8> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|f| f.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![0, 10, 20]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = std::env::temp_dir().join(format!("maskforge-noframes-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        assert!(ImageSequence::open(&dir).is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
