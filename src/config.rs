use crate::error::PipelineError;
use crate::labels::TargetClasses;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of synthetic images per dataset split
pub const DEFAULT_SYNTHETIC_QUOTA: usize = 6000;

/// Dataset split being built or counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

/// Dataset construction settings, loaded once from a `KEY = value` file
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: TargetClasses,
    pub destination: PathBuf,
    pub train_labels: Option<PathBuf>,
    pub val_labels: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub synthetic_quota: usize,
    /// Original class ids whose presence disqualifies a frame as a background
    pub excluded: Vec<u32>,
    pub prefix: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        let mut values = parse_pairs(text)?;

        let targets = values
            .remove("TARGET")
            .ok_or(PipelineError::MissingKey("TARGET"))
            .and_then(|v| TargetClasses::parse(&v))?;
        let destination = values
            .remove("DET")
            .map(PathBuf::from)
            .ok_or(PipelineError::MissingKey("DET"))?;
        let synthetic_quota = match values.remove("SIZE") {
            Some(v) => parse_number("SIZE", &v)?,
            None => DEFAULT_SYNTHETIC_QUOTA,
        };
        let excluded = match values.remove("EXCLUDE") {
            Some(v) if v.is_empty() => Vec::new(),
            Some(v) => v
                .split(',')
                .map(|id| parse_number("EXCLUDE", id.trim()))
                .collect::<Result<_, _>>()?,
            None => vec![0],
        };

        let config = Self {
            targets,
            destination,
            train_labels: values.remove("TRAIN_LABEL").map(PathBuf::from),
            val_labels: values.remove("VAL_LABEL").map(PathBuf::from),
            catalog: values.remove("BBOX_TXT").map(PathBuf::from),
            synthetic_quota,
            excluded,
            prefix: values.remove("PREFIX").unwrap_or_else(|| "img".to_string()),
        };

        for key in values.keys() {
            tracing::debug!("Ignoring unknown config key {}", key);
        }

        Ok(config)
    }

    /// Label source directory for a split
    pub fn label_dir(&self, split: Split) -> Result<&Path, PipelineError> {
        match split {
            Split::Train => self
                .train_labels
                .as_deref()
                .ok_or(PipelineError::MissingKey("TRAIN_LABEL")),
            Split::Test => self
                .val_labels
                .as_deref()
                .ok_or(PipelineError::MissingKey("VAL_LABEL")),
        }
    }

    pub fn catalog_path(&self) -> Result<&Path, PipelineError> {
        self.catalog
            .as_deref()
            .ok_or(PipelineError::MissingKey("BBOX_TXT"))
    }

    /// Class index given to synthesized objects, one past the target classes
    pub fn synthetic_class(&self) -> usize {
        self.targets.len()
    }
}

fn parse_pairs(text: &str) -> Result<HashMap<String, String>, PipelineError> {
    let mut values = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| PipelineError::InvalidValue {
                key: line.to_string(),
                value: String::new(),
            })?;
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        values.insert(key.trim().to_string(), value.to_string());
    }
    Ok(values)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, PipelineError> {
    value.parse().map_err(|_| PipelineError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Settings for extracting masks from video frames
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub low: u8,
    pub high: u8,
    pub object: String,
    /// Persist one mask every `every` frames
    pub every: u32,
    pub out_dir: PathBuf,
}

impl ExtractorConfig {
    pub fn new(
        low: u8,
        high: u8,
        object: impl Into<String>,
        every: u32,
        out_dir: impl Into<PathBuf>,
    ) -> Result<Self, PipelineError> {
        let object = object.into();
        if low >= high {
            return Err(PipelineError::InvalidValue {
                key: "thresh".into(),
                value: format!("{low} {high}"),
            });
        }
        if every == 0 {
            return Err(PipelineError::InvalidValue {
                key: "every".into(),
                value: "0".into(),
            });
        }
        if object.trim().is_empty() || object.contains(['/', '\\', ',']) {
            return Err(PipelineError::InvalidValue {
                key: "object".into(),
                value: object,
            });
        }

        Ok(Self {
            low,
            high,
            object,
            every,
            out_dir: out_dir.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# dataset settings
TARGET = 3,5
DET = /data/out/
TRAIN_LABEL = /data/coco/labels/train2014/
BBOX_TXT = \"bbox.txt\"
SIZE = 250
";

    #[test]
    fn parses_known_keys_with_defaults() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.destination, PathBuf::from("/data/out/"));
        assert_eq!(config.catalog_path().unwrap(), Path::new("bbox.txt"));
        assert_eq!(config.synthetic_quota, 250);
        assert_eq!(config.excluded, vec![0]);
        assert_eq!(config.prefix, "img");
        assert_eq!(config.synthetic_class(), 2);
        assert!(config.label_dir(Split::Train).is_ok());
    }

    #[test]
    fn missing_required_keys_fail_fast() {
        let err = Config::parse("DET = out\n").unwrap_err();
        assert!(matches!(err, PipelineError::MissingKey("TARGET")));

        let config = Config::parse("TARGET = 1\nDET = out\n").unwrap();
        assert!(matches!(
            config.label_dir(Split::Test),
            Err(PipelineError::MissingKey("VAL_LABEL"))
        ));
        assert!(config.catalog_path().is_err());
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(Config::parse("TARGET = 1\nDET = out\nSIZE = many\n").is_err());
        assert!(Config::parse("TARGET = 1,x\nDET = out\n").is_err());
        assert!(Config::parse("TARGET 1\n").is_err());
    }

    #[test]
    fn empty_exclude_disables_filtering() {
        let config = Config::parse("TARGET = 1\nDET = out\nEXCLUDE =\n").unwrap();
        assert!(config.excluded.is_empty());
    }

    #[test]
    fn extractor_config_validates_at_construction() {
        assert!(ExtractorConfig::new(100, 255, "hand", 10, "masks").is_ok());
        assert!(ExtractorConfig::new(200, 100, "hand", 10, "masks").is_err());
        assert!(ExtractorConfig::new(100, 255, "hand", 0, "masks").is_err());
        assert!(ExtractorConfig::new(100, 255, " ", 10, "masks").is_err());
    }
}
