//! Mask catalog: the append-only list of extracted masks.
//!
//! Each line reads `<mask path>,(<left>, <top>),(<right>, <bottom>)`.
//! [`format_record`] and [`parse_record`] are the only code that knows this
//! shape.

use crate::error::PipelineError;
use crate::random::Sampler;
use crate::segmentation::BoundingBox;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Version of the textual record layout written by [`format_record`]
pub const FORMAT_VERSION: u32 = 1;

/// One extracted mask and the box of its object in mask coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskRecord {
    pub path: PathBuf,
    pub bbox: BoundingBox,
}

pub fn format_record(record: &MaskRecord) -> String {
    let b = &record.bbox;
    format!(
        "{},({}, {}),({}, {})",
        record.path.display(),
        b.left,
        b.top,
        b.right,
        b.bottom
    )
}

/// Parse one catalog line. The four coordinates are taken from the right so
/// mask paths may themselves contain commas.
pub fn parse_record(line: &str, line_number: usize) -> Result<MaskRecord, PipelineError> {
    let malformed = |reason: &str| PipelineError::MalformedCatalog {
        line_number,
        reason: reason.to_string(),
    };

    let mut fields: Vec<&str> = line.trim_end().rsplitn(5, ',').collect();
    if fields.len() != 5 {
        return Err(malformed("expected a path and two coordinate pairs"));
    }
    fields.reverse();

    let path = fields[0].trim();
    if path.is_empty() {
        return Err(malformed("empty mask path"));
    }

    let mut coords = [0u32; 4];
    for (slot, token) in coords.iter_mut().zip(&fields[1..]) {
        let token = token.trim().trim_matches(|c| c == '(' || c == ')').trim();
        *slot = token
            .parse()
            .map_err(|_| malformed(&format!("bad coordinate {token:?}")))?;
    }

    let [left, top, right, bottom] = coords;
    Ok(MaskRecord {
        path: PathBuf::from(path),
        bbox: BoundingBox::new(left, top, right, bottom),
    })
}

/// Append one record to the catalog, creating the file if needed
pub fn append_record<P: AsRef<Path>>(catalog: P, record: &MaskRecord) -> Result<()> {
    let catalog = catalog.as_ref();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(catalog)
        .with_context(|| format!("Failed to open mask catalog {}", catalog.display()))?;
    writeln!(file, "{}", format_record(record))
        .with_context(|| format!("Failed to append to mask catalog {}", catalog.display()))?;
    Ok(())
}

/// The full catalog, read once before dataset construction
#[derive(Debug, Clone)]
pub struct MaskCatalog {
    records: Vec<MaskRecord>,
}

impl MaskCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mask catalog {}", path.display()))?;

        let records = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| parse_record(line, i + 1))
            .collect::<Result<Vec<_>, _>>()?;

        if records.is_empty() {
            return Err(PipelineError::EmptyCatalog(path.to_path_buf()).into());
        }

        tracing::info!(
            "Loaded {} mask records from {} (format v{})",
            records.len(),
            path.display(),
            FORMAT_VERSION
        );
        Ok(Self { records })
    }

    #[cfg(test)]
    pub fn from_records(records: Vec<MaskRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Pick one record uniformly at random
    pub fn choose<S: Sampler + ?Sized>(&self, sampler: &mut S) -> &MaskRecord {
        &self.records[sampler.index(self.records.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::scripted::Scripted;

    fn record(path: &str, l: u32, t: u32, r: u32, b: u32) -> MaskRecord {
        MaskRecord {
            path: PathBuf::from(path),
            bbox: BoundingBox::new(l, t, r, b),
        }
    }

    #[test]
    fn formats_the_catalog_line_shape() {
        let line = format_record(&record("masks/hand/hand_3.png", 21, 31, 58, 68));
        assert_eq!(line, "masks/hand/hand_3.png,(21, 31),(58, 68)");
    }

    #[test]
    fn written_lines_parse_back() {
        let original = record("masks/hand/hand_3.png", 21, 31, 58, 68);
        let parsed = parse_record(&format_record(&original), 1).unwrap();
        assert_eq!(parsed, original);

        let with_comma = record("odd,name/mask_0.png", 0, 1, 2, 3);
        assert_eq!(parse_record(&format_record(&with_comma), 1).unwrap(), with_comma);
    }

    #[test]
    fn parses_compact_coordinates() {
        let parsed = parse_record("m.png,(1,2),(3,4)\n", 1).unwrap();
        assert_eq!(parsed, record("m.png", 1, 2, 3, 4));
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in ["m.png,(1, 2)", "m.png,(a, 2),(3, 4)", ",(1, 2),(3, 4)", "m.png,(-1, 2),(3, 4)"] {
            assert!(
                matches!(
                    parse_record(line, 4),
                    Err(PipelineError::MalformedCatalog { line_number: 4, .. })
                ),
                "{line}"
            );
        }
    }

    #[test]
    fn appended_records_load_in_order() {
        let path = std::env::temp_dir().join(format!("maskforge-catalog-{}.txt", std::process::id()));
        fs::remove_file(&path).ok();

        let records = vec![record("a.png", 1, 2, 3, 4), record("b.png", 5, 6, 7, 8)];
        for r in &records {
            append_record(&path, r).unwrap();
        }

        let catalog = MaskCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        let mut sampler = Scripted::new(&[], &[1, 0]);
        assert_eq!(catalog.choose(&mut sampler), &records[1]);
        assert_eq!(catalog.choose(&mut sampler), &records[0]);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let path = std::env::temp_dir().join(format!("maskforge-empty-{}.txt", std::process::id()));
        fs::write(&path, "\n").unwrap();

        let err = MaskCatalog::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EmptyCatalog(_))
        ));

        fs::remove_file(&path).ok();
    }
}
