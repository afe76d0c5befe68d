use crate::composite::YoloBox;
use crate::error::PipelineError;
use std::fmt;

/// Shrink factor applied per step when a box sticks out of the image
const SHRINK: f64 = 0.95;

/// Upper bound on shrink steps before a box is declared degenerate
pub const MAX_SHRINK_STEPS: usize = 500;

/// Ordered subset of the original class vocabulary kept in the output
///
/// The position of an id in the list is its class index in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetClasses {
    ids: Vec<u32>,
}

impl TargetClasses {
    /// Parse a comma-separated id list such as `3,5`
    pub fn parse(list: &str) -> Result<Self, PipelineError> {
        let ids = list
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse().map_err(|_| PipelineError::InvalidValue {
                    key: "TARGET".into(),
                    value: id.to_string(),
                })
            })
            .collect::<Result<Vec<u32>, _>>()?;

        if ids.is_empty() {
            return Err(PipelineError::InvalidValue {
                key: "TARGET".into(),
                value: list.to_string(),
            });
        }
        Ok(Self { ids })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn contains(&self, class_id: u32) -> bool {
        self.ids.contains(&class_id)
    }

    /// Output class index of an original class id
    pub fn reindex(&self, class_id: u32) -> Result<usize, PipelineError> {
        self.ids
            .iter()
            .position(|&id| id == class_id)
            .ok_or(PipelineError::UnknownClass(class_id))
    }
}

/// A label line in the detector's original vocabulary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLabel {
    pub class_id: u32,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl SourceLabel {
    /// Parse `<class> <cx> <cy> <w> <h>`
    pub fn parse(line: &str) -> Result<Self, PipelineError> {
        let malformed = |reason: &str| PipelineError::MalformedLabel {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(malformed("expected five fields"));
        }

        let class_id = fields[0].parse().map_err(|_| malformed("bad class id"))?;
        let mut values = [0.0f64; 4];
        for (slot, field) in values.iter_mut().zip(&fields[1..]) {
            *slot = field
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| malformed("bad coordinate"))?;
        }

        let [center_x, center_y, width, height] = values;
        Ok(Self {
            class_id,
            center_x,
            center_y,
            width,
            height,
        })
    }
}

/// Parse every non-blank line of a label file
pub fn parse_label_file(text: &str) -> Result<Vec<SourceLabel>, PipelineError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(SourceLabel::parse)
        .collect()
}

/// A label line in the output vocabulary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloLabel {
    pub class_index: usize,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl YoloLabel {
    pub fn from_box(class_index: usize, b: &YoloBox) -> Self {
        Self {
            class_index,
            center_x: b.center_x,
            center_y: b.center_y,
            width: b.width,
            height: b.height,
        }
    }
}

impl fmt::Display for YoloLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.class_index, self.center_x, self.center_y, self.width, self.height
        )
    }
}

/// Shrink a box about its center until it lies inside the unit square
///
/// Returns the new `(width, height)`. A box already inside is returned
/// unchanged. The center itself must be inside the unit square.
pub fn clamp_to_image(
    center_x: f64,
    center_y: f64,
    width: f64,
    height: f64,
) -> Result<(f64, f64), PipelineError> {
    let unit = 0.0..=1.0;
    if !unit.contains(&center_x) || !unit.contains(&center_y) {
        return Err(PipelineError::CenterOutOfRange { center_x, center_y });
    }

    let fits = |w: f64, h: f64| {
        center_x - w / 2.0 >= 0.0
            && center_x + w / 2.0 <= 1.0
            && center_y - h / 2.0 >= 0.0
            && center_y + h / 2.0 <= 1.0
    };

    let (mut w, mut h) = (width, height);
    for _ in 0..MAX_SHRINK_STEPS {
        if fits(w, h) {
            return Ok((w, h));
        }
        w *= SHRINK;
        h *= SHRINK;
    }

    if fits(w, h) {
        Ok((w, h))
    } else {
        Err(PipelineError::ClampDidNotConverge {
            iterations: MAX_SHRINK_STEPS,
        })
    }
}

/// What to do with one source frame
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The frame holds target objects; keep it with these labels
    Keep(Vec<YoloLabel>),
    /// The frame is a clean background for a synthetic object
    Synthesize,
    Skip,
}

/// Turns source labels into output labels and picks backgrounds
#[derive(Debug, Clone)]
pub struct Reconciler {
    targets: TargetClasses,
    excluded: Vec<u32>,
}

impl Reconciler {
    pub fn new(targets: TargetClasses, excluded: Vec<u32>) -> Self {
        Self { targets, excluded }
    }

    /// Reindex and clamp one source label of a target class
    pub fn reconcile(&self, label: &SourceLabel) -> Result<YoloLabel, PipelineError> {
        let class_index = self.targets.reindex(label.class_id)?;
        let (width, height) =
            clamp_to_image(label.center_x, label.center_y, label.width, label.height)?;
        Ok(YoloLabel {
            class_index,
            center_x: label.center_x,
            center_y: label.center_y,
            width,
            height,
        })
    }

    /// Classify a frame from its labels
    ///
    /// Frames with target objects are always kept. Other frames become
    /// synthesis backgrounds while `quota_open` holds and no excluded class
    /// is present; the rest are skipped.
    pub fn decide(&self, labels: &[SourceLabel], quota_open: bool) -> Result<Decision, PipelineError> {
        let kept = labels
            .iter()
            .filter(|l| self.targets.contains(l.class_id))
            .map(|l| self.reconcile(l))
            .collect::<Result<Vec<_>, _>>()?;

        if !kept.is_empty() {
            return Ok(Decision::Keep(kept));
        }

        let excluded = labels.iter().any(|l| self.excluded.contains(&l.class_id));
        if quota_open && !excluded {
            Ok(Decision::Synthesize)
        } else {
            Ok(Decision::Skip)
        }
    }
}
