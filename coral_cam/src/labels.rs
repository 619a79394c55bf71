//! Label tables of the classification and detection models.
//!
//! Both tables are read once at startup and shared read-only afterwards.
use std::{borrow::Cow, collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};

/// Read-only class names.
#[derive(Debug, Default)]
pub struct LabelTables {
    detection: HashMap<usize, String>,
    classification: Vec<String>,
}

impl LabelTables {
    pub fn new(detection: HashMap<usize, String>, classification: Vec<String>) -> Self {
        Self {
            detection,
            classification,
        }
    }

    /// Read both label files.
    pub fn load(detection_path: &Path, classification_path: &Path) -> Result<Self> {
        let detection = read_detection_labels(detection_path)?;
        let classification = read_classification_labels(classification_path)?;
        log::info!(
            "Loaded {} detection and {} classification labels",
            detection.len(),
            classification.len()
        );

        Ok(Self::new(detection, classification))
    }

    /// Name of a detection class, the index itself if the class is unknown.
    pub fn detection_class(&self, index: usize) -> Cow<'_, str> {
        match self.detection.get(&index) {
            Some(label) => Cow::Borrowed(label),
            None => Cow::Owned(index.to_string()),
        }
    }

    /// Name of a classification class, the index itself if the class is unknown.
    pub fn classification_class(&self, index: usize) -> Cow<'_, str> {
        match self.classification.get(index) {
            Some(label) => Cow::Borrowed(label),
            None => Cow::Owned(index.to_string()),
        }
    }
}

pub fn read_detection_labels(path: &Path) -> Result<HashMap<usize, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read detection labels {}", path.display()))?;
    Ok(parse_detection_labels(&content))
}

pub fn read_classification_labels(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read classification labels {}", path.display()))?;
    Ok(parse_classification_labels(&content))
}

/// Parse a detection label file.
///
/// Files either list one label per line, or `<index> <label>` pairs. The format is decided by
/// the first token of the first line.
pub fn parse_detection_labels(content: &str) -> HashMap<usize, String> {
    let mut lines = content.lines().peekable();
    let indexed = match lines.peek() {
        None => return HashMap::new(),
        Some(first) => first
            .split(' ')
            .next()
            .map(|token| !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false),
    };

    if indexed {
        lines
            .filter_map(|line| {
                let (index, label) = line.split_once(' ')?;
                Some((index.parse().ok()?, label.trim().to_owned()))
            })
            .collect()
    } else {
        lines
            .enumerate()
            .map(|(index, line)| (index, line.trim().to_owned()))
            .collect()
    }
}

pub fn parse_classification_labels(content: &str) -> Vec<String> {
    content.lines().map(|line| line.trim().to_owned()).collect()
}
