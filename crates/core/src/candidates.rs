use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::report::Reporter;

pub const MAX_CANDIDATES: usize = 50;
/// Tags must be used more often than this to become candidates.
pub const MIN_TAG_COUNT: i64 = 100;

pub const DEFAULT_CANDIDATE_TAGS: [&str; 20] = [
    "cat", "dog", "car", "tree", "sky", "building", "person", "landscape", "night", "day",
    "beach", "forest", "city", "food", "animal", "water", "mountain", "road", "cloud", "sun",
];

const REQUIRED_COLUMNS: [&str; 4] = ["tag_id", "name", "category", "count"];

/// Ordered, deduplicated, at most [`MAX_CANDIDATES`] labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateTagSet(Vec<String>);

impl CandidateTagSet {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let tags = tags
            .into_iter()
            .map(|t| {
                let t: String = t.into();
                t.trim().to_string()
            })
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .take(MAX_CANDIDATES)
            .collect();
        Self(tags)
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_CANDIDATE_TAGS)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("{0} not found")]
    NotFound(PathBuf),
    #[error("missing required columns: {0:?}")]
    MissingColumns(Vec<&'static str>),
    #[error("invalid CSV format: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct TagRow {
    tag_id: String,
    name: Option<String>,
    count: i64,
}

/// Loads the vocabulary, never failing: errors are reported and the defaults used.
pub fn load_candidate_tags(input: &Path, exclusions: &Path, reporter: &Reporter) -> CandidateTagSet {
    reporter.info(format!("Loading candidate tags from {}...", input.display()));
    let ranked = match read_ranked_tags(input, reporter) {
        Ok(tags) => tags,
        Err(e) => {
            reporter.error(format!("Could not load {}: {e}", input.display()));
            return CandidateTagSet::defaults();
        }
    };

    let excluded = read_exclusions(exclusions, reporter);
    let set = CandidateTagSet::new(
        ranked
            .into_iter()
            .filter(|t| !excluded.contains(&t.to_lowercase())),
    );
    if set.is_empty() {
        reporter.warn(format!(
            "No valid tags remain after filtering exclusions from {}",
            input.display()
        ));
        return CandidateTagSet::defaults();
    }
    reporter.success(format!(
        "Loaded {} candidate tags from {}",
        set.len(),
        input.display()
    ));
    set
}

/// Names with a usage count above [`MIN_TAG_COUNT`], most used first.
fn read_ranked_tags(input: &Path, reporter: &Reporter) -> Result<Vec<String>, CandidateError> {
    if !input.is_file() {
        return Err(CandidateError::NotFound(input.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(input)?;
    let headers = reader.headers()?.clone();
    let missing: Vec<&'static str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|c| !headers.iter().any(|h| h.trim() == *c))
        .collect();
    if !missing.is_empty() {
        return Err(CandidateError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for row in reader.deserialize::<TagRow>() {
        rows.push(row?);
    }

    let mut ids = HashSet::new();
    if rows.iter().any(|r| !ids.insert(r.tag_id.as_str())) {
        reporter.warn(format!("Duplicate tag_ids found in {}", input.display()));
    }
    if rows
        .iter()
        .any(|r| r.name.as_deref().map_or(true, |n| n.trim().is_empty()))
    {
        reporter.warn(format!("Empty or missing tag names in {}", input.display()));
    }

    let mut valid: Vec<(String, i64)> = rows
        .into_iter()
        .filter(|r| r.count > MIN_TAG_COUNT)
        .filter_map(|r| {
            let name = r.name?.trim().to_string();
            (!name.is_empty()).then_some((name, r.count))
        })
        .collect();
    valid.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(valid.into_iter().map(|(name, _)| name).collect())
}

/// Lowercased names from the exclusion list's `name` column; empty on any problem.
fn read_exclusions(path: &Path, reporter: &Reporter) -> HashSet<String> {
    if !path.is_file() {
        reporter.warn(format!("{} not found, skipping exclusions", path.display()));
        return HashSet::new();
    }
    match parse_exclusions(path) {
        Ok(Some(names)) => {
            reporter.info(format!(
                "Loaded {} excluded tags from {}",
                names.len(),
                path.display()
            ));
            names
        }
        Ok(None) => {
            reporter.warn(format!(
                "No 'name' column found in {}, skipping exclusions",
                path.display()
            ));
            HashSet::new()
        }
        Err(e) => {
            reporter.warn(format!(
                "Failed to parse {}: {e}, skipping exclusions",
                path.display()
            ));
            HashSet::new()
        }
    }
}

fn parse_exclusions(path: &Path) -> Result<Option<HashSet<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let Some(idx) = reader.headers()?.iter().position(|h| h.trim() == "name") else {
        return Ok(None);
    };
    let mut names = HashSet::new();
    for row in reader.records() {
        if let Some(name) = row?.get(idx).map(str::trim).filter(|n| !n.is_empty()) {
            names.insert(name.to_lowercase());
        }
    }
    Ok(Some(names))
}
