use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on tag columns per row.
pub const MAX_TAGS: usize = 20;

pub const MEDIA_TYPE_VIDEO: &str = "video";

pub const LEDGER_HEADER: [&str; 2 + MAX_TAGS] = [
    "media_id", "media_type", "tag1", "tag2", "tag3", "tag4", "tag5", "tag6", "tag7", "tag8",
    "tag9", "tag10", "tag11", "tag12", "tag13", "tag14", "tag15", "tag16", "tag17", "tag18",
    "tag19", "tag20",
];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed ledger: {0}")]
    Csv(#[from] csv::Error),
    #[error("ledger header is missing the `{0}` column")]
    MissingColumn(&'static str),
}

/// One ledger row: a video and its tags ranked by descending confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub media_id: String,
    pub media_type: String,
    pub tags: Vec<String>,
}

impl TagRecord {
    pub fn video(media_id: impl Into<String>, mut tags: Vec<String>) -> Self {
        tags.truncate(MAX_TAGS);
        Self {
            media_id: media_id.into(),
            media_type: MEDIA_TYPE_VIDEO.to_string(),
            tags,
        }
    }

    fn to_row(&self) -> Vec<&str> {
        let mut row = Vec::with_capacity(LEDGER_HEADER.len());
        row.push(self.media_id.as_str());
        row.push(self.media_type.as_str());
        row.extend(self.tags.iter().take(MAX_TAGS).map(String::as_str));
        row.resize(LEDGER_HEADER.len(), "");
        row
    }
}

/// Column positions resolved from a ledger header.
struct Columns {
    media_id: usize,
    media_type: Option<usize>,
    tags: Vec<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, LedgerError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let media_id = find("media_id").ok_or(LedgerError::MissingColumn("media_id"))?;
        let tags = (1..=MAX_TAGS)
            .filter_map(|i| find(&format!("tag{i}")))
            .collect();
        Ok(Self {
            media_id,
            media_type: find("media_type"),
            tags,
        })
    }

    fn record(&self, row: &StringRecord) -> Option<TagRecord> {
        let media_id = row.get(self.media_id)?.trim();
        if media_id.is_empty() {
            return None;
        }
        let media_type = self
            .media_type
            .and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(MEDIA_TYPE_VIDEO);
        let tags = self
            .tags
            .iter()
            .filter_map(|&i| row.get(i))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Some(TagRecord {
            media_id: media_id.to_string(),
            media_type: media_type.to_string(),
            tags,
        })
    }
}

/// Reads the ledger at `path`. A missing or empty file is an empty ledger.
///
/// Rows may be short or carry extra columns; only `media_id` is required in
/// the header. Rows with a blank id are skipped and duplicate ids keep the
/// first occurrence.
pub fn load(path: &Path) -> Result<Vec<TagRecord>, LedgerError> {
    if !path.exists() {
        debug!(path = %path.display(), "no ledger on disk");
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Ok(Vec::new());
    }
    let columns = Columns::resolve(&headers)?;

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let Some(record) = columns.record(&row) else {
            debug!(line = ?row.position().map(|p| p.line()), "skipping ledger row without media_id");
            continue;
        };
        if !seen.insert(record.media_id.clone()) {
            warn!(media_id = %record.media_id, "duplicate ledger row ignored");
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

/// Rewrites the whole ledger at `path` and returns the number of rows written.
///
/// An empty record set leaves any existing file untouched.
pub fn save(path: &Path, records: &[TagRecord]) -> Result<usize, LedgerError> {
    if records.is_empty() {
        debug!(path = %path.display(), "no ledger rows, keeping existing file");
        return Ok(0);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = staging_path(path);
    if let Err(e) = write_rows(&tmp, records) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })?;
    Ok(records.len())
}

fn write_rows(path: &Path, records: &[TagRecord]) -> Result<(), LedgerError> {
    let mut writer = WriterBuilder::new().flexible(false).from_path(path)?;
    writer.write_record(LEDGER_HEADER)?;
    for record in records {
        writer.write_record(record.to_row())?;
    }
    writer.flush()?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "tags.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}
