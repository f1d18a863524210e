//! Loading dream reports from dataset exports.
//!
//! Exports are read as CSV, TSV, JSON (array or single object) or JSONL,
//! from a single file or a directory of them. Each dataset kind decides
//! which columns hold the id and the text, which rows count, and how ids
//! are formed.

use crate::clean::{clean_text, within_length};
use crate::store::Item;
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// One input record: column name to non-empty cell value.
pub type Row = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    DreamViews,
    Sddb,
    Flying,
    Generic,
}

impl DatasetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::DreamViews => "dreamviews",
            DatasetKind::Sddb => "sddb",
            DatasetKind::Flying => "flying",
            DatasetKind::Generic => "generic",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DatasetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dreamviews" => Ok(DatasetKind::DreamViews),
            "sddb" => Ok(DatasetKind::Sddb),
            "flying" => Ok(DatasetKind::Flying),
            "generic" => Ok(DatasetKind::Generic),
            other => Err(anyhow!("unknown dataset '{other}', expected one of: dreamviews, sddb, flying, generic")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub kind: DatasetKind,
    pub id_column: String,
    pub text_column: String,
    /// Flying dataset only: keep dream reports, drop comments. On by default.
    pub dreams_only: bool,
}

impl SourceOptions {
    pub fn for_kind(kind: DatasetKind) -> Self {
        let (id_column, text_column) = match kind {
            DatasetKind::DreamViews => ("post_id", "post_clean"),
            // ids are positional
            DatasetKind::Sddb => ("", "answer_text"),
            DatasetKind::Flying => ("dream_ID", "dream"),
            DatasetKind::Generic => ("id", "text"),
        };
        Self {
            kind,
            id_column: id_column.into(),
            text_column: text_column.into(),
            dreams_only: kind == DatasetKind::Flying,
        }
    }

    fn keeps(&self, row: &Row) -> bool {
        match self.kind {
            DatasetKind::DreamViews => matches!(row.get("lucidity").map(String::as_str), Some("lucid" | "nonlucid")),
            DatasetKind::Flying if self.dreams_only => {
                matches!(row.get("report_type").map(|s| s.trim()), Some("1" | "1.0" | "dream"))
            }
            _ => true,
        }
    }
}

/// Load, clean and filter the reports under `path`.
pub fn load_items(path: &Path, opts: &SourceOptions) -> Result<Vec<Item>> {
    let files = discover(path)?;
    if files.is_empty() {
        bail!("no csv/tsv/json/jsonl input found at {}", path.display());
    }
    let mut rows = Vec::new();
    for file in &files {
        let before = rows.len();
        rows.extend(read_rows(file)?);
        tracing::debug!(file = %file.display(), rows = rows.len() - before, "read dataset file");
    }
    let items = rows_to_items(rows, opts)?;
    tracing::info!(kind = %opts.kind, files = files.len(), items = items.len(), "loaded items");
    Ok(items)
}

fn is_supported(p: &Path) -> bool {
    matches!(p.extension().and_then(|s| s.to_str()), Some("csv" | "tsv" | "json" | "jsonl"))
}

fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && is_supported(p) {
                files.push(p.to_path_buf());
            }
        }
    } else if path.is_file() {
        if !is_supported(path) {
            bail!("unsupported input format: {}", path.display());
        }
        files.push(path.to_path_buf());
    } else {
        bail!("input not found: {}", path.display());
    }
    Ok(files)
}

pub fn read_rows(file: &Path) -> Result<Vec<Row>> {
    match file.extension().and_then(|s| s.to_str()) {
        Some("csv") => read_delimited(file, b','),
        Some("tsv") => read_delimited(file, b'\t'),
        Some("jsonl") => read_jsonl(file),
        _ => read_json(file),
    }
}

fn read_delimited(file: &Path, delimiter: u8) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(file)
        .with_context(|| format!("opening {}", file.display()))?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("reading {}", file.display()))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, v)| !v.is_empty())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn read_jsonl(file: &Path) -> Result<Vec<Row>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let mut rows = Vec::new();
    for (n, line) in BufReader::new(f).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let v: Value = serde_json::from_str(&line)
            .with_context(|| format!("{} line {}", file.display(), n + 1))?;
        rows.push(object_to_row(v)?);
    }
    Ok(rows)
}

fn read_json(file: &Path) -> Result<Vec<Row>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let json: Value = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {}", file.display()))?;
    match json {
        Value::Array(arr) => arr.into_iter().map(object_to_row).collect(),
        Value::Object(_) => Ok(vec![object_to_row(json)?]),
        _ => bail!("{} holds neither an object nor an array", file.display()),
    }
}

fn object_to_row(v: Value) -> Result<Row> {
    let Value::Object(map) = v else { bail!("expected a JSON object per record") };
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect())
}

/// Apply the dataset's row filter and id rule, clean the text and drop
/// reports outside the length bounds. Fails on duplicate ids.
pub fn rows_to_items(rows: Vec<Row>, opts: &SourceOptions) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    let mut position = 0usize;
    for (n, row) in rows.into_iter().enumerate() {
        if !opts.keeps(&row) { continue; }
        let Some(raw_text) = row.get(&opts.text_column) else { continue };
        let id = match opts.kind {
            DatasetKind::Sddb => format!("SDDB-{position:06}"),
            kind => {
                let raw_id = row
                    .get(&opts.id_column)
                    .ok_or_else(|| anyhow!("record {} has no '{}' value", n + 1, opts.id_column))?;
                match kind {
                    DatasetKind::DreamViews => format!("DV-{raw_id}"),
                    _ => raw_id.clone(),
                }
            }
        };
        position += 1;
        let text = clean_text(raw_text);
        if !within_length(&text) { continue; }
        items.push(Item { id, text });
    }
    ensure_unique(&items)?;
    Ok(items)
}

fn ensure_unique(items: &[Item]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id.as_str()) {
            bail!("duplicate item id '{}'", item.id);
        }
    }
    Ok(())
}

/// Deterministic subset of `n` items for trial runs, kept in input order.
///
/// Selection depends only on `seed` and the ids, so the same input always
/// yields the same subset.
pub fn sample(items: Vec<Item>, n: usize, seed: u64) -> Vec<Item> {
    if items.len() <= n {
        return items;
    }
    let mut keyed: Vec<(Vec<u8>, usize)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (sample_key(seed, &item.id), i))
        .collect();
    keyed.sort();
    let mut keep: Vec<usize> = keyed.into_iter().take(n).map(|(_, i)| i).collect();
    keep.sort_unstable();
    let mut slots: Vec<Option<Item>> = items.into_iter().map(Some).collect();
    keep.into_iter().filter_map(|i| slots[i].take()).collect()
}

fn sample_key(seed: u64, id: &str) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(id.as_bytes());
    hasher.finalize().to_vec()
}
