use anyhow::{Context, Result};
use dreamcore::extract::{choice_rows, lucidity_label, write_csv, ChoiceMode};
use dreamcore::persist::load_results;
use dreamcore::source::{load_items, SourceOptions};
use dreamcore::{PersistError, ResultsStore};
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// The responses at `path`, or an empty store when nothing has been saved yet.
pub fn load_or_empty(path: &Path) -> Result<ResultsStore> {
    match load_results(path) {
        Ok(store) => Ok(store),
        Err(PersistError::NotFound(_)) => Ok(ResultsStore::new()),
        Err(e) => Err(e).with_context(|| format!("loading {}", path.display())),
    }
}

pub fn load_existing(path: &Path) -> Result<ResultsStore> {
    load_results(path).with_context(|| format!("loading {}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub responses: usize,
    /// Items in the dataset and how many of them still lack a response,
    /// when a dataset was given.
    pub dataset: Option<(usize, usize)>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "responses: {}", self.responses)?;
        if let Some((items, remaining)) = self.dataset {
            write!(f, "\nitems: {items}\nremaining: {remaining}")?;
        }
        Ok(())
    }
}

pub fn status_report(store_path: &Path, input: Option<(&Path, &SourceOptions)>) -> Result<StatusReport> {
    let store = load_or_empty(store_path)?;
    let dataset = match input {
        Some((path, opts)) => {
            let items = load_items(path, opts)?;
            let remaining = store.missing(&items).count();
            Some((items.len(), remaining))
        }
        None => None,
    };
    Ok(StatusReport { responses: store.len(), dataset })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LucidityRow {
    pub id: String,
    pub lucidity: String,
}

/// Label each answer `lucid` / `non-lucid`. Anything else is kept verbatim
/// and logged.
pub fn lucidity_rows(store: &ResultsStore, mode: ChoiceMode) -> Vec<LucidityRow> {
    let mut unrecognised = 0usize;
    let rows: Vec<LucidityRow> = choice_rows(store, mode)
        .into_iter()
        .map(|row| {
            let lucidity = match lucidity_label(&row.content) {
                Some(label) => label.to_string(),
                None => {
                    unrecognised += 1;
                    tracing::warn!(id = %row.id, answer = %row.content, "answer is neither True nor False");
                    row.content
                }
            };
            LucidityRow { id: row.id, lucidity }
        })
        .collect();
    if unrecognised > 0 {
        tracing::info!(unrecognised, "kept unrecognised answers as-is");
    }
    rows
}

/// CSV `id,choice,content`. Returns the number of rows written.
pub fn export_choices<W: Write>(store: &ResultsStore, writer: W, mode: ChoiceMode) -> Result<usize> {
    let rows = choice_rows(store, mode);
    write_csv(writer, &rows)?;
    Ok(rows.len())
}

/// CSV `id,lucidity`. Returns the number of rows written.
pub fn export_lucidity<W: Write>(store: &ResultsStore, writer: W, mode: ChoiceMode) -> Result<usize> {
    let rows = lucidity_rows(store, mode);
    write_csv(writer, &rows)?;
    Ok(rows.len())
}

pub fn create_output(output: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let f = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    Ok(BufWriter::new(f))
}
