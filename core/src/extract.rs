use crate::store::{AnnotationResult, ResultsStore};
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// How many rows a result with several completion choices produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChoiceMode {
    /// One row per item, from the first choice.
    #[default]
    First,
    /// One row per choice.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceRow {
    pub id: String,
    pub choice: usize,
    pub content: String,
}

/// `choices[*].message.content` of a chat completion, in order.
pub fn choice_contents(result: &AnnotationResult) -> Vec<String> {
    result
        .get("choices")
        .and_then(Value::as_array)
        .map(|choices| {
            choices
                .iter()
                .filter_map(|c| c.pointer("/message/content").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn choice_rows(store: &ResultsStore, mode: ChoiceMode) -> Vec<ChoiceRow> {
    let mut rows = Vec::new();
    for (id, result) in store.iter() {
        let contents = choice_contents(result);
        if contents.is_empty() {
            tracing::warn!(id, "result has no choice content");
            continue;
        }
        let take = match mode {
            ChoiceMode::First => 1,
            ChoiceMode::All => contents.len(),
        };
        for (choice, content) in contents.into_iter().take(take).enumerate() {
            rows.push(ChoiceRow { id: id.to_string(), choice, content });
        }
    }
    rows
}

/// Map a lucidity answer to its label.
pub fn lucidity_label(answer: &str) -> Option<&'static str> {
    match answer.trim() {
        "True" => Some("lucid"),
        "False" => Some("non-lucid"),
        _ => None,
    }
}

pub fn write_csv<W: Write, R: Serialize>(writer: W, rows: &[R]) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}
