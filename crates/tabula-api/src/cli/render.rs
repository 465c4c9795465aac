//! Record input and styled output helpers shared by the data commands.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::Value;

use tabula_types::record::RecordSet;

/// Longest cell rendered before truncation.
const MAX_CELL_CHARS: usize = 60;

/// Numeric arrays longer than this are summarised instead of printed.
const MAX_INLINE_FLOATS: usize = 8;

/// Read records from a JSON file, or from stdin when `file` is `None`.
pub fn read_records(file: Option<&Path>) -> Result<RecordSet> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read records from stdin")?;
            buf
        }
    };
    parse_records(&text)
}

/// Parse one JSON object or an array of objects.
pub fn parse_records(text: &str) -> Result<RecordSet> {
    let value: Value = serde_json::from_str(text).context("Records are not valid JSON")?;
    Ok(RecordSet::try_from(value)?)
}

/// Compact, width-limited rendering of one value.
pub fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items)
            if items.len() > MAX_INLINE_FLOATS && items.iter().all(Value::is_number) =>
        {
            format!("[{} floats]", items.len())
        }
        other => other.to_string(),
    };
    truncate(&text, MAX_CELL_CHARS)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Column headers: keys in first-seen order across all records.
pub fn headers(records: &RecordSet) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

/// Print records as a JSON array or a table.
pub fn print_records(records: &RecordSet, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!("  {}", style("No rows.").dim());
        println!();
        return Ok(());
    }

    let headers = headers(records);
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );

    for record in records {
        table.add_row(
            headers
                .iter()
                .map(|h| {
                    let text = record.get(h).map(cell_text).unwrap_or_default();
                    if h.starts_with('_') {
                        Cell::new(text).fg(Color::DarkGrey)
                    } else {
                        Cell::new(text)
                    }
                })
                .collect::<Vec<_>>(),
        );
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} row{}",
        style(records.len()).bold(),
        if records.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}
