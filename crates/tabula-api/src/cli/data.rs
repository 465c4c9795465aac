//! Data commands: add, update, fetch, search, delete-rows, dedup.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use tabula_types::query::{FetchOptions, OutputFormat, PageSize, SearchOptions};

use super::render::{print_records, read_records};
use crate::state::AppState;

pub async fn add(
    state: &AppState,
    table: &str,
    unique: &str,
    file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let records = read_records(file)?;
    let outcome = state
        .manager
        .add_data(table, records, unique)
        .await
        .with_context(|| format!("Failed to add records to '{table}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.is_noop() {
        println!();
        println!(
            "  {} Nothing new to add ({} duplicate{})",
            style("--").dim(),
            outcome.skipped(),
            if outcome.skipped() == 1 { "" } else { "s" }
        );
        println!();
    } else {
        println!();
        println!(
            "  {} Added {} record{} to '{}'",
            style("ok").green(),
            style(outcome.inserted).bold(),
            if outcome.inserted == 1 { "" } else { "s" },
            style(table).cyan()
        );
        if outcome.skipped() > 0 {
            println!(
                "  {} Skipped {} already in the table, {} repeated in the input",
                style("--").dim(),
                outcome.skipped_existing,
                outcome.skipped_in_batch
            );
        }
        println!();
    }
    Ok(())
}

pub async fn update(
    state: &AppState,
    table: &str,
    unique: &str,
    file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let records = read_records(file)?;
    let calls = state
        .manager
        .update_data(table, &records, unique)
        .await
        .with_context(|| format!("Failed to update '{table}'"))?;

    if json {
        let result = serde_json::json!({ "table": table, "updates": calls });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Issued {} update{} on '{}'",
            style("ok").green(),
            style(calls).bold(),
            if calls == 1 { "" } else { "s" },
            style(table).cyan()
        );
        println!();
    }
    Ok(())
}

pub async fn fetch(
    state: &AppState,
    table: &str,
    page: usize,
    per_page: i64,
    filter: Option<String>,
    exclude: Vec<String>,
    json: bool,
) -> Result<()> {
    let options = FetchOptions {
        page,
        per_page: PageSize::from_per_page(per_page)?,
        filter,
        exclude_columns: exclude,
        format: OutputFormat::Records,
    };
    let rows = state
        .manager
        .fetch_data(table, &options)
        .await
        .with_context(|| format!("Failed to fetch from '{table}'"))?;

    print_records(&rows.into_records()?, json)
}

pub async fn search(
    state: &AppState,
    table: &str,
    query: &str,
    limit: usize,
    exclude: Vec<String>,
    json: bool,
) -> Result<()> {
    let options = SearchOptions {
        limit,
        exclude_columns: exclude,
        format: OutputFormat::Records,
    };
    let rows = state
        .manager
        .vector_search(table, query, &options)
        .await
        .with_context(|| format!("Search in '{table}' failed"))?;

    print_records(&rows.into_records()?, json)
}

pub async fn delete_rows(state: &AppState, table: &str, condition: &str, json: bool) -> Result<()> {
    state
        .manager
        .delete_rows(table, condition)
        .await
        .with_context(|| format!("Failed to delete rows from '{table}'"))?;

    if json {
        let result = serde_json::json!({ "table": table, "condition": condition });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Deleted rows matching {}",
            style("ok").green(),
            style(condition).yellow()
        );
        println!();
    }
    Ok(())
}

pub async fn dedup(state: &AppState, table: &str, subset: &[String], json: bool) -> Result<()> {
    let removed = state
        .manager
        .delete_duplicates(table, subset)
        .await
        .with_context(|| format!("Failed to remove duplicates from '{table}'"))?;

    if json {
        let result = serde_json::json!({ "table": table, "removed": removed });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Removed {} duplicate row{} from '{}'",
            style("ok").green(),
            style(removed).bold(),
            if removed == 1 { "" } else { "s" },
            style(table).cyan()
        );
        println!();
    }
    Ok(())
}
