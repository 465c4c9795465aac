//! `tabula tables` subcommands: list, create, drop, count, schema.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use tabula_infra::schema::{arrow_schema, type_label};
use tabula_types::schema::ColumnSpec;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum TablesCommand {
    /// List all tables.
    #[command(alias = "ls")]
    List,

    /// Create an empty table from a JSON list of column specs.
    Create {
        /// Table name.
        name: String,

        /// JSON file: [{"name": "id", "type": "string", "nullable": false}, ...]
        #[arg(long, short)]
        schema: PathBuf,

        /// Replace the table if it exists.
        #[arg(long, conflicts_with = "exist_ok")]
        overwrite: bool,

        /// Succeed without changes if the table exists.
        #[arg(long)]
        exist_ok: bool,
    },

    /// Drop a table and all its rows.
    #[command(alias = "rm")]
    Drop {
        /// Table name.
        name: String,
    },

    /// Count rows, optionally matching a filter.
    Count {
        /// Table name.
        name: String,

        /// Filter expression.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show a table's columns.
    Schema {
        /// Table name.
        name: String,
    },
}

pub async fn handle_tables_command(cmd: TablesCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        TablesCommand::List => list(state, json).await,
        TablesCommand::Create {
            name,
            schema,
            overwrite,
            exist_ok,
        } => create(state, &name, &schema, overwrite, exist_ok, json).await,
        TablesCommand::Drop { name } => drop_table(state, &name, json).await,
        TablesCommand::Count { name, filter } => count(state, &name, filter.as_deref(), json).await,
        TablesCommand::Schema { name } => schema(state, &name, json).await,
    }
}

async fn list(state: &AppState, json: bool) -> Result<()> {
    let mut names = state.manager.list_tables().await?;
    names.sort();

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    println!();
    if names.is_empty() {
        println!("  {}", style("No tables yet.").dim());
    } else {
        for name in &names {
            println!("  {}", style(name).cyan());
        }
    }
    println!();
    Ok(())
}

async fn create(
    state: &AppState,
    name: &str,
    schema_path: &Path,
    overwrite: bool,
    exist_ok: bool,
    json: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(schema_path)
        .with_context(|| format!("Failed to read {}", schema_path.display()))?;
    let columns: Vec<ColumnSpec> =
        serde_json::from_str(&text).context("Schema file is not a list of column specs")?;
    let schema = Arc::new(arrow_schema(&columns)?);

    if exist_ok {
        state.manager.create_schema(name, schema).await?;
    } else {
        state.manager.create_table(name, schema, overwrite).await?;
    }

    if json {
        let result = serde_json::json!({
            "table": name,
            "columns": columns.len(),
            "overwrite": overwrite,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Table '{}' ready ({} columns)",
            style("ok").green(),
            style(name).cyan(),
            columns.len()
        );
        println!();
    }
    Ok(())
}

async fn drop_table(state: &AppState, name: &str, json: bool) -> Result<()> {
    let dropped = state.manager.delete_table(name).await?;

    if json {
        let result = serde_json::json!({ "table": name, "dropped": dropped });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!("  {} Dropped '{}'", style("ok").green(), style(name).cyan());
        println!();
    }
    Ok(())
}

async fn count(state: &AppState, name: &str, filter: Option<&str>, json: bool) -> Result<()> {
    let rows = state.manager.count_rows(name, filter).await?;

    if json {
        let result = serde_json::json!({ "table": name, "filter": filter, "rows": rows });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{rows}");
    }
    Ok(())
}

async fn schema(state: &AppState, name: &str, json: bool) -> Result<()> {
    let schema = state.manager.table_schema(name).await?;

    if json {
        let columns: Vec<_> = schema
            .fields()
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name(),
                    "type": type_label(f.data_type()),
                    "nullable": f.is_nullable(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&columns)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Column").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Nullable").fg(Color::White),
    ]);
    for field in schema.fields() {
        table.add_row(vec![
            Cell::new(field.name()).fg(Color::Cyan),
            Cell::new(type_label(field.data_type())),
            Cell::new(if field.is_nullable() { "yes" } else { "no" }).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}
