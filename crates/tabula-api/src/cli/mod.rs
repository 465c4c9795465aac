//! CLI command definitions and dispatch for the `tabula` binary.
//!
//! Uses clap derive macros for argument parsing. Table lifecycle commands
//! live under `tabula tables`; data commands take the table name first
//! (e.g., `tabula add docs --unique id -f docs.json`).

pub mod data;
pub mod render;
pub mod tables;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::state::AppState;

/// Manage tables in an embedded vector database.
#[derive(Parser)]
#[command(name = "tabula", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors. Command results are still printed.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory holding config.toml (defaults to ~/.tabula).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, inspect and drop tables.
    Tables {
        #[command(subcommand)]
        command: tables::TablesCommand,
    },

    /// Add records, skipping those whose unique value already exists.
    Add {
        /// Table name.
        table: String,

        /// Field that identifies a record.
        #[arg(long, short)]
        unique: String,

        /// JSON file with one record or an array of records (stdin if omitted).
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Patch rows matched by each record's unique value.
    Update {
        /// Table name.
        table: String,

        /// Field that identifies a record.
        #[arg(long, short)]
        unique: String,

        /// JSON file with one record or an array of records (stdin if omitted).
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Fetch a page of rows.
    Fetch {
        /// Table name.
        table: String,

        /// Page number, starting at 1.
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Rows per page, or -1 for all rows.
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        per_page: i64,

        /// Filter expression (e.g. "score > 3").
        #[arg(long)]
        filter: Option<String>,

        /// Columns to leave out (comma-separated). Include _rowid to omit row ids.
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Find the rows closest to a text query.
    Search {
        /// Table name.
        table: String,

        /// Free-text query to embed.
        query: String,

        /// Maximum number of results.
        #[arg(long, short, default_value_t = 5)]
        limit: usize,

        /// Columns to leave out (comma-separated).
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Delete rows matching a condition.
    DeleteRows {
        /// Table name.
        table: String,

        /// Filter expression selecting the rows to delete.
        condition: String,
    },

    /// Remove duplicate rows, keeping the first occurrence.
    Dedup {
        /// Table name.
        table: String,

        /// Columns that define a duplicate (comma-separated, all columns if omitted).
        #[arg(long, value_delimiter = ',')]
        subset: Vec<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Run a parsed command against the opened database.
pub async fn dispatch(command: Commands, state: &AppState, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Tables { command } => tables::handle_tables_command(command, state, json).await,
        Commands::Add {
            table,
            unique,
            file,
        } => data::add(state, &table, &unique, file.as_deref(), json).await,
        Commands::Update {
            table,
            unique,
            file,
        } => data::update(state, &table, &unique, file.as_deref(), json).await,
        Commands::Fetch {
            table,
            page,
            per_page,
            filter,
            exclude,
        } => data::fetch(state, &table, page, per_page, filter, exclude, json).await,
        Commands::Search {
            table,
            query,
            limit,
            exclude,
        } => data::search(state, &table, &query, limit, exclude, json).await,
        Commands::DeleteRows { table, condition } => {
            data::delete_rows(state, &table, &condition, json).await
        }
        Commands::Dedup { table, subset } => data::dedup(state, &table, &subset, json).await,
        Commands::Completions { .. } => unreachable!("handled in main"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_accepts_all_rows_and_excludes() {
        let cli = Cli::try_parse_from([
            "tabula", "fetch", "docs", "--per-page", "-1", "--exclude", "vector,_rowid",
        ])
        .unwrap();
        match cli.command {
            Commands::Fetch {
                per_page, exclude, page, ..
            } => {
                assert_eq!(per_page, -1);
                assert_eq!(page, 1);
                assert_eq!(exclude, vec!["vector", "_rowid"]);
            }
            _ => panic!("Expected fetch"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["tabula", "tables", "list", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_quiet_help_describes_log_filter_only() {
        let cmd = Cli::command();
        let quiet = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "quiet")
            .unwrap();
        let help = quiet.get_help().unwrap().to_string();
        assert!(help.contains("Only log errors"));
        assert!(help.contains("still printed"));
    }
}
