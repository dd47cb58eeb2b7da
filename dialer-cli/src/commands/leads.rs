//! `dialer leads`: read stored leads back from the store.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use dialer_core::types::{
    LeadQuery, SheetRowId, StoredLead, DEFAULT_PER_PAGE, LAST_SYNC, SHEET_ROW_ID,
};
use dialer_sync::{PostgrestStore, RecordStore};

use super::load_config;

const FIELDS_WIDTH: usize = 60;

#[derive(Subcommand, Debug)]
pub enum LeadsCommand {
    /// Print one page of stored leads ordered by the configured column.
    List(ListArgs),
    /// Print a single lead by its sheet row id.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: u32,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Spreadsheet row number the lead came from.
    pub sheet_row_id: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct LeadTableRow {
    #[tabled(rename = "row")]
    row: String,
    #[tabled(rename = "fields")]
    fields: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
}

pub fn run(command: LeadsCommand) -> Result<()> {
    let config = load_config()?;
    let store = PostgrestStore::new(&config.store, config.http_timeout);

    match command {
        LeadsCommand::List(args) => {
            let page = store
                .list(LeadQuery::new(args.page, args.per_page))
                .context("failed to load leads")?;
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&page).context("failed to render leads JSON")?
                );
                return Ok(());
            }

            let pages = page
                .total_pages()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!(
                "Page {} of {pages} | {} leads",
                page.page,
                page.total
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string()),
            );
            if page.leads.is_empty() {
                println!("No leads on this page.");
                return Ok(());
            }
            let rows: Vec<LeadTableRow> = page.leads.iter().map(table_row).collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        LeadsCommand::Show(args) => {
            let id = SheetRowId::from(args.sheet_row_id);
            let lead = store
                .get(&id)
                .with_context(|| format!("failed to load lead {id}"))?;
            match lead {
                Some(lead) if args.json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&lead)
                            .context("failed to render lead JSON")?
                    );
                }
                Some(lead) => print_lead(&lead),
                None => anyhow::bail!("lead {id} not found"),
            }
        }
    }
    Ok(())
}

fn table_row(lead: &StoredLead) -> LeadTableRow {
    let fields = lead
        .iter()
        .filter(|(key, _)| !is_bookkeeping(key))
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| format!("{key}={}", display_value(value)))
        .collect::<Vec<_>>()
        .join(", ");
    LeadTableRow {
        row: lead.get(SHEET_ROW_ID).map(display_value).unwrap_or_default(),
        fields: truncate(&fields, FIELDS_WIDTH),
        last_sync: lead.get(LAST_SYNC).map(display_value).unwrap_or_default(),
    }
}

fn print_lead(lead: &StoredLead) {
    let width = lead.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in lead {
        let label = format!("{key:<width$}");
        let label = if is_bookkeeping(key) {
            label.bright_black()
        } else {
            label.bold()
        };
        println!("{label}  {}", display_value(value));
    }
}

fn is_bookkeeping(key: &str) -> bool {
    key == SHEET_ROW_ID || key == LAST_SYNC || key == "id"
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead(value: Value) -> StoredLead {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn table_row_hides_bookkeeping_and_nulls() {
        let row = table_row(&lead(json!({
            "id": 7,
            "name": "Alice",
            "phone": null,
            "sheet_row_id": "2",
            "last_sync": "2026-10-19T08:00:00Z",
        })));

        assert_eq!(row.row, "2");
        assert_eq!(row.fields, "name=Alice");
        assert_eq!(row.last_sync, "2026-10-19T08:00:00Z");
    }

    #[test]
    fn long_field_lists_are_truncated() {
        let text = "x".repeat(80);
        let cut = truncate(&text, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("short", 10), "short");
    }
}
