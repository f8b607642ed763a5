//! `tabula` - run a JSON row file through the table engine.
//!
//! Usage:
//!   `tabula rows.json --sort amt:desc --range amt=0.. --export filtered`
//!   `tabula rows.json --group region --sum amt --page 1 --page-size 20`

mod args;

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use anyhow::bail;
use args::Cli;
use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use tabula_lib::column::Column;
use tabula_lib::config::TableConfig;
use tabula_lib::group::Aggregation;
use tabula_lib::model::RowId;
use tabula_lib::selection::SelectionAction;
use tabula_lib::table::DataTable;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let output = run(cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Runs the rows through the table and returns the JSON report.
///
/// Recovered errors are not routed through an error sink: the table already
/// logs each one at warn level, which honours `--verbose` and `--log-file`.
fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(&cli.rows)
        .with_context(|| format!("reading {}", cli.rows.display()))?;
    let rows: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", cli.rows.display()))?;

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            TableConfig::from_json(&text)?
        }
        None => TableConfig::default(),
    };
    if let Some(size) = cli.page_size {
        config = config.page_size(size);
    }

    let columns = column_keys(&cli.columns, &rows)?
        .into_iter()
        .map(|key| {
            let summed = cli.sum.contains(&key);
            let column = Column::new(key);
            if summed {
                column.aggregate(Aggregation::Sum)
            } else {
                column
            }
        })
        .collect();

    let mut table = DataTable::builder()
        .columns(columns)
        .rows_json(rows)
        .config(config)
        .build()?;

    table.set_sort(cli.sort)?;
    for (key, filter) in cli.filter.into_iter().chain(cli.range) {
        table.set_filter(&key, filter)?;
    }
    if let Some(search) = cli.search {
        table.set_search(search);
    }
    if !cli.group.is_empty() {
        table.set_group_by(cli.group)?;
    }
    if let Some(page) = cli.page {
        table.set_page(page)?;
    }

    let view = table.refresh()?;
    for id in cli.select {
        table.dispatch(SelectionAction::Select(RowId::from(id)))?;
    }
    let cells = table.export(cli.export.into())?;
    log::info!(
        "{} of {} rows match; exporting {} cells",
        view.total_rows,
        table.rows().len(),
        cells.len()
    );

    Ok(serde_json::json!({
        "page": view.page,
        "total_rows": view.total_rows,
        "groups": view.groups,
        "cells": cells,
    }))
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            WriteLogger::init(level, Config::default(), file)?;
        }
        None => TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)?,
    }
    Ok(())
}

/// Explicit column keys, or the fields of the first row.
fn column_keys(explicit: &[String], rows: &serde_json::Value) -> anyhow::Result<Vec<String>> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    match rows.as_array().and_then(|rows| rows.first()) {
        Some(serde_json::Value::Object(first)) => Ok(first.keys().cloned().collect()),
        Some(_) => bail!("rows must be JSON objects"),
        None => bail!("cannot infer columns from an empty row file; pass --columns"),
    }
}
