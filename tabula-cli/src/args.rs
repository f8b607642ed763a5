//! Command-line arguments and their value parsers.

use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use tabula_lib::export::ExportScope;
use tabula_lib::filter::ColumnFilter;
use tabula_lib::sort::SortKey;

#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(author, version, about = "Tabula - filter, sort, group and page JSON rows")]
pub struct Cli {
    /// JSON file holding an array of row objects
    pub rows: PathBuf,

    /// JSON table configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Column keys, comma separated (defaults to the first row's fields)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Sort key as COLUMN or COLUMN:desc; repeat for tie-breakers
    #[arg(short, long, value_parser = parse_sort)]
    pub sort: Vec<SortKey>,

    /// Substring filter as COLUMN=TEXT
    #[arg(short, long, value_parser = parse_text_filter)]
    pub filter: Vec<(String, ColumnFilter)>,

    /// Inclusive numeric filter as COLUMN=MIN..MAX (either bound optional)
    #[arg(long, value_parser = parse_range_filter)]
    pub range: Vec<(String, ColumnFilter)>,

    /// Full-text search over the searchable columns
    #[arg(long)]
    pub search: Option<String>,

    /// Group by column, outermost first
    #[arg(short, long)]
    pub group: Vec<String>,

    /// Sum a column in group summaries
    #[arg(long)]
    pub sum: Vec<String>,

    /// Select a row by id (for `--export selected`)
    #[arg(long)]
    pub select: Vec<String>,

    /// Zero-based page to show
    #[arg(short, long)]
    pub page: Option<usize>,

    /// Rows per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Rows to export
    #[arg(short, long, value_enum, default_value = "current-page")]
    pub export: ScopeArg,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Export scope option.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ScopeArg {
    Filtered,
    #[default]
    CurrentPage,
    Selected,
}

impl From<ScopeArg> for ExportScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Filtered => ExportScope::Filtered,
            ScopeArg::CurrentPage => ExportScope::CurrentPage,
            ScopeArg::Selected => ExportScope::Selected,
        }
    }
}

fn parse_sort(s: &str) -> Result<SortKey, String> {
    let (key, direction) = match s.split_once(':') {
        Some((key, direction)) => (key, direction),
        None => (s, "asc"),
    };
    if key.is_empty() {
        return Err("missing column key".into());
    }
    match direction.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortKey::asc(key)),
        "desc" => Ok(SortKey::desc(key)),
        other => Err(format!("unknown direction '{other}', expected asc or desc")),
    }
}

fn split_assignment(s: &str) -> Result<(&str, &str), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(format!("expected COLUMN=VALUE, got '{s}'")),
    }
}

fn parse_text_filter(s: &str) -> Result<(String, ColumnFilter), String> {
    let (key, needle) = split_assignment(s)?;
    Ok((key.to_string(), ColumnFilter::text(needle)))
}

fn parse_range_filter(s: &str) -> Result<(String, ColumnFilter), String> {
    let (key, range) = split_assignment(s)?;
    let (min, max) = range
        .split_once("..")
        .ok_or_else(|| format!("expected MIN..MAX, got '{range}'"))?;
    let bound = |b: &str| -> Result<Option<f64>, String> {
        let b = b.trim();
        if b.is_empty() {
            Ok(None)
        } else {
            b.parse().map(Some).map_err(|_| format!("'{b}' is not a number"))
        }
    };
    Ok((key.to_string(), ColumnFilter::number_range(bound(min)?, bound(max)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort("amt").unwrap(), SortKey::asc("amt"));
        assert_eq!(parse_sort("amt:DESC").unwrap(), SortKey::desc("amt"));
        assert!(parse_sort("amt:sideways").is_err());
        assert!(parse_sort(":asc").is_err());
    }

    #[test]
    fn test_parse_filters() {
        let (key, filter) = parse_text_filter("name=wind").unwrap();
        assert_eq!(key, "name");
        assert!(filter.is_active());
        assert!(parse_text_filter("=x").is_err());

        let (key, filter) = parse_range_filter("amt=0..").unwrap();
        assert_eq!(key, "amt");
        match filter {
            ColumnFilter::NumberRange { min, max } => {
                assert_eq!(min, Some(0.0));
                assert_eq!(max, None);
            }
            other => panic!("expected a range, got {other:?}"),
        }
        assert!(parse_range_filter("amt=1-2").is_err());
        assert!(parse_range_filter("amt=a..b").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "tabula", "rows.json", "-s", "amt:desc", "-s", "id", "--range", "amt=0..", "-g", "sign",
            "--export", "filtered", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.sort, vec![SortKey::desc("amt"), SortKey::asc("id")]);
        assert_eq!(cli.range.len(), 1);
        assert_eq!(cli.group, vec!["sign"]);
        assert_eq!(cli.export, ScopeArg::Filtered);
        assert_eq!(cli.verbose, 2);
    }
}
