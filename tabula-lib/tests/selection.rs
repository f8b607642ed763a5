//! Selection across sorting, filtering and dataset changes.

mod common;

use async_trait::async_trait;
use common::Collector;
use common::ids;
use common::ledger;
use common::ledger_columns;
use common::numbered;
use tabula_lib::column::Column;
use tabula_lib::config::TableConfig;
use tabula_lib::error::CallbackResult;
use tabula_lib::error::ErrorCode;
use tabula_lib::filter::ColumnFilter;
use tabula_lib::model::RowId;
use tabula_lib::selection::SelectAllResolver;
use tabula_lib::selection::SelectionAction;
use tabula_lib::selection::SelectionMode;
use tabula_lib::sort::SortKey;
use tabula_lib::table::DataTable;

fn ledger_table() -> DataTable {
    DataTable::builder()
        .columns(ledger_columns())
        .rows_json(ledger())
        .build()
        .unwrap()
}

fn numbered_table(n: usize) -> DataTable {
    DataTable::builder()
        .columns(vec![Column::new("id"), Column::new("amt")])
        .rows(numbered(n))
        .build()
        .unwrap()
}

struct Resolver(CallbackResult<Vec<&'static str>>);

#[async_trait]
impl SelectAllResolver for Resolver {
    async fn resolve(&self) -> CallbackResult<Vec<RowId>> {
        match &self.0 {
            Ok(ids) => Ok(ids.iter().map(|&id| RowId::from(id)).collect()),
            Err(e) => Err(e.to_string().into()),
        }
    }
}

#[test]
fn test_selection_survives_resort() {
    let mut table = ledger_table();
    table.refresh().unwrap();
    table.dispatch(SelectionAction::Toggle(RowId::from(1))).unwrap();
    table.dispatch(SelectionAction::Toggle(RowId::from(3))).unwrap();

    table.set_sort(vec![SortKey::desc("amt"), SortKey::asc("id")]).unwrap();
    let view = table.refresh().unwrap();
    assert_eq!(ids(&view.filtered_ids), ["2", "3", "1"]);

    let flags: Vec<bool> = view.materialized.iter().map(|r| r.selected).collect();
    assert_eq!(flags, [false, true, true]);
    assert_eq!(ids(&table.bulk_targets()), ["3", "1"]);
    assert_eq!(table.selected_count(), 2);
}

#[test]
fn test_range_follows_filtered_order() {
    let mut table = numbered_table(10);
    table.set_sort(vec![SortKey::desc("amt")]).unwrap();
    table.refresh().unwrap();

    table.dispatch(SelectionAction::Select(RowId::from(8))).unwrap();
    let changed = table
        .dispatch(SelectionAction::Range {
            target: RowId::from(5),
            extend: false,
        })
        .unwrap();
    assert!(changed);
    assert_eq!(ids(&table.bulk_targets()), ["8", "7", "6", "5"]);
    assert_eq!(table.selection().anchor(), Some(&RowId::from(8)));

    table
        .dispatch(SelectionAction::Range {
            target: RowId::from(1),
            extend: true,
        })
        .unwrap();
    assert_eq!(table.selected_count(), 8);
}

#[test]
fn test_filtered_out_rows_stay_selected_but_are_not_targets() {
    let mut table = ledger_table();
    table.refresh().unwrap();
    table.dispatch(SelectionAction::Select(RowId::from(1))).unwrap();

    table.set_filter("amt", ColumnFilter::number_range(Some(0.0), None)).unwrap();
    table.refresh().unwrap();
    assert!(table.bulk_targets().is_empty());
    assert!(table.selection().is_selected(&RowId::from(1)));

    table.clear_filter("amt");
    table.refresh().unwrap();
    assert_eq!(ids(&table.bulk_targets()), ["1"]);
}

#[test]
fn test_replacing_rows_drops_vanished_ids() {
    let mut table = ledger_table();
    table.refresh().unwrap();
    table.dispatch(SelectionAction::SelectAllVisible).unwrap();
    assert_eq!(table.selected_count(), 3);

    table
        .set_rows_json(serde_json::json!([
            {"id": 2, "amt": 100, "name": "Fabrikam"},
            {"id": 4, "amt": 7, "name": "Litware"},
        ]))
        .unwrap();
    table.refresh().unwrap();
    assert_eq!(ids(&table.selection().selected_ids()), ["2"]);
    assert_eq!(ids(&table.bulk_targets()), ["2"]);
}

#[test]
fn test_select_all_filtered_with_exclusions() {
    let mut table = numbered_table(20);
    table.set_filter("amt", ColumnFilter::number_range(Some(10.0), None)).unwrap();
    table.refresh().unwrap();

    table.dispatch(SelectionAction::SelectAllFiltered).unwrap();
    table.dispatch(SelectionAction::Deselect(RowId::from(12))).unwrap();
    assert!(table.selection().is_all_filtered());
    assert_eq!(table.selected_count(), 9);

    let targets = table.bulk_targets();
    assert_eq!(targets.len(), 9);
    assert!(!targets.contains(&RowId::from(12)));
    assert!(!table.selection().is_selected(&RowId::from(12)));
    assert!(table.selection().is_selected(&RowId::from(13)));

    table.dispatch(SelectionAction::Clear).unwrap();
    assert_eq!(table.selected_count(), 0);
}

#[tokio::test]
async fn test_resolver_supplies_targets_beyond_local_rows() {
    let mut table = DataTable::builder()
        .columns(ledger_columns())
        .rows_json(ledger())
        .select_all_resolver(Resolver(Ok(vec!["1", "2", "3", "40", "41"])))
        .build()
        .unwrap();
    table.refresh().unwrap();

    table.dispatch(SelectionAction::SelectAllFiltered).unwrap();
    table.dispatch(SelectionAction::Deselect(RowId::from(2))).unwrap();
    let resolved = table.resolve_all_filtered().await.unwrap();

    assert_eq!(resolved, 5);
    assert_eq!(ids(&table.bulk_targets()), ["1", "3", "40", "41"]);
    assert_eq!(table.selected_count(), 4);
}

#[tokio::test]
async fn test_resolver_failure_is_reported() {
    let sink = Collector::default();
    let mut table = DataTable::builder()
        .columns(ledger_columns())
        .rows_json(ledger())
        .select_all_resolver(Resolver(Err("index offline".into())))
        .error_sink(sink.clone())
        .build()
        .unwrap();
    table.refresh().unwrap();
    table.dispatch(SelectionAction::SelectAllFiltered).unwrap();

    let err = table.resolve_all_filtered().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::SelectionFailed);
    assert_eq!(sink.count(ErrorCode::SelectionFailed), 1);
    // Marker still covers the local filtered rows.
    assert_eq!(table.bulk_targets().len(), 3);
}

#[tokio::test]
async fn test_resolve_without_resolver_is_context_missing() {
    let mut table = ledger_table();
    let err = table.resolve_all_filtered().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ContextMissing);
}

#[test]
fn test_single_and_disabled_modes() {
    let mut table = DataTable::builder()
        .columns(ledger_columns())
        .rows_json(ledger())
        .config(TableConfig::default().selection_mode(SelectionMode::Single))
        .build()
        .unwrap();
    table.refresh().unwrap();

    table.dispatch(SelectionAction::Select(RowId::from(1))).unwrap();
    table.dispatch(SelectionAction::Select(RowId::from(2))).unwrap();
    assert_eq!(ids(&table.selection().selected_ids()), ["2"]);
    let err = table.dispatch(SelectionAction::SelectAllVisible).unwrap_err();
    assert_eq!(err.code, ErrorCode::SelectionFailed);

    let mut table = DataTable::builder()
        .columns(ledger_columns())
        .rows_json(ledger())
        .config(TableConfig::default().selection_mode(SelectionMode::None))
        .build()
        .unwrap();
    let err = table.dispatch(SelectionAction::Select(RowId::from(1))).unwrap_err();
    assert_eq!(err.code, ErrorCode::SelectionFailed);
    assert!(!table.dispatch(SelectionAction::Clear).unwrap());
}
