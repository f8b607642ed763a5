//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use tabula_lib::column::Column;
use tabula_lib::error::DataTableError;
use tabula_lib::error::ErrorCode;
use tabula_lib::group::Aggregation;
use tabula_lib::model::Row;
use tabula_lib::model::RowId;
use tabula_lib::model::Value;
use tabula_lib::recovery::ErrorSink;

/// Error sink that keeps everything it is handed.
#[derive(Clone, Default)]
pub struct Collector {
    errors: Arc<Mutex<Vec<DataTableError>>>,
}

impl Collector {
    pub fn errors(&self) -> Vec<DataTableError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn count(&self, code: ErrorCode) -> usize {
        self.errors().iter().filter(|e| e.code == code).count()
    }

    pub fn clear(&self) {
        self.errors.lock().unwrap().clear();
    }
}

impl ErrorSink for Collector {
    fn report(&self, error: &DataTableError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

/// `[{1, -50}, {2, 100}, {3, 100}]`.
pub fn ledger() -> serde_json::Value {
    serde_json::json!([
        {"id": 1, "amt": -50, "name": "Contoso"},
        {"id": 2, "amt": 100, "name": "Fabrikam"},
        {"id": 3, "amt": 100, "name": "Northwind"},
    ])
}

/// `id`, `amt` (summed), `name`, and a derived `sign` column.
pub fn ledger_columns() -> Vec<Column> {
    vec![
        Column::new("id"),
        Column::new("amt").aggregate(Aggregation::Sum).editable(),
        Column::new("name").editable(),
        Column::new("sign").accessor(Arc::new(|row: &Row| {
            let negative = row.get("amt").and_then(Value::as_f64).is_some_and(|v| v < 0.0);
            Value::from(if negative { "neg" } else { "pos" })
        })),
    ]
}

/// `n` rows with ids `0..n` and `amt = id`.
pub fn numbered(n: usize) -> Vec<Row> {
    (0..n as i64).map(|i| Row::new(i).set("id", i).set("amt", i)).collect()
}

pub fn ids(ids: &[RowId]) -> Vec<&str> {
    ids.iter().map(RowId::as_str).collect()
}
