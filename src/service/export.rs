//! CSV rendering for table exports.

use crate::error::AppError;
use csv::Writer;
use serde_json::Value;

fn cell(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Header row = `columns`; one record per row object. Missing keys render empty.
pub fn rows_to_csv(columns: &[String], rows: &[Value]) -> Result<Vec<u8>, AppError> {
    let mut wtr = Writer::from_writer(Vec::new());
    let to_err = |e: csv::Error| AppError::Internal(format!("csv: {}", e));
    wtr.write_record(columns).map_err(to_err)?;
    for row in rows {
        let record: Vec<String> = columns.iter().map(|c| cell(row.get(c))).collect();
        wtr.write_record(&record).map_err(to_err)?;
    }
    wtr.into_inner()
        .map_err(|e| AppError::Internal(format!("csv: {}", e.error())))
}

/// `<segment>-<YYYY-MM-DD>.csv`
pub fn export_filename(segment: &str, today: chrono::NaiveDate) -> String {
    format!("{}-{}.csv", segment, today.format("%Y-%m-%d"))
}
