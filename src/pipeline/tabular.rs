//! CSV ↔ JSON transforms on top of the `csv` crate.
//!
//! Input is read with quoting disabled: a `"` is data, not a field
//! delimiter, and rows of any width are accepted. On output the writer quotes
//! only where needed (delimiter, quote, line break) and doubles inner quotes.
//! JSON objects keep key order (`serde_json` with `preserve_order`), so a
//! CSV → JSON → CSV round trip reproduces the header order.

use crate::error::ConvertError;
use csv::{ReaderBuilder, StringRecord, Terminator, Trim, WriterBuilder};
use serde_json::{Map, Value};
use tracing::debug;

/// Convert delimited text to a pretty-printed JSON array of objects.
///
/// The first non-blank line is the header. Each following non-blank line
/// becomes one object keyed by header; short rows are padded with `""` and
/// surplus fields are dropped. A header-only input yields `[]`.
pub fn csv_to_json(input: &[u8], delimiter: u8) -> Result<Vec<u8>, ConvertError> {
    let text = std::str::from_utf8(input).map_err(|e| ConvertError::Decode {
        detail: format!("CSV input is not valid UTF-8: {e}"),
    })?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .quoting(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = reader
        .records()
        .filter(|r| !matches!(r, Ok(record) if is_blank(record)));

    let headers: Vec<String> = match records.next() {
        Some(header) => header
            .map_err(read_error)?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Err(ConvertError::EmptyInput),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(read_error)?;
        let obj: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let v = record.get(i).unwrap_or("");
                (h.clone(), Value::String(v.to_string()))
            })
            .collect();
        rows.push(Value::Object(obj));
    }

    debug!("CSV → JSON: {} columns, {} rows", headers.len(), rows.len());

    serde_json::to_vec_pretty(&Value::Array(rows))
        .map_err(|e| ConvertError::Internal(format!("JSON serialisation failed: {e}")))
}

/// A whitespace-only line. A line of empty fields (`"\t"` with a tab
/// delimiter) has more than one field and is kept.
fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(str::is_empty)
}

fn read_error(e: csv::Error) -> ConvertError {
    ConvertError::Decode {
        detail: format!("could not read CSV: {e}"),
    }
}

/// Convert a JSON array of objects to delimited text.
///
/// The header is the key set of the first element, in its order. Rows are
/// joined with `\n` and there is no trailing newline.
pub fn json_to_csv(input: &[u8], delimiter: u8) -> Result<Vec<u8>, ConvertError> {
    let value: Value = serde_json::from_slice(input).map_err(|e| ConvertError::Schema {
        detail: format!("could not parse JSON: {e}"),
    })?;

    let rows = match value {
        Value::Array(rows) if !rows.is_empty() => rows,
        Value::Array(_) => {
            return Err(ConvertError::Schema {
                detail: "expected a non-empty array of objects, got an empty array".into(),
            })
        }
        other => {
            return Err(ConvertError::Schema {
                detail: format!(
                    "expected a non-empty array of objects, got {}",
                    json_type_name(&other)
                ),
            })
        }
    };

    let headers: Vec<String> = match &rows[0] {
        Value::Object(first) => first.keys().cloned().collect(),
        other => {
            return Err(ConvertError::Schema {
                detail: format!("element 0 is {}, expected an object", json_type_name(other)),
            })
        }
    };

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&headers).map_err(write_error)?;

    for (i, row) in rows.iter().enumerate() {
        let obj = row.as_object().ok_or_else(|| ConvertError::Schema {
            detail: format!("element {i} is {}, expected an object", json_type_name(row)),
        })?;
        writer
            .write_record(headers.iter().map(|h| coerce(obj.get(h))))
            .map_err(write_error)?;
    }

    let mut out = writer
        .into_inner()
        .map_err(|e| ConvertError::Internal(format!("CSV writer flush failed: {e}")))?;
    if out.last() == Some(&b'\n') {
        out.pop();
    }

    debug!("JSON → CSV: {} columns, {} rows", headers.len(), rows.len());
    Ok(out)
}

fn write_error(e: csv::Error) -> ConvertError {
    ConvertError::Internal(format!("CSV serialisation failed: {e}"))
}

/// String form of a JSON value for a CSV cell.
fn coerce(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => nested.to_string(),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
