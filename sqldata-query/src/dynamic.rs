//! Dynamic row decoding.
//!
//! When no static shape is known, each row becomes a [`Record`] keyed by the
//! table's column names. Values are coerced by the column's declared
//! [`ColumnType`] rather than by a target field type.

use serde_json::Value;

use crate::codec::parse_bool;
use crate::error::{QueryError, QueryResult};
use crate::table::{ColumnType, RowTable};
use crate::value::{FieldValue, Record, parse_datetime};

/// Decode every row of `table` into a [`Record`].
///
/// Tables without declared column types keep each value's JSON kind.
pub fn decode_dynamic(table: &RowTable) -> QueryResult<Vec<Record>> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut record = Record::with_capacity(table.field_names.len());
            for (index, name) in table.field_names.iter().enumerate() {
                let raw = row.get(index).unwrap_or(&Value::Null);
                let value = match table.column_type(index) {
                    Some(column_type) => coerce_column(name, column_type, raw)?,
                    None => FieldValue::from(raw.clone()),
                };
                record.insert(name.clone(), value);
            }
            Ok(record)
        })
        .collect()
}

/// Coerce one raw value by its declared column type.
pub fn coerce_column(
    column: &str,
    column_type: ColumnType,
    raw: &Value,
) -> QueryResult<FieldValue> {
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }

    let fail = || QueryError::conversion(column, raw, column_type);

    let value = match column_type {
        ColumnType::DateTime => match raw {
            Value::String(s) => FieldValue::DateTime(parse_datetime(s).ok_or_else(fail)?),
            _ => return Err(fail()),
        },
        ColumnType::FloatNumber => match raw {
            Value::Number(n) => FieldValue::Float(n.as_f64().ok_or_else(fail)?),
            Value::String(s) => FieldValue::Float(s.trim().parse().map_err(|_| fail())?),
            _ => return Err(fail()),
        },
        ColumnType::WholeNumber => match raw {
            Value::Number(n) => FieldValue::Int(n.as_i64().ok_or_else(fail)?),
            Value::String(s) => FieldValue::Int(s.trim().parse().map_err(|_| fail())?),
            _ => return Err(fail()),
        },
        ColumnType::Boolean => match raw {
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => FieldValue::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => FieldValue::Bool(parse_bool(s).ok_or_else(fail)?),
            _ => return Err(fail()),
        },
        ColumnType::String
        | ColumnType::LargeString
        | ColumnType::Text
        | ColumnType::Binary
        | ColumnType::BigIntNumber => match raw {
            Value::String(s) => FieldValue::String(s.clone()),
            other => FieldValue::String(other.to_string()),
        },
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn typed_table(columns: &[(&str, ColumnType)], rows: Vec<Vec<Value>>) -> RowTable {
        RowTable {
            field_names: columns.iter().map(|(n, _)| n.to_string()).collect(),
            field_data_types: Some(columns.iter().map(|(_, t)| *t).collect()),
            rows,
        }
    }

    #[test]
    fn test_coerces_by_declared_type() {
        let table = typed_table(
            &[
                ("Qty", ColumnType::WholeNumber),
                ("Price", ColumnType::FloatNumber),
                ("Active", ColumnType::Boolean),
                ("Created", ColumnType::DateTime),
                ("Country", ColumnType::String),
            ],
            vec![vec![json!("3"), json!("2.5"), json!("true"), json!("2017-02-25"), json!("UK")]],
        );

        let records = decode_dynamic(&table).unwrap();
        let record = &records[0];
        assert_eq!(record.get("Qty"), Some(&FieldValue::Int(3)));
        assert_eq!(record.get("Price"), Some(&FieldValue::Float(2.5)));
        assert_eq!(record.get("Active"), Some(&FieldValue::Bool(true)));
        assert_eq!(
            record.get("Created"),
            Some(&FieldValue::DateTime(
                NaiveDate::from_ymd_opt(2017, 2, 25).unwrap().and_hms_opt(0, 0, 0).unwrap()
            ))
        );
        assert_eq!(record.get("Country"), Some(&FieldValue::String("UK".into())));
    }

    #[test]
    fn test_keys_follow_column_order() {
        let table = typed_table(
            &[("B", ColumnType::String), ("A", ColumnType::String)],
            vec![vec![json!("1"), json!("2")]],
        );
        let records = decode_dynamic(&table).unwrap();
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["B", "A"]);
    }

    #[test]
    fn test_null_stays_null() {
        let table = typed_table(&[("Qty", ColumnType::WholeNumber)], vec![vec![Value::Null]]);
        let records = decode_dynamic(&table).unwrap();
        assert_eq!(records[0].get("Qty"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_big_int_kept_as_text() {
        let table = typed_table(
            &[("Id", ColumnType::BigIntNumber)],
            vec![vec![json!(9007199254740993_i64)]],
        );
        let records = decode_dynamic(&table).unwrap();
        assert_eq!(
            records[0].get("Id"),
            Some(&FieldValue::String("9007199254740993".into()))
        );
    }

    #[test]
    fn test_malformed_value_names_column() {
        let table = typed_table(&[("Qty", ColumnType::WholeNumber)], vec![vec![json!("three")]]);
        let err = decode_dynamic(&table).unwrap_err();
        assert!(err.is_marshalling_error());
        assert_eq!(err.context.field.as_deref(), Some("Qty"));
        assert_eq!(err.context.value.as_deref(), Some("\"three\""));
    }

    #[test]
    fn test_untyped_table_keeps_json_kinds() {
        let table = RowTable {
            field_names: vec!["A".into(), "B".into()],
            field_data_types: None,
            rows: vec![vec![json!(1), json!("x")]],
        };
        let records = decode_dynamic(&table).unwrap();
        assert_eq!(records[0].get("A"), Some(&FieldValue::Int(1)));
        assert_eq!(records[0].get("B"), Some(&FieldValue::String("x".into())));
    }
}
