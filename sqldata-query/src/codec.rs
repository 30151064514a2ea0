//! Row table codec: typed shapes and records to and from [`RowTable`]s.
//!
//! Decoding walks the shape's descriptor tree for every row. Nested shapes
//! read from the same flat row through one case-insensitive column map, and
//! fields with no matching column keep their default value.
//!
//! Encoding takes its column list from the first item, then requires every
//! item to supply every column. Dates are written as `yyyy-MM-dd
//! HH:mm:ss.fff`, and dates before 1910 are written as null.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::error::{QueryError, QueryResult};
use crate::shape::{FieldDescriptor, ScalarType, Shape, ShapeDescriptor, descriptor_of};
use crate::table::{ColumnMap, RowTable};
use crate::value::{Record, format_wire_datetime, parse_datetime};

/// Format accepted by `chrono`'s `NaiveDateTime` deserializer.
const SERDE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ============================================================================
// Decode
// ============================================================================

/// Decode every row of `table` into `T`.
pub fn decode_rows<T: Shape>(table: &RowTable) -> QueryResult<Vec<T>> {
    let shape = descriptor_of::<T>();
    shape.validate()?;

    let columns = table.column_map();
    table
        .rows
        .iter()
        .map(|row| decode_row(&shape, row, &columns))
        .collect()
}

/// One leaf assigned while populating a row.
struct Assigned<'a> {
    field: &'a FieldDescriptor,
    scalar: ScalarType,
    raw: &'a Value,
}

static NULL: Value = Value::Null;

fn decode_row<T: Shape>(
    shape: &ShapeDescriptor,
    row: &[Value],
    columns: &ColumnMap,
) -> QueryResult<T> {
    let mut assigned = Vec::new();
    let item = build(shape, row, columns, None, &mut assigned)?;

    let err = match serde_json::from_value::<T>(item) {
        Ok(decoded) => return Ok(decoded),
        Err(e) => e,
    };

    // Coerced values can still be out of range for the field's Rust type.
    // Replay the leaves one at a time to name the rejected column.
    for (index, leaf) in assigned.iter().enumerate() {
        let single = build(shape, row, columns, Some(index), &mut Vec::new())?;
        if serde_json::from_value::<T>(single).is_err() {
            return Err(QueryError::conversion(
                leaf.field.source_name(),
                leaf.raw,
                leaf.scalar,
            ));
        }
    }

    Err(QueryError::deserialization(format!("{}: {}", shape.name(), err)).with_source(err))
}

fn build<'a>(
    shape: &'a ShapeDescriptor,
    row: &'a [Value],
    columns: &ColumnMap,
    only: Option<usize>,
    assigned: &mut Vec<Assigned<'a>>,
) -> QueryResult<Value> {
    let mut item = match shape.instantiate()? {
        Value::Object(map) => map,
        other => {
            return Err(QueryError::deserialization(format!(
                "shape {} does not serialize to an object: {}",
                shape.name(),
                other
            )));
        }
    };

    populate(shape, &mut item, row, columns, only, assigned)?;
    Ok(Value::Object(item))
}

/// Fill `target` from `row`. With `only`, just the leaf at that position is assigned.
fn populate<'a>(
    shape: &'a ShapeDescriptor,
    target: &mut Map<String, Value>,
    row: &'a [Value],
    columns: &ColumnMap,
    only: Option<usize>,
    assigned: &mut Vec<Assigned<'a>>,
) -> QueryResult<()> {
    for field in shape.fields() {
        if field.is_ignored() {
            continue;
        }

        let Some(scalar) = field.leaf_type() else {
            if let Some(nested) = field.nested_shape() {
                let slot = target
                    .entry(field.name().to_string())
                    .or_insert(Value::Null);
                if !slot.is_object() {
                    *slot = nested.instantiate()?;
                }
                if let Value::Object(inner) = slot {
                    populate(nested, inner, row, columns, only, assigned)?;
                }
            }
            continue;
        };

        let Some(index) = columns.get(field.source_name()) else {
            continue;
        };
        let raw = row.get(index).unwrap_or(&NULL);

        if let Some(value) = coerce(field, scalar, raw)? {
            let position = assigned.len();
            assigned.push(Assigned { field, scalar, raw });
            if only.is_none_or(|o| o == position) {
                target.insert(field.name().to_string(), value);
            }
        }
    }
    Ok(())
}

/// Coerce a raw wire value into the JSON form `serde` expects for the field.
///
/// Returns `None` when the field should keep its default (null into a
/// non-nullable field).
pub fn coerce(
    field: &FieldDescriptor,
    scalar: ScalarType,
    raw: &Value,
) -> QueryResult<Option<Value>> {
    if raw.is_null() {
        return Ok(field.is_nullable().then_some(Value::Null));
    }

    let fail = || QueryError::conversion(field.source_name(), raw, scalar);

    let value = match scalar {
        ScalarType::Bool => match raw {
            Value::Bool(_) => raw.clone(),
            Value::Number(n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => Value::Bool(parse_bool(s).ok_or_else(fail)?),
            _ => return Err(fail()),
        },
        ScalarType::Int => match raw {
            Value::Number(n) if n.is_i64() || n.is_u64() => raw.clone(),
            Value::Number(n) => Value::from(n.as_f64().and_then(narrow_to_i64).ok_or_else(fail)?),
            Value::String(s) => Value::from(s.trim().parse::<i64>().map_err(|_| fail())?),
            Value::Bool(b) => Value::from(i64::from(*b)),
            _ => return Err(fail()),
        },
        ScalarType::Float => match raw {
            Value::Number(_) => raw.clone(),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(fail)?,
            Value::Bool(b) => Value::from(if *b { 1.0 } else { 0.0 }),
            _ => return Err(fail()),
        },
        ScalarType::Decimal => {
            let text = match raw {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.trim().to_string(),
                _ => return Err(fail()),
            };
            let decimal = Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|_| fail())?;
            Value::String(decimal.to_string())
        }
        ScalarType::String => match raw {
            Value::String(_) => raw.clone(),
            other => Value::String(other.to_string()),
        },
        ScalarType::DateTime => match raw {
            Value::String(s) => {
                let dt = parse_datetime(s).ok_or_else(fail)?;
                Value::String(dt.format(SERDE_DATETIME_FORMAT).to_string())
            }
            _ => return Err(fail()),
        },
        ScalarType::Json => match raw {
            Value::String(s) if field.is_serialized_as_object() => {
                serde_json::from_str(s).map_err(|_| fail())?
            }
            _ => raw.clone(),
        },
    };

    Ok(Some(value))
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn narrow_to_i64(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round_ties_even();
    (rounded >= i64::MIN as f64 && rounded <= i64::MAX as f64).then_some(rounded as i64)
}

// ============================================================================
// Encode
// ============================================================================

/// An item that can be written as one row.
pub trait Encodable {
    /// Column names this item contributes, in order.
    fn column_names(&self) -> Vec<String>;

    /// Values for `columns`, in the same order. Fails if a column is missing.
    fn to_row(&self, columns: &[String]) -> QueryResult<Vec<Value>>;

    /// Table written to when the caller names none.
    fn table_hint() -> Option<String>
    where
        Self: Sized,
    {
        None
    }
}

impl<T: Shape> Encodable for T {
    fn column_names(&self) -> Vec<String> {
        descriptor_of::<T>().writable_columns()
    }

    fn to_row(&self, columns: &[String]) -> QueryResult<Vec<Value>> {
        let shape = descriptor_of::<T>();
        shape.validate()?;

        let value = serde_json::to_value(self).map_err(|e| {
            QueryError::serialization(format!("{}: {}", shape.name(), e)).with_source(e)
        })?;

        let mut flat = Map::new();
        flatten(&shape, &value, &mut flat)?;

        columns
            .iter()
            .map(|column| {
                flat.get(column)
                    .cloned()
                    .ok_or_else(|| QueryError::missing_field(column))
            })
            .collect()
    }

    fn table_hint() -> Option<String> {
        descriptor_of::<T>().table_name().map(str::to_string)
    }
}

impl Encodable for Record {
    fn column_names(&self) -> Vec<String> {
        self.keys().map(str::to_string).collect()
    }

    fn to_row(&self, columns: &[String]) -> QueryResult<Vec<Value>> {
        columns
            .iter()
            .map(|column| {
                self.get(column)
                    .map(|value| value.to_wire())
                    .ok_or_else(|| QueryError::missing_field(column))
            })
            .collect()
    }
}

fn flatten(shape: &ShapeDescriptor, item: &Value, out: &mut Map<String, Value>) -> QueryResult<()> {
    for field in shape.fields() {
        if !field.is_writable() {
            continue;
        }

        // A null nested object contributes nulls for all of its columns.
        let value = match item {
            Value::Null => &Value::Null,
            Value::Object(map) => map
                .get(field.name())
                .ok_or_else(|| QueryError::missing_field(field.name()))?,
            other => {
                return Err(QueryError::serialization(format!(
                    "shape {} serialized to a non-object: {}",
                    shape.name(),
                    other
                )));
            }
        };

        match (field.leaf_type(), field.nested_shape()) {
            (None, Some(nested)) => flatten(nested, value, out)?,
            (Some(scalar), _) => {
                out.insert(field.source_name().to_string(), to_wire(field, scalar, value)?);
            }
            (None, None) => {}
        }
    }
    Ok(())
}

fn to_wire(field: &FieldDescriptor, scalar: ScalarType, value: &Value) -> QueryResult<Value> {
    match (scalar, value) {
        (_, Value::Null) => Ok(Value::Null),
        (ScalarType::DateTime, Value::String(s)) => {
            let dt = parse_datetime(s)
                .ok_or_else(|| QueryError::conversion(field.name(), value, scalar))?;
            Ok(format_wire_datetime(&dt)
                .map(Value::String)
                .unwrap_or(Value::Null))
        }
        (ScalarType::Json, _) if field.is_serialized_as_object() => {
            Ok(Value::String(value.to_string()))
        }
        _ => Ok(value.clone()),
    }
}

/// Encode `items` into a write payload.
///
/// Columns come from the first item; an empty slice gives an empty table.
pub fn encode_rows<I: Encodable>(items: &[I]) -> QueryResult<RowTable> {
    let Some(first) = items.first() else {
        return Ok(RowTable::default());
    };
    encode_rows_with(&first.column_names(), items)
}

/// Encode `items` against a fixed column list. Every item must supply every column.
pub fn encode_rows_with<I: Encodable>(columns: &[String], items: &[I]) -> QueryResult<RowTable> {
    let rows = items
        .iter()
        .map(|item| item.to_row(columns))
        .collect::<QueryResult<Vec<_>>>()?;

    Ok(RowTable {
        field_names: columns.to_vec(),
        field_data_types: None,
        rows,
    })
}

/// Encode a single item as a wire-named JSON object.
pub fn encode_object<I: Encodable>(item: &I) -> QueryResult<Map<String, Value>> {
    let columns = item.column_names();
    let row = item.to_row(&columns)?;
    Ok(columns.into_iter().zip(row).collect())
}
