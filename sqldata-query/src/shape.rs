//! Shape descriptors.
//!
//! A shape is described once by an explicit [`ShapeDescriptor`]: the list of
//! its fields with their wire names, declared types and mapping options. The
//! projection generator and both directions of the row codec walk the same
//! descriptor tree, so nothing here depends on inspecting live values.
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use sqldata_query::shape::{FieldDescriptor, ScalarType, Shape, ShapeDescriptor};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Order {
//!     order_id: i64,
//!     country: String,
//! }
//!
//! impl Shape for Order {
//!     fn describe() -> ShapeDescriptor {
//!         ShapeDescriptor::new::<Self>("Order")
//!             .table("dbo.Orders")
//!             .field(FieldDescriptor::scalar("order_id", ScalarType::Int).source("OrderId"))
//!             .field(FieldDescriptor::scalar("country", ScalarType::String).source("Country"))
//!     }
//! }
//!
//! let descriptor = sqldata_query::shape::descriptor_of::<Order>();
//! assert_eq!(descriptor.fields().len(), 2);
//! ```

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::trace;

use crate::error::{QueryError, QueryResult};

/// Declared type of a leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `bool`.
    Bool,
    /// Any integer type.
    Int,
    /// `f32` / `f64`.
    Float,
    /// `rust_decimal::Decimal`.
    Decimal,
    /// `String`.
    String,
    /// `chrono::NaiveDateTime`.
    DateTime,
    /// Any serde value; passed through as JSON.
    Json,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Type of a field: a leaf or a nested compound.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Leaf value stored in one column.
    Scalar(ScalarType),
    /// Nested shape populated from the same flat row.
    Nested(Arc<ShapeDescriptor>),
}

/// Mapping metadata for one field of a shape.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    source_name: String,
    field_type: FieldType,
    nullable: bool,
    sql_expression: Option<String>,
    ignore: bool,
    prefix: Option<String>,
    serialize_as_object: bool,
}

impl FieldDescriptor {
    fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            source_name: name.clone(),
            name,
            field_type,
            nullable: false,
            sql_expression: None,
            ignore: false,
            prefix: None,
            serialize_as_object: false,
        }
    }

    /// A leaf field. `name` is the serde key; the wire name defaults to it.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar))
    }

    /// A nested compound field populated from the same row.
    pub fn nested<T: Shape>(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Nested(descriptor_of::<T>()))
    }

    /// A nested compound field with an explicit descriptor.
    pub fn nested_with(name: impl Into<String>, descriptor: Arc<ShapeDescriptor>) -> Self {
        Self::new(name, FieldType::Nested(descriptor))
    }

    /// Set the wire (column) name.
    pub fn source(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    /// Mark the field as `Option<_>`: null wire values are assigned as null.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Compute the field on the server with a SQL expression.
    pub fn expression(mut self, sql_expression: impl Into<String>) -> Self {
        self.sql_expression = Some(sql_expression.into());
        self
    }

    /// Exclude the field from projection and marshalling.
    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Qualify the nested shape's columns with this alias in the projection.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Store the value as JSON text in a single column.
    pub fn serialize_as_object(mut self) -> Self {
        self.serialize_as_object = true;
        self
    }

    /// The serde key of the field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire (column) name.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The declared type.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// The declared scalar type, for leaf fields.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.field_type {
            FieldType::Scalar(scalar) => Some(scalar),
            FieldType::Nested(_) => None,
        }
    }

    /// How the field occupies a single column, or `None` when it spreads over
    /// the nested shape's columns. Nested fields stored as JSON text are `Json` leaves.
    pub fn leaf_type(&self) -> Option<ScalarType> {
        match self.field_type {
            FieldType::Scalar(scalar) => Some(scalar),
            FieldType::Nested(_) if self.serialize_as_object => Some(ScalarType::Json),
            FieldType::Nested(_) => None,
        }
    }

    /// The nested descriptor, for compound fields.
    pub fn nested_shape(&self) -> Option<&Arc<ShapeDescriptor>> {
        match &self.field_type {
            FieldType::Nested(shape) => Some(shape),
            FieldType::Scalar(_) => None,
        }
    }

    /// Whether null is a valid value.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The server-side expression, if any.
    pub fn sql_expression(&self) -> Option<&str> {
        self.sql_expression.as_deref()
    }

    /// Whether the field is skipped entirely.
    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    /// The projection alias for nested columns.
    pub fn prefix_alias(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Whether the value travels as JSON text.
    pub fn is_serialized_as_object(&self) -> bool {
        self.serialize_as_object
    }

    /// Whether the field is sent on writes: not ignored and not computed.
    pub fn is_writable(&self) -> bool {
        !self.ignore && self.sql_expression.is_none()
    }
}

type Template = fn() -> serde_json::Result<serde_json::Value>;

fn template_of<T: Serialize + Default>() -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(T::default())
}

/// Field descriptor table for one shape.
#[derive(Clone)]
pub struct ShapeDescriptor {
    name: String,
    table: Option<String>,
    fields: Vec<FieldDescriptor>,
    template: Template,
}

impl fmt::Debug for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeDescriptor")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("fields", &self.fields)
            .finish()
    }
}

impl ShapeDescriptor {
    /// Start a descriptor for `T`; default instances of `T` seed decoding.
    pub fn new<T: Serialize + Default>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
            template: template_of::<T>,
        }
    }

    /// Default table or view for this shape.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Append a field. Declaration order is projection and column order.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Shape name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default table or view, if declared.
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// A fresh default instance as a JSON value.
    pub fn instantiate(&self) -> QueryResult<serde_json::Value> {
        (self.template)().map_err(|e| {
            QueryError::serialization(format!("cannot build a default {}: {}", self.name, e))
        })
    }

    /// Wire names of all writable leaves, depth first.
    pub fn writable_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        self.collect_writable(&mut columns);
        columns
    }

    fn collect_writable(&self, out: &mut Vec<String>) {
        for field in &self.fields {
            if !field.is_writable() {
                continue;
            }
            match (field.leaf_type(), field.nested_shape()) {
                (None, Some(nested)) => nested.collect_writable(out),
                _ => out.push(field.source_name.clone()),
            }
        }
    }

    /// Check the tree for empty names, empty prefixes and clashing wire names.
    pub fn validate(&self) -> QueryResult<()> {
        let mut seen = HashSet::new();
        self.validate_into(&mut seen)
    }

    fn validate_into(&self, seen: &mut HashSet<String>) -> QueryResult<()> {
        for field in &self.fields {
            if field.ignore {
                continue;
            }
            if field.name.is_empty() || field.source_name.trim().is_empty() {
                return Err(QueryError::invalid_configuration(format!(
                    "shape {} has a field without a name",
                    self.name
                )));
            }
            if matches!(field.prefix.as_deref(), Some(p) if p.trim().is_empty()) {
                return Err(QueryError::invalid_configuration(format!(
                    "field {}.{} declares an empty prefix",
                    self.name, field.name
                ))
                .with_field(&field.name));
            }
            match (field.leaf_type(), field.nested_shape()) {
                (None, Some(nested)) => nested.validate_into(seen)?,
                _ => {
                    if !seen.insert(field.source_name.to_lowercase()) {
                        return Err(QueryError::invalid_configuration(format!(
                            "column '{}' is mapped more than once in shape {}",
                            field.source_name, self.name
                        ))
                        .with_field(&field.source_name));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A statically known record type with a field descriptor table.
///
/// `Default` seeds decoding: fields without a matching column keep their
/// default value.
pub trait Shape: Serialize + DeserializeOwned + Default + Send + 'static {
    /// Build the descriptor. Called once per type; use [`descriptor_of`].
    fn describe() -> ShapeDescriptor;
}

static DESCRIPTORS: LazyLock<RwLock<HashMap<TypeId, Arc<ShapeDescriptor>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Get the cached descriptor of `T`, building it on first use.
pub fn descriptor_of<T: Shape>() -> Arc<ShapeDescriptor> {
    let id = TypeId::of::<T>();
    if let Some(found) = DESCRIPTORS.read().get(&id) {
        return Arc::clone(found);
    }

    // Built outside the lock: describe() may resolve nested shapes.
    let built = Arc::new(T::describe());
    trace!(shape = %built.name(), fields = built.fields().len(), "Shape descriptor built");

    Arc::clone(DESCRIPTORS.write().entry(id).or_insert(built))
}
