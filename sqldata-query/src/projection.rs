//! Select-clause generation from shape descriptors.
//!
//! Fields are emitted depth first in declaration order. Nested shapes are
//! spliced in place, so one flat row can populate a tree of objects:
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use sqldata_query::projection::projection;
//! use sqldata_query::shape::{descriptor_of, FieldDescriptor, ScalarType, Shape, ShapeDescriptor};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Line { qty: i64, price: f64, total: f64 }
//!
//! impl Shape for Line {
//!     fn describe() -> ShapeDescriptor {
//!         ShapeDescriptor::new::<Self>("Line")
//!             .field(FieldDescriptor::scalar("qty", ScalarType::Int).source("Qty"))
//!             .field(FieldDescriptor::scalar("price", ScalarType::Float).source("Price"))
//!             .field(
//!                 FieldDescriptor::scalar("total", ScalarType::Float)
//!                     .source("Total")
//!                     .expression("Qty * Price"),
//!             )
//!     }
//! }
//!
//! assert_eq!(projection(&descriptor_of::<Line>()), "Qty, Price, Qty * Price Total");
//! ```

use crate::shape::ShapeDescriptor;

/// Build the select clause for a shape, joined with `", "`.
pub fn projection(shape: &ShapeDescriptor) -> String {
    projection_list(shape).join(", ")
}

/// Build the ordered list of select items for a shape.
pub fn projection_list(shape: &ShapeDescriptor) -> Vec<String> {
    let mut out = Vec::new();
    collect(shape, None, &mut out);
    out
}

fn collect(shape: &ShapeDescriptor, prefix: Option<&str>, out: &mut Vec<String>) {
    for field in shape.fields() {
        if field.is_ignored() {
            continue;
        }

        if let (None, Some(nested)) = (field.leaf_type(), field.nested_shape()) {
            collect(nested, field.prefix_alias().or(prefix), out);
            continue;
        }

        match (field.sql_expression(), prefix) {
            (Some(expression), _) => out.push(format!("{} {}", expression, field.source_name())),
            (None, Some(alias)) => out.push(format!("{}.{}", alias, field.source_name())),
            (None, None) => out.push(field.source_name().to_string()),
        }
    }
}
