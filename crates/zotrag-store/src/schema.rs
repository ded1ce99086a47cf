//! Arrow schema of the `docling` table.

use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Schema for passage records.
///
/// The metadata columns mirror [`RecordMetadata`](zotrag_core::RecordMetadata)
/// and are all nullable.
#[must_use]
pub fn passages_schema(embedding_dim: usize) -> Schema {
    Schema::new(vec![
        // Identity
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        // Embedding
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                embedding_dim as i32,
            ),
            false,
        ),
        // Metadata
        Field::new("creators", DataType::Utf8, true),
        Field::new("date", DataType::Utf8, true),
        Field::new("item_type", DataType::Utf8, true),
        Field::new(
            "page_numbers",
            DataType::List(Arc::new(Field::new("item", DataType::UInt32, true))),
            true,
        ),
        Field::new("title", DataType::Utf8, true),
        Field::new("zotero_key", DataType::Utf8, true),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_column_has_fixed_dimension() {
        let schema = passages_schema(3072);
        let field = schema.field_with_name("vector").unwrap();
        match field.data_type() {
            DataType::FixedSizeList(_, size) => assert_eq!(*size, 3072),
            other => panic!("unexpected type {other:?}"),
        }
    }

    #[test]
    fn test_metadata_columns_are_nullable() {
        let schema = passages_schema(8);
        for name in ["creators", "date", "item_type", "page_numbers", "title", "zotero_key"] {
            assert!(schema.field_with_name(name).unwrap().is_nullable(), "{name}");
        }
        assert!(!schema.field_with_name("text").unwrap().is_nullable());
    }
}
