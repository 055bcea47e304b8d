/// Arrow schema definitions for the audit tables.
///
/// Every audit backend returns reads in these shapes, so callers can render or
/// export interactions without knowing which store produced them.
pub mod audit {
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

    pub const INTERACTIONS_TABLE: &str = "interactions";
    pub const CITATIONS_TABLE: &str = "interaction_citations";
    pub const DOCUMENTS_TABLE: &str = "interaction_documents";

    /// Schema for the interaction table (one row per completed request).
    pub fn interaction_schema() -> Schema {
        Schema::new(vec![
            Field::new("interaction_id", DataType::Utf8, false),
            Field::new(
                "timestamp",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("request_kind", DataType::Utf8, false),
            Field::new("input_digest", DataType::Utf8, false),
            Field::new("output", DataType::Utf8, false),
            Field::new("status", DataType::Utf8, false),
            Field::new("confidence", DataType::Float32, false),
            Field::new("tool_used", DataType::Utf8, true),
        ])
    }

    /// Schema for citation rows, foreign-keyed to `interaction_id`.
    pub fn citation_schema() -> Schema {
        Schema::new(vec![
            Field::new("interaction_id", DataType::Utf8, false),
            Field::new("position", DataType::Int32, false),
            Field::new("standard", DataType::Utf8, false),
            Field::new("paragraph", DataType::Utf8, true),
            Field::new("section", DataType::Utf8, true),
        ])
    }

    /// Schema for document-association rows, foreign-keyed to `interaction_id`.
    pub fn document_schema() -> Schema {
        Schema::new(vec![
            Field::new("interaction_id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::audit;

    #[test]
    fn interaction_schema_has_expected_fields() {
        let schema = audit::interaction_schema();
        assert_eq!(schema.fields().len(), 9);
        assert!(schema.field_with_name("input_digest").is_ok());
        assert!(schema.field_with_name("tool_used").unwrap().is_nullable());
    }

    #[test]
    fn child_tables_key_on_interaction_id() {
        for schema in [audit::citation_schema(), audit::document_schema()] {
            let key = schema.field(0);
            assert_eq!(key.name(), "interaction_id");
            assert!(!key.is_nullable());
        }
    }
}
