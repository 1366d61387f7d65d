use super::{OperationError, OperationHandler, OperationOutput, ProgressSink, Table};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Handler for `sql/generate-to-text`: emits a `CREATE TABLE` plus one
/// `INSERT` per row, all as a single text artifact.
pub struct GenerateToText;

impl OperationHandler for GenerateToText {
    fn invoke(
        &self,
        table: &Table,
        args: &BTreeMap<String, JsonValue>,
        progress: &dyn ProgressSink,
    ) -> Result<OperationOutput, OperationError> {
        let table_name = args
            .get("table_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OperationError::Failed("missing `table_name` argument".to_string()))?;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "CREATE TABLE {table_name} ({});",
            table
                .headers
                .iter()
                .map(|h| format!("{h} TEXT"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        progress.report(20);

        let total = table.rows.len().max(1);
        for (i, row) in table.rows.iter().enumerate() {
            let values = row
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "INSERT INTO {table_name} VALUES ({values});");
            progress.report(20 + (70 * (i + 1) / total) as u8);
        }

        Ok(OperationOutput::Text(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::NoopProgressSink;
    use serde_json::json;

    #[test]
    fn generates_create_and_insert_statements() {
        let table = Table::new(
            vec!["name".to_string()],
            vec![vec!["Ada".to_string()]],
        );
        let mut args = BTreeMap::new();
        args.insert("table_name".to_string(), json!("people"));
        let out = GenerateToText
            .invoke(&table, &args, &NoopProgressSink)
            .expect("invoke");
        match out {
            OperationOutput::Text(text) => {
                assert!(text.contains("CREATE TABLE people"));
                assert!(text.contains("INSERT INTO people VALUES ('Ada')"));
            }
            _ => panic!("expected text output"),
        }
    }
}
