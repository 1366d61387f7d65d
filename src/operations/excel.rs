use super::{OperationError, OperationHandler, OperationOutput, ProgressSink, Table};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Handler for `excel/extract-columns-to-file`: projects the requested
/// columns, optionally deduplicating rows.
pub struct ExtractColumnsToFile;

impl OperationHandler for ExtractColumnsToFile {
    fn invoke(
        &self,
        table: &Table,
        args: &BTreeMap<String, JsonValue>,
        progress: &dyn ProgressSink,
    ) -> Result<OperationOutput, OperationError> {
        let columns = args
            .get("columns")
            .and_then(|v| v.as_array())
            .ok_or_else(|| OperationError::Failed("missing `columns` argument".to_string()))?
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();

        let indices = columns
            .iter()
            .map(|name| {
                table
                    .column_index(name)
                    .ok_or_else(|| OperationError::Failed(format!("unknown column `{name}`")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        progress.report(25);

        let remove_duplicates = args
            .get("remove_duplicates")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let mut seen = std::collections::HashSet::new();
        let mut rows = Vec::new();
        for row in &table.rows {
            let projected: Vec<String> = indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect();
            if remove_duplicates {
                let key = projected.join("\u{1f}");
                if !seen.insert(key) {
                    continue;
                }
            }
            rows.push(projected);
        }

        progress.report(90);

        Ok(OperationOutput::Table(Table::new(columns, rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::NoopProgressSink;
    use serde_json::json;

    #[test]
    fn projects_requested_columns() {
        let table = Table::new(
            vec!["name".to_string(), "email".to_string(), "age".to_string()],
            vec![vec!["Ada".to_string(), "ada@x.com".to_string(), "30".to_string()]],
        );
        let mut args = BTreeMap::new();
        args.insert("columns".to_string(), json!(["name", "email"]));
        let out = ExtractColumnsToFile
            .invoke(&table, &args, &NoopProgressSink)
            .expect("invoke");
        match out {
            OperationOutput::Table(t) => {
                assert_eq!(t.headers, vec!["name", "email"]);
                assert_eq!(t.rows[0], vec!["Ada", "ada@x.com"]);
            }
            _ => panic!("expected table output"),
        }
    }

    #[test]
    fn unknown_column_fails() {
        let table = Table::new(vec!["name".to_string()], vec![vec!["Ada".to_string()]]);
        let mut args = BTreeMap::new();
        args.insert("columns".to_string(), json!(["missing"]));
        let err = ExtractColumnsToFile
            .invoke(&table, &args, &NoopProgressSink)
            .expect_err("should fail");
        assert!(matches!(err, OperationError::Failed(_)));
    }

    #[test]
    fn removes_duplicate_rows_when_requested() {
        let table = Table::new(
            vec!["name".to_string()],
            vec![vec!["Ada".to_string()], vec!["Ada".to_string()]],
        );
        let mut args = BTreeMap::new();
        args.insert("columns".to_string(), json!(["name"]));
        args.insert("remove_duplicates".to_string(), json!(true));
        let out = ExtractColumnsToFile
            .invoke(&table, &args, &NoopProgressSink)
            .expect("invoke");
        match out {
            OperationOutput::Table(t) => assert_eq!(t.rows.len(), 1),
            _ => panic!("expected table output"),
        }
    }
}
