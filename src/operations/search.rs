use super::{OperationError, OperationHandler, OperationOutput, ProgressSink, Table};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Handler for `search/filter-rows`: keeps rows where the named column
/// contains the given substring (case-insensitive).
pub struct FilterRows;

impl OperationHandler for FilterRows {
    fn invoke(
        &self,
        table: &Table,
        args: &BTreeMap<String, JsonValue>,
        progress: &dyn ProgressSink,
    ) -> Result<OperationOutput, OperationError> {
        let column = args
            .get("column")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OperationError::Failed("missing `column` argument".to_string()))?;
        let needle = args
            .get("contains")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OperationError::Failed("missing `contains` argument".to_string()))?
            .to_lowercase();

        let index = table
            .column_index(column)
            .ok_or_else(|| OperationError::Failed(format!("unknown column `{column}`")))?;

        let total = table.rows.len().max(1);
        let mut rows = Vec::new();
        for (i, row) in table.rows.iter().enumerate() {
            if row
                .get(index)
                .map(|cell| cell.to_lowercase().contains(&needle))
                .unwrap_or(false)
            {
                rows.push(row.clone());
            }
            progress.report((100 * (i + 1) / total) as u8);
        }

        Ok(OperationOutput::Table(Table::new(table.headers.clone(), rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::NoopProgressSink;
    use serde_json::json;

    #[test]
    fn keeps_only_matching_rows() {
        let table = Table::new(
            vec!["name".to_string(), "city".to_string()],
            vec![
                vec!["Ada".to_string(), "Boston".to_string()],
                vec!["Grace".to_string(), "New York".to_string()],
            ],
        );
        let mut args = BTreeMap::new();
        args.insert("column".to_string(), json!("city"));
        args.insert("contains".to_string(), json!("york"));
        let out = FilterRows.invoke(&table, &args, &NoopProgressSink).expect("invoke");
        match out {
            OperationOutput::Table(t) => {
                assert_eq!(t.rows.len(), 1);
                assert_eq!(t.rows[0][0], "Grace");
            }
            _ => panic!("expected table output"),
        }
    }
}
