use super::{OperationError, OperationHandler, OperationOutput, ProgressSink, Table};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Handler for `normalization/apply`: lowercases and trims the values in
/// the requested columns, leaving others untouched.
pub struct Apply;

impl OperationHandler for Apply {
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

        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect();
        if indices.len() != columns.len() {
            return Err(OperationError::Failed(
                "one or more normalization columns not found".to_string(),
            ));
        }

        let total = table.rows.len().max(1);
        let mut rows = Vec::with_capacity(table.rows.len());
        for (i, row) in table.rows.iter().enumerate() {
            let mut normalized = row.clone();
            for &idx in &indices {
                if let Some(cell) = normalized.get_mut(idx) {
                    *cell = cell.trim().to_lowercase();
                }
            }
            rows.push(normalized);
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
    fn lowercases_and_trims_requested_columns() {
        let table = Table::new(
            vec!["name".to_string(), "city".to_string()],
            vec![vec![" Ada ".to_string(), "Boston".to_string()]],
        );
        let mut args = BTreeMap::new();
        args.insert("columns".to_string(), json!(["name"]));
        let out = Apply.invoke(&table, &args, &NoopProgressSink).expect("invoke");
        match out {
            OperationOutput::Table(t) => {
                assert_eq!(t.rows[0][0], "ada");
                assert_eq!(t.rows[0][1], "Boston");
            }
            _ => panic!("expected table output"),
        }
    }
}
