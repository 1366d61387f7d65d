use super::OperationError;

/// Minimal in-memory CSV-backed table. No quoting/escaping support beyond
/// what the built-in operations need — a real deployment would swap this
/// for a proper DataFrame library without touching the Executor contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, OperationError> {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|err| OperationError::MalformedTable(err.to_string()))?;
        let mut lines = text.lines();
        let headers = match lines.next() {
            Some(line) => split_csv_line(line),
            None => return Ok(Table::new(Vec::new(), Vec::new())),
        };
        let rows = lines
            .filter(|line| !line.is_empty())
            .map(split_csv_line)
            .collect();
        Ok(Table::new(headers, rows))
    }

    pub fn to_csv_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&self.headers.join(","));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out.into_bytes()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn split_csv_line(line: &str) -> Vec<String> {
    line.split(',').map(|field| field.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_csv_bytes() {
        let table = Table::new(
            vec!["name".to_string(), "email".to_string()],
            vec![vec!["Ada".to_string(), "ada@example.com".to_string()]],
        );
        let bytes = table.to_csv_bytes();
        let parsed = Table::from_csv_bytes(&bytes).expect("parse");
        assert_eq!(parsed, table);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = Table::from_csv_bytes(b"").expect("parse empty");
        assert!(table.headers.is_empty());
        assert!(table.rows.is_empty());
    }
}
