//! Raw decoded rows
//!
//! A `RawRecord` is one data row as decoded from a sheet: column name →
//! string value, in file order. Column names are lowercased at parse time so
//! header lookup is case-insensitive and tolerant of arbitrary column order.

/// One decoded input row
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    columns: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from (header, value) pairs; headers are normalized
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (name, value) in pairs {
            record.push(name.as_ref(), value.into());
        }
        record
    }

    pub fn push(&mut self, name: &str, value: String) {
        self.columns
            .push((name.trim().to_lowercase(), value));
    }

    /// Value of a column, if the column exists in this row (may be empty)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(col, _)| col == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(|(col, value)| (col.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|(_, value)| value.trim().is_empty())
    }
}
