use crate::records::row::RowData;

/// An immutable window of rows read from one table.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    entity: String,
    offset: usize,
    rows: Vec<RowData>,
}

impl RowBatch {
    pub fn new(entity: &str, offset: usize, rows: Vec<RowData>) -> Self {
        RowBatch {
            entity: entity.to_string(),
            offset,
            rows,
        }
    }

    pub fn empty(entity: &str, offset: usize) -> Self {
        RowBatch::new(entity, offset, Vec::new())
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Position of the first row of this batch within the read that produced it.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rows(&self) -> &[RowData] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<RowData> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RowData> {
        self.rows.iter()
    }

    /// Union of keys across all rows, in first-seen order.
    pub fn union_keys(&self) -> Vec<String> {
        union_keys(&self.rows)
    }
}

impl<'a> IntoIterator for &'a RowBatch {
    type Item = &'a RowData;
    type IntoIter = std::slice::Iter<'a, RowData>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

pub fn union_keys(rows: &[RowData]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
    }
    keys
}
