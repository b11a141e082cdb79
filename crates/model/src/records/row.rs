use crate::core::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

/// One record: an ordered mapping from column name to value.
///
/// A column that is missing from `field_values` is *absent*, which is not the
/// same as a column that is present with [`Value::Null`]: writers leave absent
/// columns untouched and overwrite present ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    pub entity: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            field_values,
        }
    }

    pub fn from_pairs<K, V, I>(entity: &str, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = RowData::new(entity, Vec::new());
        for (name, value) in pairs {
            row.set(name, value);
        }
        row
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.field_values
            .iter()
            .find(|f| f.name == field)
            .map(|f| &f.value)
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.field_values.iter().any(|f| f.name == field)
    }

    /// Inserts or replaces a field, keeping the original position on replace.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.field_values.iter_mut().find(|f| f.name == field) {
            Some(existing) => existing.value = value,
            None => self.field_values.push(FieldValue { name: field, value }),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.field_values.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_null_are_distinct() {
        let row = RowData::from_pairs("fish", [("id", Value::Int(1)), ("weight", Value::Null)]);
        assert!(row.contains("weight"));
        assert!(!row.contains("fish"));
        assert_eq!(row.get("weight"), Some(&Value::Null));
        assert_eq!(row.get("fish"), None);
        assert_eq!(row.get_value("fish"), Value::Null);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut row = RowData::from_pairs("fish", [("id", 1), ("size", 2)]);
        row.set("id", 7);
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "size"]);
        assert_eq!(row.get("id"), Some(&Value::Int(7)));
    }
}
