//! Normalized records and tables.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::btree_map;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

// ============================================================================
// Value
// ============================================================================

/// A cell in a normalized record.
///
/// Lists only ever hold scalars; anything deeper is kept as JSON text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing or null.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Non-integral or out-of-range number.
    Float(f64),
    /// Text.
    Text(String),
    /// Sequence of scalars.
    List(Vec<Value>),
}

impl Value {
    /// Converts a JSON scalar. Returns `None` for arrays and objects.
    pub fn from_scalar(json: &JsonValue) -> Option<Self> {
        match json {
            JsonValue::Null => Some(Self::Null),
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            JsonValue::String(s) => Some(Self::Text(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    /// Converts back to JSON.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Name of the variant, used in schema errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrowed text, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Renders the value as a single cell: null is empty, lists are JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::List(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

// ============================================================================
// Record
// ============================================================================

/// One flat result row, keyed by field name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a field.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Returns true if the field is present (even if null).
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Field names, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over fields.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the record into a flat JSON object.
    pub fn to_json(&self) -> Map<String, JsonValue> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Table
// ============================================================================

/// Rows with a shared column list.
///
/// Columns start with the preferred order given at construction and grow,
/// in first-seen order, as rows bring new fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    #[serde(skip)]
    known: HashSet<String>,
    rows: Vec<Record>,
}

impl Table {
    /// Creates an empty table with a preferred column order.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for column in columns {
            table.add_column(column.into());
        }
        table
    }

    /// Builds a table from rows, columns in first-seen order.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut table = Self::default();
        table.extend(records);
        table
    }

    fn add_column(&mut self, column: String) {
        if self.known.insert(column.clone()) {
            self.columns.push(column);
        }
    }

    /// Appends a row.
    pub fn push(&mut self, record: Record) {
        for key in record.keys() {
            if !self.known.contains(key) {
                self.add_column(key.to_string());
            }
        }
        self.rows.push(record);
    }

    /// Appends rows.
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.push(record);
        }
    }

    /// Appends all rows of another table.
    pub fn append(&mut self, other: Table) {
        for column in other.columns {
            self.add_column(column);
        }
        self.rows.extend(other.rows);
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows.
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A cell; missing fields read as null.
    pub fn cell(&self, row: usize, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// Iterates over rows as cells in column order.
    pub fn iter_rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.rows.len()).map(move |i| {
            self.columns
                .iter()
                .map(|c| self.cell(i, c))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_from_scalar() {
        assert_eq!(Value::from_scalar(&json!(3)), Some(Value::Int(3)));
        assert_eq!(Value::from_scalar(&json!(1.5)), Some(Value::Float(1.5)));
        assert_eq!(Value::from_scalar(&json!("x")), Some(Value::Text("x".into())));
        assert_eq!(Value::from_scalar(&json!(null)), Some(Value::Null));
        assert_eq!(Value::from_scalar(&json!([1])), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(
            Value::List(vec![Value::from("a"), Value::from("b")]).to_string(),
            r#"["a","b"]"#
        );
    }

    #[test]
    fn test_record_serializes_flat() {
        let mut record = Record::new();
        record.insert("id", 1_i64);
        record.insert("username", "alice");
        record.insert("region_code", Value::Null);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"id": 1, "username": "alice", "region_code": null}));
    }

    #[test]
    fn test_table_columns_grow_in_first_seen_order() {
        let mut table = Table::new(["username"]);
        let mut a = Record::new();
        a.insert("username", "a");
        a.insert("display_name", "A");
        let mut b = Record::new();
        b.insert("username", "b");
        b.insert("target_account", "x");
        table.extend([a, b]);

        assert_eq!(table.columns(), ["username", "display_name", "target_account"]);
        assert_eq!(table.len(), 2);
        assert!(table.cell(0, "target_account").is_null());
        assert_eq!(table.cell(1, "target_account").as_str(), Some("x"));
    }

    #[test]
    fn test_table_append() {
        let mut left = Table::from_records([Record::from_iter([("a".to_string(), Value::Int(1))])]);
        let right = Table::from_records([Record::from_iter([("b".to_string(), Value::Int(2))])]);
        left.append(right);
        assert_eq!(left.columns(), ["a", "b"]);
        assert_eq!(left.iter_rows().count(), 2);
    }
}
