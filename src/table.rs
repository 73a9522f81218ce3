// src/table.rs

use anyhow::{bail, Result};
use std::fmt;

use crate::error::EtlError;

/// A single cell of a [`ResultTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    /// Only produced when reading back from SQLite (e.g. `COUNT(*)`).
    Integer(i64),
    Missing,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            // whole floats keep a trailing ".0" so they read back as floats
            Value::Number(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{:.1}", v)
            }
            Value::Number(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Number,
        }
    }
}

/// Ordered, uniform-width records flowing from extraction to the sinks.
///
/// Rows keep source order; every row has exactly one value per field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    fields: Vec<Field>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    /// A table whose fields all start out as untyped text.
    pub fn with_text_fields<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(names.iter().map(|n| Field::text(n.as_ref())).collect())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| EtlError::UnknownField(name.to_string()).into())
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.fields.len() {
            bail!(
                "row has {} values but table has {} fields",
                row.len(),
                self.fields.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    /// Look up one cell by row ordinal and field name.
    pub fn get(&self, row: usize, field: &str) -> Option<&Value> {
        let idx = self.fields.iter().position(|f| f.name == field)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Replace a field's name, kind and every value.
    ///
    /// The new column is built in full before anything is assigned, so an
    /// error from `f` leaves the table untouched.
    pub fn replace_field<F>(&mut self, name: &str, field: Field, mut f: F) -> Result<()>
    where
        F: FnMut(usize, &Value) -> Result<Value>,
    {
        let idx = self.field_index(name)?;
        let values = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| f(i, &row[idx]))
            .collect::<Result<Vec<_>>>()?;
        for (row, v) in self.rows.iter_mut().zip(values) {
            row[idx] = v;
        }
        self.fields[idx] = field;
        Ok(())
    }

    /// Append a new field computed from each existing row.
    pub fn derive_field<F>(&mut self, field: Field, mut f: F) -> Result<()>
    where
        F: FnMut(&[Value]) -> Value,
    {
        if self.has_field(&field.name) {
            return Err(EtlError::AlreadyTransformed(format!(
                "field `{}` already exists",
                field.name
            ))
            .into());
        }
        for row in self.rows.iter_mut() {
            let v = f(row);
            row.push(v);
        }
        self.fields.push(field);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultTable {
        let mut t = ResultTable::with_text_fields(&["Name", "Value"]);
        t.push_row(vec![Value::Text("a".into()), Value::Text("1".into())])
            .unwrap();
        t.push_row(vec![Value::Text("b".into()), Value::Text("2".into())])
            .unwrap();
        t
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut t = sample();
        assert!(t.push_row(vec![Value::Missing]).is_err());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn replace_field_keeps_order() {
        let mut t = sample();
        t.replace_field("Value", Field::number("Value2"), |_, v| {
            Ok(Value::Number(v.as_str().unwrap().parse::<f64>().unwrap() * 2.0))
        })
        .unwrap();
        assert_eq!(t.field_names(), vec!["Name", "Value2"]);
        assert_eq!(t.get(0, "Value2"), Some(&Value::Number(2.0)));
        assert_eq!(t.get(1, "Value2"), Some(&Value::Number(4.0)));
        assert!(t.field_index("Value").is_err());
    }

    #[test]
    fn failed_replace_leaves_table_untouched() {
        let mut t = sample();
        let before = t.clone();
        let err = t.replace_field("Value", Field::number("Value2"), |i, _| {
            if i == 1 {
                anyhow::bail!("boom")
            }
            Ok(Value::Number(0.0))
        });
        assert!(err.is_err());
        assert_eq!(t, before);
    }

    #[test]
    fn derive_field_refuses_duplicates() {
        let mut t = sample();
        t.derive_field(Field::number("X"), |_| Value::Missing).unwrap();
        let err = t.derive_field(Field::number("X"), |_| Value::Missing);
        assert!(err.is_err());
        assert_eq!(t.fields().len(), 3);
    }

    #[test]
    fn number_display() {
        assert_eq!(Value::Number(93.0).to_string(), "93.0");
        assert_eq!(Value::Number(26854.6).to_string(), "26854.6");
        assert_eq!(Value::Number(0.13).to_string(), "0.13");
        assert_eq!(Value::Missing.to_string(), "");
        assert_eq!(Value::Integer(3).to_string(), "3");
    }
}
