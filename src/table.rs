use std::{
    collections::HashMap,
    ops::{Index, IndexMut},
    slice,
    sync::Arc,
};

use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};

use crate::{
    convert::{HeaderConverter, convert_header},
    error::CsvError,
    options::CsvOptions,
    stream::csv_writer::CsvWriterBuilder,
    value::Value,
};

/// Column names of a table, captured once and immutable afterwards.
///
/// When a name occurs more than once, lookups by name resolve to the last
/// occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(position, name)| (name.clone(), position))
            .collect();
        Self { names, index }
    }

    /// Builds a header from raw fields, applying `converters` to each name.
    pub fn with_converters(raw: Vec<String>, converters: &[HeaderConverter]) -> Self {
        if converters.is_empty() {
            return Self::new(raw);
        }
        Self::new(raw.iter().map(|name| convert_header(name, converters)))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(String::as_str)
    }
}

impl PartialEq<Vec<&str>> for Header {
    fn eq(&self, other: &Vec<&str>) -> bool {
        self.names.len() == other.len() && self.names.iter().zip(other).all(|(a, b)| a == b)
    }
}

/// One record: an ordered sequence of values, optionally keyed by a header.
///
/// Rows built against a header are padded with [`Value::Null`] up to the
/// header length; extra fields stay reachable by position only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    header: Option<Arc<Header>>,
    fields: Vec<Value>,
}

impl Row {
    pub fn new(fields: Vec<Value>) -> Self {
        Self {
            header: None,
            fields,
        }
    }

    pub fn with_header(header: Arc<Header>, mut fields: Vec<Value>) -> Self {
        if fields.len() < header.len() {
            fields.resize(header.len(), Value::Null);
        }
        Self {
            header: Some(header),
            fields,
        }
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_deref()
    }

    pub(crate) fn shared_header(&self) -> Option<&Arc<Header>> {
        self.header.as_ref()
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.fields.get_mut(index)
    }

    /// Looks a value up by header name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let position = self.header.as_ref()?.position(name)?;
        self.fields.get(position)
    }

    /// Replaces the value of a named column; returns `false` when unknown.
    pub fn set_by_name(&mut self, name: &str, value: impl Into<Value>) -> bool {
        let Some(position) = self.header.as_ref().and_then(|h| h.position(name)) else {
            return false;
        };
        match self.fields.get_mut(position) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.fields.push(value.into());
    }

    pub fn iter(&self) -> slice::Iter<'_, Value> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, Value> {
        self.fields.iter_mut()
    }

    /// `(header name, value)` pairs; unnamed trailing fields get `None`.
    pub fn pairs(&self) -> impl Iterator<Item = (Option<&str>, &Value)> {
        self.fields.iter().enumerate().map(move |(position, value)| {
            let name = self.header.as_ref().and_then(|h| h.name(position));
            (name, value)
        })
    }

    pub fn into_fields(self) -> Vec<Value> {
        self.fields
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.fields[index]
    }
}

impl IndexMut<usize> for Row {
    fn index_mut(&mut self, index: usize) -> &mut Value {
        &mut self.fields[index]
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<V: Into<Value>> FromIterator<V> for Row {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Row::new(iter.into_iter().map(Into::into).collect())
    }
}

impl PartialEq<Vec<&str>> for Row {
    fn eq(&self, other: &Vec<&str>) -> bool {
        self.fields.len() == other.len() && self.fields.iter().zip(other).all(|(a, b)| a == b)
    }
}

/// Serialized as a map keyed by header names when a header is attached,
/// otherwise as a sequence. Unnamed trailing fields are dropped from maps.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.header {
            Some(header) => {
                let mut map = serializer.serialize_map(Some(header.len()))?;
                for (name, value) in header.names().iter().zip(&self.fields) {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            None => {
                let mut seq = serializer.serialize_seq(Some(self.fields.len()))?;
                for value in &self.fields {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

/// Rows sharing one optional header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    header: Option<Arc<Header>>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(header: Option<Arc<Header>>, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }

    pub fn headers(&self) -> Option<&Header> {
        self.header.as_deref()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Appends a row, re-keying it against this table's header.
    pub fn push(&mut self, row: Row) {
        let row = match &self.header {
            Some(header) => Row::with_header(header.clone(), row.into_fields()),
            None => row,
        };
        self.rows.push(row);
    }

    /// Values of a named column, `Null` where a row is short.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let position = self.header.as_ref()?.position(name)?;
        Some(self.column_at(position))
    }

    pub fn column_at(&self, position: usize) -> Vec<&Value> {
        self.rows
            .iter()
            .map(|row| row.get(position).unwrap_or(&Value::Null))
            .collect()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Renders the table, header line first when there is one.
    ///
    /// The table's own header replaces any header the options would have the
    /// writer emit, so exactly one header line is written.
    pub fn to_csv(&self, options: &CsvOptions) -> Result<String, CsvError> {
        let mut builder = CsvWriterBuilder::new().options(options).text_output();
        if self.header.is_some() {
            builder = builder.write_headers(false);
        }
        let mut writer = builder.from_writer(Vec::new())?;
        if let Some(header) = &self.header {
            writer.write_row(header.names())?;
        }
        for row in &self.rows {
            writer.write_row(row)?;
        }
        let bytes = writer.into_inner()?;
        String::from_utf8(bytes).map_err(|e| CsvError::InvalidInput(e.to_string()))
    }
}

impl Index<usize> for Table {
    type Output = Row;

    fn index(&self, index: usize) -> &Row {
        &self.rows[index]
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for Table {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
