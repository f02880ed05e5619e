//! Field and header converters.
//!
//! Converters form an ordered pipeline: each raw field is offered to the
//! converters in registration order and the first one returning `Some` wins.
//! A field no converter claims stays a [`Value::Str`]. Absent fields are
//! never offered to converters.

use std::{fmt, sync::Arc};

#[cfg(feature = "date")]
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Context handed to converters alongside the raw field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo<'a> {
    /// Zero-based column index.
    pub index: usize,
    /// Line the row started on.
    pub line: usize,
    /// Header name of the column, when headers are in use.
    pub header: Option<&'a str>,
}

type ConvertFn = dyn Fn(&str, &FieldInfo<'_>) -> Option<Value> + Send + Sync;

/// A user supplied field converter.
#[derive(Clone)]
pub struct ConverterFn(Arc<ConvertFn>);

impl ConverterFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &FieldInfo<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        ConverterFn(Arc::new(f))
    }
}

impl fmt::Debug for ConverterFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConverterFn(..)")
    }
}

impl PartialEq for ConverterFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A field converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Converter {
    Integer,
    Float,
    /// `Integer`, then `Float`.
    Numeric,
    #[cfg(feature = "date")]
    Date,
    #[cfg(feature = "date")]
    DateTime,
    /// `Numeric`, then `DateTime`, then `Date`.
    #[cfg(feature = "date")]
    All,
    #[serde(skip)]
    Custom(ConverterFn),
}

impl Converter {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &FieldInfo<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        Converter::Custom(ConverterFn::new(f))
    }

    /// Returns the converted value, or `None` when the field is left unchanged.
    pub fn convert(&self, field: &str, info: &FieldInfo<'_>) -> Option<Value> {
        match self {
            Converter::Integer => parse_integer(field),
            Converter::Float => parse_float(field),
            Converter::Numeric => parse_integer(field).or_else(|| parse_float(field)),
            #[cfg(feature = "date")]
            Converter::Date => parse_date(field),
            #[cfg(feature = "date")]
            Converter::DateTime => parse_date_time(field),
            #[cfg(feature = "date")]
            Converter::All => parse_integer(field)
                .or_else(|| parse_float(field))
                .or_else(|| parse_date_time(field))
                .or_else(|| parse_date(field)),
            Converter::Custom(f) => (f.0)(field, info),
        }
    }
}

/// Runs `field` through `converters` in order.
pub fn convert_field(field: String, converters: &[Converter], info: &FieldInfo<'_>) -> Value {
    converters
        .iter()
        .find_map(|converter| converter.convert(&field, info))
        .unwrap_or(Value::Str(field))
}

fn parse_integer(field: &str) -> Option<Value> {
    field.parse::<i64>().ok().map(Value::Int)
}

fn parse_float(field: &str) -> Option<Value> {
    // Rust accepts "inf" and "NaN"; a numeric field needs at least one digit.
    if !field.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse::<f64>().ok().map(Value::Float)
}

#[cfg(feature = "date")]
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%B %d, %Y"];

#[cfg(feature = "date")]
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

#[cfg(feature = "date")]
fn parse_date(field: &str) -> Option<Value> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(field, format).ok())
        .map(Value::Date)
}

#[cfg(feature = "date")]
fn parse_date_time(field: &str) -> Option<Value> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(field, format).ok())
        .map(Value::DateTime)
}

type HeaderConvertFn = dyn Fn(&str) -> String + Send + Sync;

/// A user supplied header converter.
#[derive(Clone)]
pub struct HeaderConverterFn(Arc<HeaderConvertFn>);

impl fmt::Debug for HeaderConverterFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HeaderConverterFn(..)")
    }
}

impl PartialEq for HeaderConverterFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A header name converter, applied once when the header is captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderConverter {
    Downcase,
    /// Lower-cased, stripped of punctuation, whitespace runs joined by `_`.
    Symbol,
    #[serde(skip)]
    Custom(HeaderConverterFn),
}

impl HeaderConverter {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        HeaderConverter::Custom(HeaderConverterFn(Arc::new(f)))
    }

    pub fn convert(&self, name: &str) -> String {
        match self {
            HeaderConverter::Downcase => name.to_lowercase(),
            HeaderConverter::Symbol => symbolize(name),
            HeaderConverter::Custom(f) => (f.0)(name),
        }
    }
}

/// Applies `converters` to a header name in order.
pub fn convert_header(name: &str, converters: &[HeaderConverter]) -> String {
    converters
        .iter()
        .fold(name.to_string(), |name, converter| converter.convert(&name))
}

fn symbolize(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("_")
}
