use std::fmt;

#[cfg(feature = "date")]
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

/// A single field value.
///
/// Fields come out of the tokenizer as [`Value::Str`]; converters may turn
/// them into richer scalars. [`Value::Null`] is the absent marker used to pad
/// short rows against a header.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    #[cfg(feature = "date")]
    Date(NaiveDate),
    #[cfg(feature = "date")]
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Default textual conversion used by the writer.
///
/// `Null` renders as the empty string and whole floats keep a trailing `.0`
/// so they stay distinguishable from integers after a round trip.
///
/// Non-finite floats render as `NaN`, `inf` and `-inf`. The numeric
/// converters never claim those strings, so such values read back as text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Bool(b) => write!(f, "{}", b),
            #[cfg(feature = "date")]
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            #[cfg(feature = "date")]
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Bool(b) => serializer.serialize_bool(*b),
            #[cfg(feature = "date")]
            Value::Date(_) | Value::DateTime(_) => serializer.collect_str(self),
        }
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(feature = "date")]
impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

#[cfg(feature = "date")]
impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Value;
    use crate::convert::{Converter, FieldInfo, convert_field};

    const INFO: FieldInfo<'static> = FieldInfo {
        index: 0,
        line: 1,
        header: None,
    };

    #[test]
    fn display_should_use_default_textual_conversion() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::Int(-42).to_string(), "-42");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn non_finite_floats_should_read_back_as_text() {
        let converters = [Converter::Float];
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let text = Value::Float(value).to_string();
            assert_eq!(convert_field(text.clone(), &converters, &INFO), Value::Str(text));
        }
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-inf");
    }

    #[test]
    fn option_should_map_none_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3)), Value::Int(3));
    }

    #[test]
    fn values_should_serialize_as_plain_json_scalars() -> Result<(), serde_json::Error> {
        let values = vec![Value::Null, Value::from("x"), Value::Int(1), Value::Float(1.5)];
        assert_eq!(serde_json::to_string(&values)?, r#"[null,"x",1,1.5]"#);
        Ok(())
    }

    #[cfg(feature = "date")]
    #[test]
    fn dates_should_render_in_iso_format() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).map(Value::from);
        assert_eq!(date.map(|d| d.to_string()), Some("2024-02-29".to_string()));
    }
}
