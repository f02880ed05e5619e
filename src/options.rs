use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    convert::{Converter, HeaderConverter},
    error::CsvError,
    value::Value,
};

/// Row separator used when `auto` has nothing to detect from, and by writers.
pub const DEFAULT_ROW_SEP: &str = "\n";

/// How rows are separated.
///
/// Serialized as a plain string: `"auto"` or the literal separator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RowSeparator {
    /// Detect `\r\n`, `\n` or `\r` from the first line break in the input.
    #[default]
    Auto,
    Literal(String),
}

impl RowSeparator {
    /// The separator a writer emits.
    pub fn for_writing(&self) -> &str {
        match self {
            RowSeparator::Auto => DEFAULT_ROW_SEP,
            RowSeparator::Literal(sep) => sep,
        }
    }
}

impl From<String> for RowSeparator {
    fn from(value: String) -> Self {
        if value == "auto" {
            RowSeparator::Auto
        } else {
            RowSeparator::Literal(value)
        }
    }
}

impl From<&str> for RowSeparator {
    fn from(value: &str) -> Self {
        RowSeparator::from(value.to_string())
    }
}

impl From<RowSeparator> for String {
    fn from(value: RowSeparator) -> Self {
        match value {
            RowSeparator::Auto => "auto".to_string(),
            RowSeparator::Literal(sep) => sep,
        }
    }
}

/// Header handling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Headers {
    /// Rows are plain positional sequences.
    #[default]
    None,
    /// The first row is captured as the header.
    FirstRow,
    /// The given names are the header; every row is data.
    Explicit(Vec<String>),
}

impl Headers {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Headers::None)
    }
}

type FormatFn = dyn Fn(&Value) -> Option<String> + Send + Sync;

/// Custom stringification applied by writers before quoting.
///
/// Returning `None` falls back to the default textual conversion.
#[derive(Clone)]
pub struct Formatter(Arc<FormatFn>);

impl Formatter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Formatter(Arc::new(f))
    }

    pub fn format(&self, value: &Value) -> String {
        (self.0)(value).unwrap_or_else(|| value.to_string())
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Formatter(..)")
    }
}

impl PartialEq for Formatter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Parsing and writing configuration.
///
/// This is an immutable value from the point of view of the engine: every
/// reader, writer and free function clones it before use. Setters consume
/// and return `self` so options chain like a builder.
///
/// # Examples
///
/// ```
/// use csv_engine::{CsvOptions, Converter};
///
/// let options = CsvOptions::new()
///     .col_sep(";")
///     .row_sep("\r\n")
///     .has_headers(true)
///     .converter(Converter::Numeric);
///
/// let table = csv_engine::parse("a;b\r\n1;2\r\n", &options).unwrap();
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub(crate) col_sep: String,
    pub(crate) row_sep: RowSeparator,
    pub(crate) quote_char: char,
    pub(crate) encoding: Option<String>,
    pub(crate) headers: Headers,
    pub(crate) converters: Vec<Converter>,
    pub(crate) header_converters: Vec<HeaderConverter>,
    pub(crate) liberal_parsing: bool,
    pub(crate) skip_blanks: bool,
    pub(crate) strip: bool,
    pub(crate) write_headers: bool,
    pub(crate) force_quotes: bool,
    pub(crate) quote_empty: bool,
    #[serde(skip)]
    pub(crate) formatter: Option<Formatter>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            col_sep: ",".to_string(),
            row_sep: RowSeparator::Auto,
            quote_char: '"',
            encoding: None,
            headers: Headers::None,
            converters: Vec::new(),
            header_converters: Vec::new(),
            liberal_parsing: false,
            skip_blanks: false,
            strip: false,
            write_headers: false,
            force_quotes: false,
            quote_empty: false,
            formatter: None,
        }
    }
}

impl CsvOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the column separator. Any non-empty string is accepted.
    pub fn col_sep(mut self, col_sep: impl Into<String>) -> Self {
        self.col_sep = col_sep.into();
        self
    }

    /// Sets the row separator; `"auto"` enables detection.
    pub fn row_sep(mut self, row_sep: impl Into<RowSeparator>) -> Self {
        self.row_sep = row_sep.into();
        self
    }

    pub fn quote_char(mut self, quote_char: char) -> Self {
        self.quote_char = quote_char;
        self
    }

    /// Sets the encoding label, e.g. `"windows-1252"` or `"bom|utf-8"`.
    ///
    /// Unknown labels are not an error: they produce a warning and UTF-8 is
    /// used instead.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Shorthand for [`Headers::FirstRow`] / [`Headers::None`].
    pub fn has_headers(self, yes: bool) -> Self {
        self.headers(if yes { Headers::FirstRow } else { Headers::None })
    }

    pub fn header_names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers(Headers::Explicit(names.into_iter().map(Into::into).collect()))
    }

    /// Appends a converter to the pipeline.
    pub fn converter(mut self, converter: Converter) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn converters(mut self, converters: Vec<Converter>) -> Self {
        self.converters = converters;
        self
    }

    pub fn header_converter(mut self, converter: HeaderConverter) -> Self {
        self.header_converters.push(converter);
        self
    }

    pub fn liberal_parsing(mut self, yes: bool) -> Self {
        self.liberal_parsing = yes;
        self
    }

    pub fn skip_blanks(mut self, yes: bool) -> Self {
        self.skip_blanks = yes;
        self
    }

    pub fn strip(mut self, yes: bool) -> Self {
        self.strip = yes;
        self
    }

    pub fn write_headers(mut self, yes: bool) -> Self {
        self.write_headers = yes;
        self
    }

    pub fn force_quotes(mut self, yes: bool) -> Self {
        self.force_quotes = yes;
        self
    }

    pub fn quote_empty(mut self, yes: bool) -> Self {
        self.quote_empty = yes;
        self
    }

    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn get_col_sep(&self) -> &str {
        &self.col_sep
    }

    pub fn get_row_sep(&self) -> &RowSeparator {
        &self.row_sep
    }

    pub fn get_headers(&self) -> &Headers {
        &self.headers
    }

    pub fn get_encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Checks that the separators and quote character can be told apart.
    pub fn validate(&self) -> Result<(), CsvError> {
        if self.col_sep.is_empty() {
            return Err(CsvError::InvalidInput(
                "column separator must not be empty".to_string(),
            ));
        }
        if let RowSeparator::Literal(row_sep) = &self.row_sep {
            if row_sep.is_empty() {
                return Err(CsvError::InvalidInput(
                    "row separator must not be empty".to_string(),
                ));
            }
            if *row_sep == self.col_sep {
                return Err(CsvError::InvalidInput(format!(
                    "column and row separators are both {:?}",
                    row_sep
                )));
            }
            if row_sep.contains(self.quote_char) {
                return Err(CsvError::InvalidInput(format!(
                    "row separator {:?} contains the quote character",
                    row_sep
                )));
            }
        }
        if self.col_sep.contains(self.quote_char) {
            return Err(CsvError::InvalidInput(format!(
                "column separator {:?} contains the quote character",
                self.col_sep
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{CsvOptions, Headers, RowSeparator};
    use crate::{convert::Converter, error::CsvError};

    #[test]
    fn defaults_should_match_conventional_csv() {
        let options = CsvOptions::default();
        assert_eq!(options.get_col_sep(), ",");
        assert_eq!(options.get_row_sep(), &RowSeparator::Auto);
        assert_eq!(options.quote_char, '"');
        assert_eq!(options.get_headers(), &Headers::None);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn setters_should_not_touch_the_original_value() {
        let base = CsvOptions::new();
        let derived = base.clone().col_sep(";").converter(Converter::Numeric);

        assert_eq!(base, CsvOptions::default());
        assert_eq!(derived.get_col_sep(), ";");
        assert_eq!(derived.converters, vec![Converter::Numeric]);
    }

    #[test]
    fn ambiguous_separators_should_be_rejected() {
        let cases = [
            CsvOptions::new().col_sep(""),
            CsvOptions::new().row_sep(""),
            CsvOptions::new().col_sep("\n").row_sep("\n"),
            CsvOptions::new().col_sep("'").quote_char('\''),
            CsvOptions::new().row_sep("|\"|"),
        ];
        for options in cases {
            assert!(matches!(options.validate(), Err(CsvError::InvalidInput(_))));
        }
    }

    #[test]
    fn options_should_load_from_json() -> Result<(), Box<dyn Error>> {
        let options: CsvOptions = serde_json::from_str(
            r#"{"col_sep": "\t", "row_sep": "\r\n", "headers": "first_row", "converters": ["numeric"]}"#,
        )?;

        assert_eq!(options.get_col_sep(), "\t");
        assert_eq!(options.get_row_sep(), &RowSeparator::Literal("\r\n".to_string()));
        assert_eq!(options.get_headers(), &Headers::FirstRow);
        assert_eq!(options.converters, vec![Converter::Numeric]);
        assert_eq!(options.quote_char, '"');
        Ok(())
    }

    #[test]
    fn auto_row_separator_should_round_trip_through_serde() -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string(&CsvOptions::new())?;
        assert!(json.contains(r#""row_sep":"auto""#));

        let options: CsvOptions = serde_json::from_str(&json)?;
        assert_eq!(options, CsvOptions::new());
        Ok(())
    }
}
