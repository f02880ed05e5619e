use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use log::debug;

use crate::{
    core::item::ItemWriter,
    encoding::{EncodingSpec, TextEncoder},
    error::{CsvError, Warning},
    options::{CsvOptions, Headers},
    table::Row,
    value::Value,
};

/// A CSV writer serializing rows of values into delimited text.
///
/// A field is quoted when it contains the column separator, the row
/// separator, the quote character or a line break; quote characters inside
/// quoted fields are doubled. Output is append-only: every row goes straight
/// to the destination with a single `write_all`.
///
/// # Examples
///
/// ```
/// use csv_engine::{CsvOptions, stream::csv_writer::CsvWriterBuilder};
///
/// let mut writer = CsvWriterBuilder::new()
///     .options(&CsvOptions::new().col_sep(";"))
///     .from_writer(Vec::new())
///     .unwrap();
///
/// writer.write_row(["a", "b;c"]).unwrap();
/// writer.write_row([1, 2]).unwrap();
///
/// let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
/// assert_eq!(data, "a;\"b;c\"\n1;2\n");
/// ```
pub struct CsvWriter<W: Write> {
    /// Destination; `None` once closed.
    sink: Option<W>,
    options: CsvOptions,
    row_sep: String,
    encoder: TextEncoder,
    header_written: bool,
    lines: usize,
    warnings: Vec<Warning>,
}

impl<W: Write> CsvWriter<W> {
    /// Writes one row of arbitrary scalar values.
    pub fn write_row<I>(&mut self, row: I) -> Result<(), CsvError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.write_pending_header(None)?;
        let line = self.format_row(row);
        self.emit(&line)
    }

    /// Writes a row, preceded by its header line when headers are to be
    /// written and none has been yet.
    pub fn write_record(&mut self, row: &Row) -> Result<(), CsvError> {
        self.write_pending_header(row.header().map(|h| h.names()))?;
        let line = self.format_row(row);
        self.emit(&line)
    }

    /// Formats a row without writing it.
    pub fn format_row<I>(&self, row: I) -> String
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut line = String::new();
        for (position, value) in row.into_iter().enumerate() {
            if position > 0 {
                line.push_str(&self.options.col_sep);
            }
            let value = value.into();
            let text = match &self.options.formatter {
                Some(formatter) => formatter.format(&value),
                None => value.to_string(),
            };
            let quote = self.options.force_quotes
                || (self.options.quote_empty && text.is_empty() && !value.is_null())
                || self.needs_quotes(&text);
            if quote {
                self.push_quoted(&mut line, &text);
            } else {
                line.push_str(&text);
            }
        }
        line.push_str(&self.row_sep);
        line
    }

    pub fn flush(&mut self) -> Result<(), CsvError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Flushes and releases the destination. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), CsvError> {
        if self.sink.is_none() {
            return Ok(());
        }
        self.write_pending_header(None)?;
        self.flush()?;
        self.sink = None;
        debug!("Writer closed after {} lines", self.lines);
        Ok(())
    }

    /// Flushes and returns the destination.
    pub fn into_inner(mut self) -> Result<W, CsvError> {
        self.write_pending_header(None)?;
        self.flush()?;
        self.sink.take().ok_or_else(closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Number of rows written, header line included.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    fn needs_quotes(&self, text: &str) -> bool {
        text.contains(self.options.col_sep.as_str())
            || text.contains(self.row_sep.as_str())
            || text.contains(self.options.quote_char)
            || text.contains(['\r', '\n'])
    }

    fn push_quoted(&self, line: &mut String, text: &str) {
        let quote = self.options.quote_char;
        line.push(quote);
        for c in text.chars() {
            if c == quote {
                line.push(quote);
            }
            line.push(c);
        }
        line.push(quote);
    }

    fn write_pending_header(&mut self, row_header: Option<&[String]>) -> Result<(), CsvError> {
        if self.header_written || !self.options.write_headers || self.sink.is_none() {
            return Ok(());
        }
        let names: Option<Vec<String>> = match &self.options.headers {
            Headers::Explicit(names) => Some(names.clone()),
            _ => row_header.map(<[String]>::to_vec),
        };
        if let Some(names) = names {
            let line = self.format_row(&names);
            self.emit(&line)?;
        }
        Ok(())
    }

    fn emit(&mut self, line: &str) -> Result<(), CsvError> {
        let bytes = self.encoder.encode(line, self.lines + 1)?;
        let sink = self.sink.as_mut().ok_or_else(closed)?;
        sink.write_all(&bytes)?;
        self.lines += 1;
        self.header_written = true;
        Ok(())
    }
}

fn closed() -> CsvError {
    CsvError::InvalidInput("writer is closed".to_string())
}

impl<W: Write> ItemWriter<Row> for CsvWriter<W> {
    fn write(&mut self, item: &Row) -> Result<(), CsvError> {
        self.write_record(item)
    }

    fn flush(&mut self) -> Result<(), CsvError> {
        CsvWriter::flush(self)
    }

    fn close(&mut self) -> Result<(), CsvError> {
        CsvWriter::close(self)
    }
}

/// A builder for configuring CSV writing.
#[derive(Default)]
pub struct CsvWriterBuilder {
    options: CsvOptions,
    text_output: bool,
}

impl CsvWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a private copy of `options`.
    pub fn options(mut self, options: &CsvOptions) -> Self {
        self.options = options.clone();
        self
    }

    pub fn col_sep(mut self, col_sep: impl Into<String>) -> Self {
        self.options = self.options.col_sep(col_sep);
        self
    }

    pub fn row_sep(mut self, row_sep: &str) -> Self {
        self.options = self.options.row_sep(row_sep);
        self
    }

    pub fn write_headers(mut self, yes: bool) -> Self {
        self.options = self.options.write_headers(yes);
        self
    }

    /// Emits UTF-8 regardless of the configured encoding, for writers that
    /// produce a `String`.
    pub fn text_output(mut self) -> Self {
        self.text_output = true;
        self
    }

    pub fn from_writer<W: Write>(self, wtr: W) -> Result<CsvWriter<W>, CsvError> {
        self.options.validate()?;

        let (spec, warning) = EncodingSpec::resolve(self.options.encoding.as_deref());
        let spec = if self.text_output { spec.for_text() } else { spec };
        let row_sep = self.options.row_sep.for_writing().to_string();

        Ok(CsvWriter {
            sink: Some(wtr),
            row_sep,
            encoder: TextEncoder::new(spec),
            options: self.options,
            header_written: false,
            lines: 0,
            warnings: warning.into_iter().collect(),
        })
    }

    /// Creates (or truncates) the file at `path`.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvWriter<BufWriter<File>>, CsvError> {
        let file = File::create(path)?;
        self.from_writer(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fs};

    use tempfile::NamedTempFile;

    use super::CsvWriterBuilder;
    use crate::{
        core::item::ItemWriter,
        error::{CsvError, Warning},
        options::{CsvOptions, Formatter},
        table::{Header, Row},
        value::Value,
    };

    fn render(options: &CsvOptions, rows: &[Vec<Value>]) -> Result<String, Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new().options(options).from_writer(vec![])?;
        for row in rows {
            writer.write_row(row)?;
        }
        Ok(String::from_utf8(writer.into_inner()?)?)
    }

    #[test]
    fn fields_should_be_quoted_only_when_needed() -> Result<(), Box<dyn Error>> {
        let row = vec![
            Value::from("plain"),
            Value::from("a,b"),
            Value::from("say \"hi\""),
            Value::from("multi\nline"),
            Value::from("Added\r"),
            Value::from(""),
            Value::Null,
        ];
        assert_eq!(
            render(&CsvOptions::new(), &[row])?,
            "plain,\"a,b\",\"say \"\"hi\"\"\",\"multi\nline\",\"Added\r\",,\n"
        );
        Ok(())
    }

    #[test]
    fn scalar_values_should_use_default_conversion() -> Result<(), Box<dyn Error>> {
        let row = vec![Value::Int(2), Value::Float(4.5), Value::Bool(false)];
        assert_eq!(render(&CsvOptions::new(), &[row])?, "2,4.5,false\n");
        Ok(())
    }

    #[test]
    fn configured_separators_should_drive_quoting() -> Result<(), Box<dyn Error>> {
        let options = CsvOptions::new().col_sep("::").row_sep("|");
        let rows = vec![
            vec![Value::from("a:b"), Value::from("c::d")],
            vec![Value::from("e|f"), Value::from("g")],
        ];
        assert_eq!(render(&options, &rows)?, "a:b::\"c::d\"|\"e|f\"::g|");
        Ok(())
    }

    #[test]
    fn force_quotes_and_quote_empty_should_be_honoured() -> Result<(), Box<dyn Error>> {
        let row = vec![Value::from("a"), Value::from(""), Value::Null];

        let forced = CsvOptions::new().force_quotes(true);
        assert_eq!(render(&forced, &[row.clone()])?, "\"a\",\"\",\"\"\n");

        let empty = CsvOptions::new().quote_empty(true);
        assert_eq!(render(&empty, &[row])?, "a,\"\",\n");
        Ok(())
    }

    #[test]
    fn custom_formatter_should_replace_default_conversion() -> Result<(), Box<dyn Error>> {
        let options = CsvOptions::new().formatter(Formatter::new(|value| match value {
            Value::Float(x) => Some(format!("{:.2}", x)),
            Value::Null => Some("NULL".to_string()),
            _ => None,
        }));
        let row = vec![Value::Float(1.0), Value::Null, Value::Int(3)];
        assert_eq!(render(&options, &[row])?, "1.00,NULL,3\n");
        Ok(())
    }

    #[test]
    fn row_header_should_be_written_once() -> Result<(), Box<dyn Error>> {
        let header = std::sync::Arc::new(Header::new(["id", "name"]));
        let mut writer = CsvWriterBuilder::new().write_headers(true).from_writer(vec![])?;

        writer.write(&Row::with_header(header.clone(), vec![Value::Int(1), "a".into()]))?;
        writer.write(&Row::with_header(header, vec![Value::Int(2), "b".into()]))?;

        let data = String::from_utf8(writer.into_inner()?)?;
        assert_eq!(data, "id,name\n1,a\n2,b\n");
        Ok(())
    }

    #[test]
    fn explicit_headers_should_be_written_even_without_rows() -> Result<(), Box<dyn Error>> {
        let options = CsvOptions::new().header_names(["a", "b"]).write_headers(true);
        let writer = CsvWriterBuilder::new().options(&options).from_writer(vec![])?;

        assert_eq!(String::from_utf8(writer.into_inner()?)?, "a,b\n");
        Ok(())
    }

    #[test]
    fn writing_after_close_should_fail_and_close_should_be_idempotent() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new().from_writer(vec![])?;
        writer.write_row(["x"])?;
        writer.close()?;
        writer.close()?;

        assert!(writer.is_closed());
        assert!(matches!(writer.write_row(["y"]), Err(CsvError::InvalidInput(_))));
        Ok(())
    }

    #[test]
    fn output_should_be_encoded_in_the_configured_encoding() -> Result<(), Box<dyn Error>> {
        let options = CsvOptions::new().encoding("windows-1252");
        let mut writer = CsvWriterBuilder::new().options(&options).from_writer(vec![])?;
        writer.write_row(["café"])?;
        assert_eq!(writer.into_inner()?, b"caf\xE9\n".to_vec());

        let mut writer = CsvWriterBuilder::new().options(&options).from_writer(vec![])?;
        let error = writer.write_row(["ok", "日本"]).unwrap_err();
        assert!(matches!(error, CsvError::UnmappableCharacter { line: 1, .. }));
        Ok(())
    }

    #[test]
    fn unknown_encoding_should_warn_once() -> Result<(), Box<dyn Error>> {
        let options = CsvOptions::new().encoding("no-such-charset");
        let writer = CsvWriterBuilder::new().options(&options).from_writer(vec![])?;

        assert_eq!(
            writer.warnings(),
            &[Warning::UnsupportedEncoding {
                name: "no-such-charset".to_string()
            }]
        );
        Ok(())
    }

    #[test]
    fn invalid_options_should_be_rejected() {
        let result = CsvWriterBuilder::new().col_sep("").from_writer(vec![]);
        assert!(matches!(result, Err(CsvError::InvalidInput(_))));
    }

    #[test]
    fn records_should_be_written_to_a_file() -> Result<(), Box<dyn Error>> {
        let file = NamedTempFile::new()?;
        let mut writer = CsvWriterBuilder::new().from_path(file.path())?;
        writer.write_row(["Boston", "United States", "4628910"])?;
        writer.close()?;

        assert_eq!(fs::read_to_string(file.path())?, "Boston,United States,4628910\n");
        Ok(())
    }
}
