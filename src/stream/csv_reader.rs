use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
    sync::Arc,
};

use log::debug;

use crate::{
    convert::{FieldInfo, convert_field},
    core::item::{ItemReader, ItemReaderResult},
    encoding::{DecodeFailure, EncodingSpec, TextDecoder},
    error::{CsvError, Position, Warning},
    options::{CsvOptions, Headers},
    stream::tokenizer::{RawRow, Token, Tokenizer},
    table::{Header, Row, Table},
};

const CHUNK_SIZE: usize = 8 * 1024;

/// A streaming CSV reader.
///
/// Rows are produced lazily, one [`CsvReader::shift`] at a time, from any
/// source implementing `Read`. Bytes are decoded in chunks, so arbitrarily
/// large sources never have to fit in memory. The reader is single-pass:
/// a pulled row is gone, and re-reading needs a fresh source.
///
/// # Examples
///
/// ```
/// use csv_engine::{CsvOptions, stream::csv_reader::CsvReaderBuilder};
///
/// let data = "name,value\nfoo,123\nbar,456\n";
/// let mut reader = CsvReaderBuilder::new()
///     .options(&CsvOptions::new().has_headers(true))
///     .from_reader(data.as_bytes())
///     .unwrap();
///
/// let first = reader.shift().unwrap().unwrap();
/// assert_eq!(first.get_by_name("name").and_then(|v| v.as_str()), Some("foo"));
///
/// let rest = reader.read_all().unwrap();
/// assert_eq!(rest.len(), 1);
///
/// // Exhausted readers keep answering end-of-stream.
/// assert!(reader.shift().unwrap().is_none());
/// assert!(reader.shift().unwrap().is_none());
/// ```
pub struct CsvReader<R> {
    /// Underlying source; `None` once closed.
    source: Option<R>,
    options: CsvOptions,
    decoder: TextDecoder,
    tokenizer: Tokenizer,
    chunk: Vec<u8>,
    decode_failure: Option<DecodeFailure>,
    header: Option<Arc<Header>>,
    awaiting_header: bool,
    finished: bool,
    warnings: Vec<Warning>,
}

impl<R: Read> CsvReader<R> {
    /// Pulls the next row, or `None` at end of stream.
    ///
    /// Once the stream is exhausted, failed, or closed, every further call
    /// returns `Ok(None)`.
    pub fn shift(&mut self) -> Result<Option<Row>, CsvError> {
        loop {
            let Some(raw) = self.next_raw()? else {
                return Ok(None);
            };
            if self.awaiting_header {
                self.capture_header(raw);
                continue;
            }
            if self.options.skip_blanks && raw.fields.is_empty() {
                continue;
            }
            return Ok(Some(self.to_row(raw)));
        }
    }

    /// Drains every remaining row.
    pub fn read_all(&mut self) -> Result<Vec<Row>, CsvError> {
        let mut rows = Vec::new();
        while let Some(row) = self.shift()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Drains every remaining row into a table sharing this reader's header.
    pub fn read_table(&mut self) -> Result<Table, CsvError> {
        let rows = self.read_all()?;
        Ok(Table::new(self.header.clone(), rows))
    }

    /// The header, reading it from the stream first if it is still pending.
    pub fn headers(&mut self) -> Result<Option<&Header>, CsvError> {
        if self.awaiting_header {
            if let Some(raw) = self.next_raw()? {
                self.capture_header(raw);
            }
        }
        Ok(self.header.as_deref())
    }

    /// Lines consumed so far.
    pub fn line(&self) -> usize {
        self.tokenizer.line() - 1
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn encoding_name(&self) -> &'static str {
        self.decoder.encoding_name()
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Releases the source. Safe at any point, any number of times; rows
    /// not yet pulled are discarded.
    pub fn close(&mut self) -> Result<(), CsvError> {
        if self.source.take().is_some() {
            debug!("Reader closed at line {}", self.line());
        }
        self.tokenizer.reset();
        self.decode_failure = None;
        self.finished = true;
        Ok(())
    }

    fn next_raw(&mut self) -> Result<Option<RawRow>, CsvError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            let token = match self.tokenizer.next_row() {
                Ok(token) => token,
                Err(error) => return Err(self.fail(error)),
            };
            match token {
                Token::Row(raw) => return Ok(Some(raw)),
                Token::End => {
                    debug!("End of stream at line {}", self.line());
                    self.finished = true;
                    return Ok(None);
                }
                Token::NeedInput => {
                    if let Err(error) = self.fill() {
                        return Err(self.fail(error));
                    }
                }
            }
        }
    }

    /// Decodes the next chunk of the source into the tokenizer.
    fn fill(&mut self) -> Result<(), CsvError> {
        if let Some(failure) = self.decode_failure.take() {
            return Err(CsvError::MalformedEncoding {
                encoding: self.decoder.encoding_name().to_string(),
                position: Position {
                    line: self.tokenizer.line(),
                    offset: failure.offset,
                },
            });
        }

        let Some(source) = self.source.as_mut() else {
            self.tokenizer.finish();
            return Ok(());
        };

        let read = loop {
            match source.read(&mut self.chunk) {
                Ok(read) => break read,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        };

        let last = read == 0;
        let mut text = String::new();
        if let Err(failure) = self.decoder.decode(&self.chunk[..read], &mut text, last) {
            self.decode_failure = Some(failure);
        }
        self.tokenizer.feed(&text);
        if last && self.decode_failure.is_none() {
            self.tokenizer.finish();
        }
        Ok(())
    }

    fn fail(&mut self, error: CsvError) -> CsvError {
        self.finished = true;
        error
    }

    fn capture_header(&mut self, raw: RawRow) {
        self.awaiting_header = false;
        let header = Header::with_converters(raw.fields, &self.options.header_converters);
        debug!("Header captured: {:?}", header.names());
        self.header = Some(Arc::new(header));
    }

    fn to_row(&self, raw: RawRow) -> Row {
        let header = self.header.as_deref();
        let converters = &self.options.converters;
        let fields = raw
            .fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| {
                if converters.is_empty() {
                    return field.into();
                }
                let info = FieldInfo {
                    index,
                    line: raw.line,
                    header: header.and_then(|h| h.name(index)),
                };
                convert_field(field, converters, &info)
            })
            .collect();

        match &self.header {
            Some(header) => Row::with_header(header.clone(), fields),
            None => Row::new(fields),
        }
    }
}

impl<R: Read> Iterator for CsvReader<R> {
    type Item = Result<Row, CsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.shift().transpose()
    }
}

impl<R: Read> ItemReader<Row> for CsvReader<R> {
    fn read(&mut self) -> ItemReaderResult<Row> {
        self.shift()
    }
}

/// A builder for configuring CSV reading.
///
/// # Examples
///
/// ```
/// use csv_engine::stream::csv_reader::CsvReaderBuilder;
///
/// let mut reader = CsvReaderBuilder::new()
///     .col_sep(";")
///     .has_headers(true)
///     .from_reader("name;age\nAlice;30".as_bytes())
///     .unwrap();
///
/// let row = reader.shift().unwrap().unwrap();
/// assert_eq!(row.get_by_name("age").and_then(|v| v.as_str()), Some("30"));
/// ```
#[derive(Default)]
pub struct CsvReaderBuilder {
    options: CsvOptions,
    text_input: bool,
}

impl CsvReaderBuilder {
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

    pub fn has_headers(mut self, yes: bool) -> Self {
        self.options = self.options.has_headers(yes);
        self
    }

    /// Treats the source as UTF-8 text whatever encoding is configured;
    /// only the `bom|` prefix still applies.
    pub fn text_input(mut self) -> Self {
        self.text_input = true;
        self
    }

    pub fn from_reader<R: Read>(self, rdr: R) -> Result<CsvReader<R>, CsvError> {
        self.options.validate()?;

        let (spec, warning) = EncodingSpec::resolve(self.options.encoding.as_deref());
        let spec = if self.text_input { spec.for_text() } else { spec };

        let header = match &self.options.headers {
            Headers::Explicit(names) => Some(Arc::new(Header::with_converters(
                names.clone(),
                &self.options.header_converters,
            ))),
            _ => None,
        };
        let awaiting_header = self.options.headers == Headers::FirstRow;

        debug!(
            "Start of stream: encoding {}, column separator {:?}",
            spec.name(),
            self.options.col_sep
        );

        Ok(CsvReader {
            source: Some(rdr),
            decoder: TextDecoder::new(spec),
            tokenizer: Tokenizer::new(&self.options),
            chunk: vec![0; CHUNK_SIZE],
            decode_failure: None,
            header,
            awaiting_header,
            finished: false,
            warnings: warning.into_iter().collect(),
            options: self.options,
        })
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvReader<File>, CsvError> {
        let file = File::open(path)?;
        self.from_reader(file)
    }
}
