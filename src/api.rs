//! One-call entry points over readers, writers, tables and filters.
//!
//! Every function takes its options by reference and works on a private
//! copy, so the caller's value is never changed.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use crate::{
    convert::{Converter, HeaderConverter},
    core::filter::{FilterBuilder, FilterResult},
    error::CsvError,
    options::{CsvOptions, Headers},
    registry::{SharedCsvWriter, Sink, SinkRegistry},
    stream::{
        csv_reader::{CsvReader, CsvReaderBuilder},
        csv_writer::{CsvWriter, CsvWriterBuilder},
    },
    table::{Row, Table},
    value::Value,
};

/// Parses CSV text into a table.
///
/// The text is already decoded, so only the `bom|` part of a configured
/// encoding applies.
///
/// ```
/// use csv_engine::{CsvOptions, parse};
///
/// let options = CsvOptions::new().col_sep("\t").row_sep("\r\n");
/// let table = parse("1\t2\t3\r\n4\t5\r\n", &options).unwrap();
/// assert_eq!(table.rows(), &[vec!["1", "2", "3"], vec!["4", "5"]]);
/// ```
pub fn parse(text: &str, options: &CsvOptions) -> Result<Table, CsvError> {
    CsvReaderBuilder::new()
        .options(options)
        .text_input()
        .from_reader(text.as_bytes())?
        .read_table()
}

/// Parses raw bytes in the configured encoding into a table.
pub fn parse_bytes(bytes: &[u8], options: &CsvOptions) -> Result<Table, CsvError> {
    CsvReaderBuilder::new().options(options).from_reader(bytes)?.read_table()
}

/// Parses the first row of `text`, or `None` when there is none.
///
/// ```
/// use csv_engine::{CsvOptions, parse_line};
///
/// let row = parse_line("1;2;3", &CsvOptions::new().col_sep(";")).unwrap();
/// assert_eq!(row.unwrap(), vec!["1", "2", "3"]);
/// assert!(parse_line("", &CsvOptions::new()).unwrap().is_none());
/// ```
pub fn parse_line(text: &str, options: &CsvOptions) -> Result<Option<Row>, CsvError> {
    let mut reader = CsvReaderBuilder::new()
        .options(options)
        .text_input()
        .from_reader(text.as_bytes())?;
    let row = reader.shift()?;
    reader.close()?;
    Ok(row)
}

/// Reads every row of the file at `path`.
pub fn read_all<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<Vec<Row>, CsvError> {
    with_reader(path, options, |reader| reader.read_all())
}

/// Reads every row of `rdr`.
pub fn read_all_from<R: Read>(rdr: R, options: &CsvOptions) -> Result<Vec<Row>, CsvError> {
    CsvReaderBuilder::new().options(options).from_reader(rdr)?.read_all()
}

/// Options used by [`build_table`]: header capture, numeric conversion and
/// symbolized header names, unless `options` already configures them.
pub fn table_options(options: &CsvOptions) -> CsvOptions {
    let mut options = options.clone();
    if options.headers == Headers::None {
        options = options.headers(Headers::FirstRow);
    }
    if options.converters.is_empty() {
        options = options.converter(Converter::Numeric);
    }
    if options.header_converters.is_empty() {
        options = options.header_converter(HeaderConverter::Symbol);
    }
    options
}

/// Reads the file at `path` into a table, see [`table_options`].
pub fn build_table<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<Table, CsvError> {
    with_reader(path, &table_options(options), |reader| reader.read_table())
}

/// Reads `rdr` into a table, see [`table_options`].
///
/// ```
/// use csv_engine::{CsvOptions, Value, build_table_from};
///
/// let table = build_table_from("First Name,Age\nann,31\n".as_bytes(), &CsvOptions::new()).unwrap();
/// assert_eq!(table.headers().unwrap(), &vec!["first_name", "age"]);
/// assert_eq!(table[0].get_by_name("age"), Some(&Value::Int(31)));
/// ```
pub fn build_table_from<R: Read>(rdr: R, options: &CsvOptions) -> Result<Table, CsvError> {
    CsvReaderBuilder::new()
        .options(&table_options(options))
        .from_reader(rdr)?
        .read_table()
}

/// Renders the rows written by `block` as text.
///
/// ```
/// use csv_engine::{CsvOptions, generate};
///
/// let text = generate(&CsvOptions::new(), |writer| {
///     writer.write_row(["a", "b,c"])?;
///     writer.write_row([1, 2])
/// })
/// .unwrap();
/// assert_eq!(text, "a,\"b,c\"\n1,2\n");
/// ```
pub fn generate<F>(options: &CsvOptions, block: F) -> Result<String, CsvError>
where
    F: FnOnce(&mut CsvWriter<Vec<u8>>) -> Result<(), CsvError>,
{
    let mut writer = CsvWriterBuilder::new()
        .options(options)
        .text_output()
        .from_writer(Vec::new())?;
    block(&mut writer)?;
    into_text(writer)
}

/// Renders a single row, row separator included.
pub fn generate_line<I>(row: I, options: &CsvOptions) -> Result<String, CsvError>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    generate(options, |writer| writer.write_row(row))
}

/// Copies `source` to `dest` through `transform`.
///
/// `in_options` drive parsing, `out_options` drive writing; they may use
/// different separators. A transform error stops the copy before the
/// failing row is written.
pub fn filter<R, W, F>(
    source: R,
    dest: W,
    in_options: &CsvOptions,
    out_options: &CsvOptions,
    mut transform: F,
) -> Result<FilterResult, CsvError>
where
    R: Read,
    W: Write,
    F: FnMut(Row) -> Result<Row, CsvError>,
{
    let mut reader = CsvReaderBuilder::new().options(in_options).from_reader(source)?;
    let mut writer = CsvWriterBuilder::new().options(out_options).from_writer(dest)?;

    let result = FilterBuilder::new()
        .reader(&mut reader)
        .processor(&mut transform)
        .writer(&mut writer)
        .build()?
        .run();

    reader.close()?;
    writer.close()?;
    result
}

/// Opens the file at `path` for reading.
pub fn open_reader<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<CsvReader<File>, CsvError> {
    CsvReaderBuilder::new().options(options).from_path(path)
}

/// Creates (or truncates) the file at `path` for writing.
pub fn open_writer<P: AsRef<Path>>(
    path: P,
    options: &CsvOptions,
) -> Result<CsvWriter<BufWriter<File>>, CsvError> {
    CsvWriterBuilder::new().options(options).from_path(path)
}

/// Runs `block` over a reader on `path`; the reader is closed afterwards,
/// whatever `block` returned.
pub fn with_reader<P, T, F>(path: P, options: &CsvOptions, block: F) -> Result<T, CsvError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut CsvReader<File>) -> Result<T, CsvError>,
{
    let mut reader = open_reader(path, options)?;
    let result = block(&mut reader);
    reader.close()?;
    result
}

/// Runs `block` over a writer on `path`; the writer is flushed and closed
/// afterwards, whatever `block` returned.
pub fn with_writer<P, T, F>(path: P, options: &CsvOptions, block: F) -> Result<T, CsvError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut CsvWriter<BufWriter<File>>) -> Result<T, CsvError>,
{
    let mut writer = open_writer(path, options)?;
    let result = block(&mut writer);
    let closed = writer.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Calls `f` on each row of the file at `path`.
pub fn foreach<P, F>(path: P, options: &CsvOptions, mut f: F) -> Result<(), CsvError>
where
    P: AsRef<Path>,
    F: FnMut(Row) -> Result<(), CsvError>,
{
    with_reader(path, options, |reader| {
        while let Some(row) = reader.shift()? {
            f(row)?;
        }
        Ok(())
    })
}

/// Shorthand for [`SinkRegistry::get_or_create_writer`].
pub fn get_or_create_writer(
    registry: &SinkRegistry,
    sink: &Sink,
    options: &CsvOptions,
) -> Result<SharedCsvWriter, CsvError> {
    registry.get_or_create_writer(sink, options)
}

fn into_text(writer: CsvWriter<Vec<u8>>) -> Result<String, CsvError> {
    let bytes = writer.into_inner()?;
    String::from_utf8(bytes).map_err(|e| CsvError::InvalidInput(e.to_string()))
}
