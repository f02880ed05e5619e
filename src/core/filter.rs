use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::error::CsvError;

use super::item::{ItemProcessor, ItemReader, ItemWriter};

/// Summary of a completed filter run.
#[derive(Debug, Clone, Copy)]
pub struct FilterResult {
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
    pub read_count: usize,
    pub write_count: usize,
}

/// A single pass over a reader: every item is transformed and written
/// before the next one is pulled.
///
/// The filter borrows its reader and writer; it flushes the writer when the
/// source is exhausted but leaves closing both to their owner.
///
/// # Examples
///
/// ```
/// use csv_engine::{
///     CsvError, CsvOptions, Row,
///     core::filter::FilterBuilder,
///     stream::{csv_reader::CsvReaderBuilder, csv_writer::CsvWriterBuilder},
/// };
///
/// let mut reader = CsvReaderBuilder::new()
///     .col_sep(";")
///     .from_reader("a;b\nc;d\n".as_bytes())
///     .unwrap();
/// let mut writer = CsvWriterBuilder::new()
///     .options(&CsvOptions::new().col_sep("|"))
///     .from_writer(Vec::new())
///     .unwrap();
/// let mut upper = |row: Row| -> Result<Row, CsvError> {
///     Ok(row.iter().map(|v| v.to_string().to_uppercase()).collect())
/// };
///
/// let result = FilterBuilder::new()
///     .reader(&mut reader)
///     .processor(&mut upper)
///     .writer(&mut writer)
///     .build()
///     .unwrap()
///     .run()
///     .unwrap();
///
/// assert_eq!(result.write_count, 2);
/// assert_eq!(writer.into_inner().unwrap(), b"A|B\nC|D\n");
/// ```
pub struct Filter<'a, I, O> {
    reader: &'a mut dyn ItemReader<I>,
    processor: &'a mut dyn ItemProcessor<I, O>,
    writer: &'a mut dyn ItemWriter<O>,
}

impl<I, O> Filter<'_, I, O> {
    /// Runs the pipeline to the end of the source.
    ///
    /// Read, transform and write failures stop the run at once; an item
    /// whose transform failed is never written.
    pub fn run(&mut self) -> Result<FilterResult, CsvError> {
        let start = Instant::now();
        let mut read_count = 0;
        let mut write_count = 0;

        debug!("Start of filter");
        self.writer.open()?;

        while let Some(item) = self.reader.read().inspect_err(|err| {
            error!("Error occured during read item: {}", err);
        })? {
            read_count += 1;

            let item = self.processor.process(item).inspect_err(|err| {
                error!("Error occured during transform of item {}: {}", read_count, err);
            })?;

            self.writer.write(&item).inspect_err(|err| {
                error!("ItemWriter error: {}", err);
            })?;
            write_count += 1;
        }

        self.writer.flush()?;
        debug!("End of filter");

        let result = FilterResult {
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            read_count,
            write_count,
        };
        info!(
            "Filter done: {} read, {} written in {:?}",
            result.read_count, result.write_count, result.duration
        );
        Ok(result)
    }
}

pub struct FilterBuilder<'a, I, O> {
    reader: Option<&'a mut dyn ItemReader<I>>,
    processor: Option<&'a mut dyn ItemProcessor<I, O>>,
    writer: Option<&'a mut dyn ItemWriter<O>>,
}

impl<I, O> Default for FilterBuilder<'_, I, O> {
    fn default() -> Self {
        Self {
            reader: None,
            processor: None,
            writer: None,
        }
    }
}

impl<'a, I, O> FilterBuilder<'a, I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reader(mut self, reader: &'a mut impl ItemReader<I>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn processor(mut self, processor: &'a mut impl ItemProcessor<I, O>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn writer(mut self, writer: &'a mut impl ItemWriter<O>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn build(self) -> Result<Filter<'a, I, O>, CsvError> {
        let missing = |part: &str| CsvError::InvalidInput(format!("filter has no {}", part));
        Ok(Filter {
            reader: self.reader.ok_or_else(|| missing("reader"))?,
            processor: self.processor.ok_or_else(|| missing("processor"))?,
            writer: self.writer.ok_or_else(|| missing("writer"))?,
        })
    }
}
