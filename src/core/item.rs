use crate::error::CsvError;

/// Result of pulling one item: `Ok(None)` marks the end of the stream.
pub type ItemReaderResult<I> = Result<Option<I>, CsvError>;

/// A source of items, pulled one at a time.
pub trait ItemReader<I> {
    /// Returns the next item, or `Ok(None)` once exhausted.
    ///
    /// Calling again after the end keeps returning `Ok(None)`.
    fn read(&mut self) -> ItemReaderResult<I>;
}

/// Business logic applied to every item between reading and writing.
pub trait ItemProcessor<I, O> {
    fn process(&mut self, item: I) -> Result<O, CsvError>;
}

impl<I, O, F> ItemProcessor<I, O> for F
where
    F: FnMut(I) -> Result<O, CsvError>,
{
    fn process(&mut self, item: I) -> Result<O, CsvError> {
        self(item)
    }
}

/// A destination of items.
pub trait ItemWriter<O> {
    fn write(&mut self, item: &O) -> Result<(), CsvError>;
    fn flush(&mut self) -> Result<(), CsvError>;
    fn open(&mut self) -> Result<(), CsvError> {
        Ok(())
    }
    fn close(&mut self) -> Result<(), CsvError> {
        Ok(())
    }
}
