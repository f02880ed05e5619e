//! Sink registry: at most one live writer per destination.
//!
//! Destinations are identified by identity, never by content: two
//! [`Sink::shared`] values built from clones of the same `Arc` are the same
//! sink, two separately allocated buffers are not, even when equal.
//!
//! The registry owns its writers. An entry stays until the sink is closed
//! with [`SinkRegistry::close`] or the registry is cleared, so callers may
//! drop their handles between requests without losing writer state.

use std::{
    collections::HashMap,
    fmt,
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;

use crate::{
    error::CsvError,
    options::CsvOptions,
    stream::csv_writer::{CsvWriter, CsvWriterBuilder},
};

/// A writer handed out by the registry, shared between every caller asking
/// for the same sink.
pub type SharedCsvWriter = Arc<Mutex<CsvWriter<SinkHandle>>>;

type SharedWrite = Arc<Mutex<dyn Write + Send>>;

/// Identity of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkId {
    Stdout,
    Handle(usize),
}

/// A destination for CSV output.
#[derive(Clone, Default)]
pub enum Sink {
    /// The process's standard output.
    #[default]
    Stdout,
    Shared(SharedWrite),
}

impl Sink {
    pub fn stdout() -> Self {
        Sink::Stdout
    }

    /// Wraps a shared destination; its identity is the `Arc` allocation.
    pub fn shared<W: Write + Send + 'static>(target: Arc<Mutex<W>>) -> Self {
        Sink::Shared(target)
    }

    pub fn id(&self) -> SinkId {
        match self {
            Sink::Stdout => SinkId::Stdout,
            Sink::Shared(target) => SinkId::Handle(Arc::as_ptr(target) as *const () as usize),
        }
    }

    fn handle(&self) -> SinkHandle {
        SinkHandle { sink: self.clone() }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sink").field(&self.id()).finish()
    }
}

/// `Write` adapter over a [`Sink`], owned by registry writers.
pub struct SinkHandle {
    sink: Sink,
}

impl SinkHandle {
    pub fn id(&self) -> SinkId {
        self.sink.id()
    }
}

impl Write for SinkHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.sink {
            Sink::Stdout => io::stdout().write(buf),
            Sink::Shared(target) => lock(target).write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.sink {
            Sink::Stdout => io::stdout().flush(),
            Sink::Shared(target) => lock(target).flush(),
        }
    }
}

/// Process-wide map from sink identity to its live writer.
///
/// Lookups are serialized, so concurrent requests for one sink still end
/// up with a single writer.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use csv_engine::{CsvOptions, registry::{Sink, SinkRegistry}};
///
/// let registry = SinkRegistry::new();
/// let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
/// let sink = Sink::shared(buffer.clone());
///
/// let first = registry.get_or_create_writer(&sink, &CsvOptions::new()).unwrap();
/// let second = registry.get_or_create_writer(&sink, &CsvOptions::new()).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
///
/// first.lock().unwrap().write_row(["a", "b"]).unwrap();
/// second.lock().unwrap().write_row(["c", "d"]).unwrap();
/// assert_eq!(buffer.lock().unwrap().as_slice(), b"a,b\nc,d\n");
/// ```
#[derive(Default)]
pub struct SinkRegistry {
    writers: Mutex<HashMap<SinkId, SharedCsvWriter>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registered writer for `sink`, creating it with `options`
    /// when there is none.
    ///
    /// `options` only matter on creation; an existing writer keeps its own.
    pub fn get_or_create_writer(&self, sink: &Sink, options: &CsvOptions) -> Result<SharedCsvWriter, CsvError> {
        let id = sink.id();
        let mut writers = lock(&self.writers);

        if let Some(writer) = writers.get(&id) {
            debug!("Reusing writer for {:?}", id);
            return Ok(writer.clone());
        }

        let writer = CsvWriterBuilder::new().options(options).from_writer(sink.handle())?;
        let writer = Arc::new(Mutex::new(writer));
        writers.insert(id, writer.clone());
        debug!("Created writer for {:?}", id);
        Ok(writer)
    }

    /// The writer for standard output.
    pub fn stdout_writer(&self, options: &CsvOptions) -> Result<SharedCsvWriter, CsvError> {
        self.get_or_create_writer(&Sink::Stdout, options)
    }

    /// Evicts the writer for `sink` and closes it.
    ///
    /// Closing an unknown or already closed sink is a no-op.
    pub fn close(&self, sink: &Sink) -> Result<(), CsvError> {
        let evicted = lock(&self.writers).remove(&sink.id());
        match evicted {
            Some(writer) => {
                debug!("Closing writer for {:?}", sink.id());
                lock(&writer).close()
            }
            None => Ok(()),
        }
    }

    /// Forgets every entry without closing the writers; handles already
    /// given out keep working.
    pub fn clear(&self) {
        lock(&self.writers).clear();
    }

    /// Number of registered writers.
    pub fn len(&self) -> usize {
        lock(&self.writers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, sink: &Sink) -> bool {
        lock(&self.writers).contains_key(&sink.id())
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::{
        error::Error,
        sync::{Arc, Mutex},
        thread,
    };

    use super::{Sink, SinkId, SinkRegistry};
    use crate::options::CsvOptions;

    fn buffer() -> Arc<Mutex<Vec<u8>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn identity_should_follow_the_allocation() {
        let a = buffer();
        let b = buffer();
        assert_eq!(Sink::shared(a.clone()).id(), Sink::shared(a).id());
        assert_ne!(Sink::shared(b).id(), Sink::stdout().id());
        assert_eq!(Sink::default().id(), SinkId::Stdout);
    }

    #[test]
    fn distinct_sinks_should_get_distinct_writers() -> Result<(), Box<dyn Error>> {
        let registry = SinkRegistry::new();
        let options = CsvOptions::new();
        let first = registry.get_or_create_writer(&Sink::shared(buffer()), &options)?;
        let second = registry.get_or_create_writer(&Sink::shared(buffer()), &options)?;

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 2);
        Ok(())
    }

    #[test]
    fn existing_writer_should_keep_its_options() -> Result<(), Box<dyn Error>> {
        let registry = SinkRegistry::new();
        let target = buffer();
        let sink = Sink::shared(target.clone());

        let first = registry.get_or_create_writer(&sink, &CsvOptions::new().col_sep(";"))?;
        let second = registry.get_or_create_writer(&sink, &CsvOptions::new().col_sep("|"))?;
        second.lock().map_err(|e| e.to_string())?.write_row([1, 2])?;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(target.lock().map_err(|e| e.to_string())?.as_slice(), b"1;2\n");
        Ok(())
    }

    #[test]
    fn close_should_evict_and_close_the_writer() -> Result<(), Box<dyn Error>> {
        let registry = SinkRegistry::new();
        let sink = Sink::shared(buffer());

        let writer = registry.get_or_create_writer(&sink, &CsvOptions::new())?;
        registry.close(&sink)?;
        registry.close(&sink)?;

        assert!(writer.lock().map_err(|e| e.to_string())?.is_closed());
        assert!(!registry.contains(&sink));

        let reopened = registry.get_or_create_writer(&sink, &CsvOptions::new())?;
        assert!(!Arc::ptr_eq(&writer, &reopened));
        Ok(())
    }

    #[test]
    fn dropped_handles_should_keep_the_entry() -> Result<(), Box<dyn Error>> {
        let registry = SinkRegistry::new();
        let target = buffer();
        let sink = Sink::shared(target.clone());
        let options = CsvOptions::new().header_names(["h"]).write_headers(true);

        {
            let writer = registry.get_or_create_writer(&sink, &options)?;
            writer.lock().map_err(|e| e.to_string())?.write_row(["1"])?;
        }
        assert!(registry.contains(&sink));
        assert_eq!(registry.len(), 1);

        let writer = registry.get_or_create_writer(&sink, &options)?;
        writer.lock().map_err(|e| e.to_string())?.write_row(["2"])?;
        assert_eq!(writer.lock().map_err(|e| e.to_string())?.lines(), 3);
        assert_eq!(target.lock().map_err(|e| e.to_string())?.as_slice(), b"h\n1\n2\n");

        registry.clear();
        assert!(registry.is_empty());
        Ok(())
    }

    #[test]
    fn concurrent_lookups_should_share_one_writer() -> Result<(), Box<dyn Error>> {
        let registry = Arc::new(SinkRegistry::new());
        let target = buffer();
        let sink = Sink::shared(target.clone());
        let keep = registry.get_or_create_writer(&sink, &CsvOptions::new())?;

        let workers: Vec<_> = (0..4)
            .map(|n| {
                let registry = registry.clone();
                let sink = sink.clone();
                thread::spawn(move || {
                    let writer = registry.get_or_create_writer(&sink, &CsvOptions::new())?;
                    let mut writer = writer.lock().map_err(|e| e.to_string())?;
                    writer.write_row([n])?;
                    Ok::<_, Box<dyn Error + Send + Sync>>(())
                })
            })
            .collect();
        for worker in workers {
            worker.join().map_err(|_| "worker panicked")?.map_err(|e| e.to_string())?;
        }

        assert_eq!(registry.len(), 1);
        assert_eq!(keep.lock().map_err(|e| e.to_string())?.lines(), 4);
        assert_eq!(target.lock().map_err(|e| e.to_string())?.len(), 8);
        Ok(())
    }
}
