/// Pull-based reader turning a byte source into rows.
pub mod csv_reader;

/// Writer serializing rows to a byte sink.
pub mod csv_writer;

pub(crate) mod tokenizer;
