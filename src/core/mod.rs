/// Reader, processor and writer seams shared by streams and pipelines.
pub mod item;

/// Single-pass read, transform and write pipeline.
pub mod filter;
