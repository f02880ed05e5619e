#![allow(dead_code)]

mod mocks;

pub use mocks::MockSink;

use std::io::Write;

use tempfile::NamedTempFile;

/// Writes `content` to a fresh temporary file.
pub fn temp_csv(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Unable to create temporary file");
    file.write_all(content).expect("Unable to write temporary file");
    file.flush().expect("Unable to flush temporary file");
    file
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
