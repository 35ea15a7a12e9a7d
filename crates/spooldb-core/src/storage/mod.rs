//! Storage: record files, atomic replacement and scratch space.

pub mod file;
pub mod scratch;

pub use file::{RecordReader, RecordWriter, append_record, replace_atomically, write_records};
pub use scratch::{ScratchDir, ScratchFile};
