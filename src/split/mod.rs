//! Split module
//!
//! Partitions newline-delimited JSON files into fixed-size batch files.
//!
//! # Overview
//!
//! Splitting runs in separate steps so the pure part can be tested alone:
//! - Deriving the dataset name from the input file name
//! - Reading and parsing every line (fail fast on the first bad line)
//! - Computing contiguous batches (pure)
//! - Resetting the dataset's output directory
//! - Writing each batch as a pretty-printed JSON array

mod splitter;

pub use splitter::{
    compute_batches, dataset_name, discover_inputs, read_records, reset_target, split_file,
    write_batches, FileSplitter, SplitReport,
};
