//! File splitter implementation

use crate::config::StagingConfig;
use crate::error::{Error, Result, ResultExt};
use crate::types::{BatchFile, DatasetName, JsonValue};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of splitting one input file
#[derive(Debug, Clone)]
pub struct SplitReport {
    /// Dataset derived from the input file name
    pub dataset: DatasetName,
    /// Input file that was split
    pub input: PathBuf,
    /// Directory holding the batch files
    pub output_dir: PathBuf,
    /// Total records read
    pub records: usize,
    /// Batch files written, in sequence order
    pub files: Vec<BatchFile>,
}

/// Splits input files into batches under one output root
#[derive(Debug, Clone)]
pub struct FileSplitter {
    output_root: PathBuf,
    batch_size: usize,
}

impl FileSplitter {
    /// Create a splitter writing under `output_root`
    pub fn new(output_root: impl Into<PathBuf>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::invalid_value(
                "STAGING.no_of_lines",
                "batch size must be a positive integer",
            ));
        }
        Ok(Self {
            output_root: output_root.into(),
            batch_size,
        })
    }

    /// Create a splitter from the staging settings
    pub fn from_config(config: &StagingConfig) -> Result<Self> {
        Self::new(&config.output_folder_path, config.no_of_lines)
    }

    /// Output root directory
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Maximum records per batch file
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Split one input file
    ///
    /// The input is fully parsed before the dataset directory is reset, so a
    /// malformed file leaves any previous output untouched.
    pub fn split(&self, input: impl AsRef<Path>) -> Result<SplitReport> {
        let input = input.as_ref();
        let dataset = dataset_name(input)?;
        let records = read_records(input)?;
        let batches = compute_batches(&records, self.batch_size)?;

        let output_dir = reset_target(&self.output_root, &dataset)?;
        let files = write_batches(&output_dir, &dataset, &batches)?;

        info!(
            dataset = %dataset,
            records = records.len(),
            files = files.len(),
            "Split {}",
            input.display()
        );

        Ok(SplitReport {
            dataset,
            input: input.to_path_buf(),
            output_dir,
            records: records.len(),
            files,
        })
    }
}

/// Split `input` into batches of `batch_size` under `output_root`
pub fn split_file(
    input: impl AsRef<Path>,
    output_root: impl Into<PathBuf>,
    batch_size: usize,
) -> Result<SplitReport> {
    FileSplitter::new(output_root, batch_size)?.split(input)
}

/// Dataset name for an input file
pub fn dataset_name(path: impl AsRef<Path>) -> Result<DatasetName> {
    DatasetName::from_path(path)
}

/// List the `.json` files directly inside `input_dir`, sorted by name
pub fn discover_inputs(input_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let input_dir = input_dir.as_ref();
    let entries = fs::read_dir(input_dir).map_err(|e| {
        Error::input(format!(
            "Failed to read input directory {}: {e}",
            input_dir.display()
        ))
    })?;

    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "json");
        if is_json && path.is_file() {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Read a newline-delimited JSON file, one value per line
///
/// The first line that fails to parse aborts the read.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<JsonValue>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::InputNotFound {
            path: path.display().to_string(),
        },
        _ => Error::input(format!("Failed to read {}: {e}", path.display())),
    })?;

    content
        .lines()
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| Error::MalformedLine {
                path: path.display().to_string(),
                line: idx + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Partition records into contiguous batches of at most `batch_size`
pub fn compute_batches(records: &[JsonValue], batch_size: usize) -> Result<Vec<&[JsonValue]>> {
    if batch_size == 0 {
        return Err(Error::invalid_value(
            "STAGING.no_of_lines",
            "batch size must be a positive integer",
        ));
    }
    Ok(records.chunks(batch_size).collect())
}

/// Remove `output_root/dataset` if present and recreate it empty
pub fn reset_target(output_root: impl AsRef<Path>, dataset: &DatasetName) -> Result<PathBuf> {
    let dir = output_root.as_ref().join(dataset.as_str());

    if dir.exists() {
        debug!(dir = %dir.display(), "Clearing previous split output");
        fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to clear {}", dir.display()))?;
    }
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    Ok(dir)
}

/// Write each batch as a pretty-printed JSON array
///
/// Files are named `{dataset}_{count}_part_{seq}.json` with `seq` starting at 1.
pub fn write_batches(
    dir: impl AsRef<Path>,
    dataset: &DatasetName,
    batches: &[&[JsonValue]],
) -> Result<Vec<BatchFile>> {
    let dir = dir.as_ref();
    let mut files = Vec::with_capacity(batches.len());

    for (idx, batch) in batches.iter().enumerate() {
        let sequence = idx + 1;
        let path = dir.join(BatchFile::file_name(dataset, batch.len(), sequence));

        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let mut ser =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        batch.serialize(&mut ser)?;
        writer.flush()?;

        debug!(path = %path.display(), records = batch.len(), "Wrote batch file");
        files.push(BatchFile {
            dataset: dataset.clone(),
            records: batch.len(),
            sequence,
            path,
        });
    }

    Ok(files)
}
