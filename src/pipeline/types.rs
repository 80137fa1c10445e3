//! Pipeline report types

use crate::split::SplitReport;
use crate::upload::UploadReport;
use crate::warehouse::LoadReport;

/// Outcome of a full pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    /// One entry per input file, in processing order
    pub splits: Vec<SplitReport>,
    /// Aggregate upload outcome
    pub upload: UploadReport,
    /// Stage and tables loaded
    pub load: LoadReport,
}

impl PipelineReport {
    /// Records read across all inputs
    pub fn total_records(&self) -> usize {
        self.splits.iter().map(|s| s.records).sum()
    }

    /// Batch files written across all inputs
    pub fn total_files(&self) -> usize {
        self.splits.iter().map(|s| s.files.len()).sum()
    }

    /// One-line summary for the final log line
    pub fn summary(&self) -> String {
        format!(
            "{} records in {} files from {} inputs; {} uploaded, {} failed; {} tables loaded",
            self.total_records(),
            self.total_files(),
            self.splits.len(),
            self.upload.uploaded.len(),
            self.upload.failed.len(),
            self.load.tables.len()
        )
    }
}
