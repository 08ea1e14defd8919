//! 批量处理结果

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::models::render_job::{DocumentType, OutputFormat};

/// 单个文件的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Error,
}

/// 已生成的产物
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub document_type: DocumentType,
    pub format: OutputFormat,
    pub path: PathBuf,
    /// 带账单编号前缀的名称，用于压缩包
    pub archive_name: String,
}

/// 未生成的产物及原因
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedArtifact {
    pub document_type: DocumentType,
    pub format: OutputFormat,
    pub reason: String,
}

/// 单个输入文件的处理记录，处理完成后不再修改
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub input_file: PathBuf,
    pub status: FileStatus,
    pub bill_id: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub generated_artifacts: Vec<Artifact>,
    pub skipped: Vec<SkippedArtifact>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl BatchResult {
    pub fn failed(input_file: PathBuf, error: impl ToString, duration_ms: u64) -> Self {
        Self {
            input_file,
            status: FileStatus::Error,
            bill_id: None,
            output_dir: None,
            generated_artifacts: Vec::new(),
            skipped: Vec::new(),
            error: Some(error.to_string()),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Success
    }
}

/// 整个批次的汇总
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub results: Vec<BatchResult>,
    pub archive_path: Option<PathBuf>,
    pub archive_error: Option<String>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub total_duration_ms: u64,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }

    /// 可读的汇总文本
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", "=".repeat(50)));
        out.push_str("BATCH PROCESSING SUMMARY\n");
        out.push_str(&format!("{}\n\n", "=".repeat(50)));
        out.push_str(&format!("Start Time: {}\n", self.started_at.format("%Y-%m-%d %H:%M:%S")));
        out.push_str(&format!("End Time: {}\n", self.finished_at.format("%Y-%m-%d %H:%M:%S")));
        out.push_str(&format!("Total Files: {}\n", self.total_files));
        out.push_str(&format!("Successfully Processed: {}\n", self.success_count));
        out.push_str(&format!("Failed: {}\n", self.error_count));

        let succeeded: Vec<_> = self.results.iter().filter(|r| r.is_success()).collect();
        if !succeeded.is_empty() {
            out.push_str(&format!("\nSUCCESSFULLY PROCESSED FILES:\n{}\n", "-".repeat(50)));
            for r in succeeded {
                out.push_str(&format!(
                    "- {} (Bill: {}, {} files, {} skipped)\n",
                    r.input_file.display(),
                    r.bill_id.as_deref().unwrap_or("N/A"),
                    r.generated_artifacts.len(),
                    r.skipped.len()
                ));
                for skip in &r.skipped {
                    out.push_str(&format!(
                        "    skipped {}: {}\n",
                        skip.format.file_name(skip.document_type),
                        skip.reason
                    ));
                }
            }
        }

        let failed: Vec<_> = self.results.iter().filter(|r| !r.is_success()).collect();
        if !failed.is_empty() {
            out.push_str(&format!("\nFAILED FILES:\n{}\n", "-".repeat(50)));
            for r in failed {
                out.push_str(&format!(
                    "- {}: {}\n",
                    r.input_file.display(),
                    r.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        match (&self.archive_path, &self.archive_error) {
            (Some(path), _) => out.push_str(&format!("\nArchive: {}\n", path.display())),
            (None, Some(err)) => out.push_str(&format!("\nArchive failed: {}\n", err)),
            (None, None) => {}
        }
        out
    }
}
