//! 输出校验服务
//!
//! 只读检查输出目录：每个账单目录中的必需文件、文件大小、以及根目录中的压缩包。

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::render_job::{DocumentType, OutputFormat};

/// 默认必需的文档类型
pub const REQUIRED_DOCUMENTS: [DocumentType; 6] = [
    DocumentType::FirstPage,
    DocumentType::DeviationStatement,
    DocumentType::ExtraItems,
    DocumentType::NoteSheet,
    DocumentType::CertificateIi,
    DocumentType::CertificateIii,
];

/// 校验报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub bill_count: usize,
    /// 找到的必需文件数量
    pub file_count: usize,
    pub archive: Option<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: String) {
        error!("❌ {}", message);
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        warn!("⚠️ {}", message);
        self.warnings.push(message);
    }

    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\n{}\n", "=".repeat(50)));
        out.push_str("VERIFICATION SUMMARY\n");
        out.push_str(&format!("{}\n", "=".repeat(50)));
        out.push_str(&format!("\n• Verified {} bill directories\n", self.bill_count));
        out.push_str(&format!("• Verified {} output files\n", self.file_count));

        if !self.warnings.is_empty() {
            out.push_str(&format!("\nWARNINGS ({}):\n", self.warnings.len()));
            for (i, w) in self.warnings.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", i + 1, w));
            }
        }
        if self.errors.is_empty() {
            out.push_str("\n✅ Verification passed successfully\n");
        } else {
            out.push_str(&format!("\nERRORS ({}):\n", self.errors.len()));
            for (i, e) in self.errors.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", i + 1, e));
            }
            out.push_str("\n❌ Verification failed\n");
        }
        out.push_str(&format!("{}\n", "=".repeat(50)));
        out
    }
}

/// 输出校验器
#[derive(Debug, Clone)]
pub struct OutputVerifier {
    root: PathBuf,
    documents: Vec<DocumentType>,
    formats: Vec<OutputFormat>,
}

impl OutputVerifier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            documents: REQUIRED_DOCUMENTS.to_vec(),
            formats: OutputFormat::ALL.to_vec(),
        }
    }

    pub fn with_required(mut self, documents: Vec<DocumentType>, formats: Vec<OutputFormat>) -> Self {
        self.documents = documents;
        self.formats = formats;
        self
    }

    pub fn run(&self) -> VerificationReport {
        let mut report = VerificationReport::default();
        info!("🔍 开始校验输出目录: {}", self.root.display());

        if !self.root.is_dir() {
            report.error(format!("Output directory not found: {}", self.root.display()));
            return report;
        }

        let bill_dirs = match self.bill_dirs() {
            Ok(dirs) => dirs,
            Err(e) => {
                report.error(format!("Cannot read output directory {}: {}", self.root.display(), e));
                return report;
            }
        };
        report.bill_count = bill_dirs.len();
        if bill_dirs.is_empty() {
            report.error("No bill directories found in the output directory".to_string());
            return report;
        }
        info!("找到 {} 个账单目录", bill_dirs.len());

        for dir in &bill_dirs {
            self.verify_bill_dir(dir, &mut report);
        }

        match self.find_archive() {
            Some(archive) => {
                self.verify_archive(&archive, &mut report);
                report.archive = Some(archive);
            }
            None => report.warning("No ZIP archive found in the output directory".to_string()),
        }

        report
    }

    /// 非隐藏子目录，按名称排序
    fn bill_dirs(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if entry.file_type()?.is_dir() && !hidden {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn find_archive(&self) -> Option<PathBuf> {
        let mut archives: Vec<PathBuf> = std::fs::read_dir(&self.root)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "zip"))
            .collect();
        archives.sort();
        archives.into_iter().next()
    }

    fn verify_bill_dir(&self, dir: &Path, report: &mut VerificationReport) {
        let bill = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        for doc in &self.documents {
            for format in &self.formats {
                let file_name = format.file_name(*doc);
                match std::fs::metadata(dir.join(&file_name)) {
                    Ok(meta) if meta.is_file() => {
                        report.file_count += 1;
                        if meta.len() == 0 {
                            report.error(format!("Empty file in {}: {}", bill, file_name));
                        }
                    }
                    _ => report.error(format!("Missing file in {}: {}", bill, file_name)),
                }
            }
        }
    }

    fn verify_archive(&self, archive: &Path, report: &mut VerificationReport) {
        let name = archive.display().to_string();
        let mut zip = match File::open(archive)
            .map_err(|e| e.to_string())
            .and_then(|f| zip::ZipArchive::new(f).map_err(|e| e.to_string()))
        {
            Ok(zip) => zip,
            Err(e) => {
                report.error(format!("Invalid ZIP file {}: {}", name, e));
                return;
            }
        };

        if zip.is_empty() {
            report.error(format!("ZIP file is empty: {}", name));
            return;
        }

        let expected = report.bill_count * self.documents.len() * self.formats.len();
        if zip.len() < expected {
            report.warning(format!(
                "ZIP file may be incomplete. Expected at least {} files, found {}",
                expected,
                zip.len()
            ));
        }

        for i in 0..zip.len() {
            match zip.by_index(i) {
                Ok(entry) if entry.is_file() && entry.size() == 0 => {
                    let entry_name = entry.name().to_string();
                    report.error(format!("Empty file in ZIP: {}", entry_name));
                }
                Ok(_) => {}
                Err(e) => report.error(format!("Unreadable ZIP entry #{} in {}: {}", i, name, e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_complete_bill(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for doc in REQUIRED_DOCUMENTS {
            for format in OutputFormat::ALL {
                std::fs::write(dir.join(format.file_name(doc)), b"content").unwrap();
            }
        }
        dir
    }

    fn write_archive(root: &Path, entries: usize) {
        let file = File::create(root.join("billing_documents.zip")).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for i in 0..entries {
            zip.start_file(format!("bill/file_{}.html", i), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"x").unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_complete_output_passes() {
        let root = tempfile::tempdir().unwrap();
        write_complete_bill(root.path(), "bill_a");
        write_complete_bill(root.path(), "bill_b");
        write_archive(root.path(), 36);

        let report = OutputVerifier::new(root.path()).run();
        assert!(report.is_success(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
        assert_eq!(report.bill_count, 2);
        assert_eq!(report.file_count, 36);
    }

    #[test]
    fn test_one_missing_file_is_exactly_one_error() {
        let root = tempfile::tempdir().unwrap();
        write_complete_bill(root.path(), "B0");
        let b1 = write_complete_bill(root.path(), "B1");
        std::fs::remove_file(b1.join("certificate_iii.pdf")).unwrap();
        write_archive(root.path(), 36);

        let report = OutputVerifier::new(root.path()).run();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("B1"));
        assert!(report.errors[0].contains("certificate_iii.pdf"));
    }

    #[test]
    fn test_missing_archive_is_a_warning() {
        let root = tempfile::tempdir().unwrap();
        write_complete_bill(root.path(), "bill_a");

        let report = OutputVerifier::new(root.path()).run();
        assert!(report.is_success());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.summary_text().contains("Verification passed"));
    }

    #[test]
    fn test_empty_files_and_short_archive() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_complete_bill(root.path(), "bill_a");
        std::fs::write(dir.join("note_sheet.html"), b"").unwrap();
        write_archive(root.path(), 3);

        let report = OutputVerifier::new(root.path()).run();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("note_sheet.html"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_no_bill_directories_and_missing_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join(".hidden")).unwrap();
        assert!(!OutputVerifier::new(root.path()).run().is_success());
        assert!(!OutputVerifier::new(root.path().join("absent")).run().is_success());
    }

    #[test]
    fn test_custom_requirements() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("bill_html_only");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("first_page.html"), b"<p/>").unwrap();

        let report = OutputVerifier::new(root.path())
            .with_required(vec![DocumentType::FirstPage], vec![OutputFormat::Html])
            .run();
        assert!(report.is_success());
        assert_eq!(report.file_count, 1);
    }
}
