//! 打包服务
//!
//! 把所有成功账单的产物写入一个 zip，条目名为 `<账单目录>/<带编号前缀的文件名>`。
//! 打包失败时删除不完整的压缩包，已生成的单个产物不受影响。

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackagingError;
use crate::models::batch_result::BatchResult;

/// 压缩包条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub source: PathBuf,
    pub name: String,
}

impl ArchiveEntry {
    /// 收集所有成功结果中的产物，保持输入顺序
    pub fn collect(results: &[BatchResult]) -> Vec<ArchiveEntry> {
        results
            .iter()
            .filter(|r| r.is_success())
            .flat_map(|r| {
                let bill_dir = r
                    .output_dir
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                r.generated_artifacts.iter().map(move |artifact| ArchiveEntry {
                    source: artifact.path.clone(),
                    name: if bill_dir.is_empty() {
                        artifact.archive_name.clone()
                    } else {
                        format!("{}/{}", bill_dir, artifact.archive_name)
                    },
                })
            })
            .collect()
    }
}

/// 写入压缩包，返回条目数量
pub fn package(archive_path: &Path, entries: &[ArchiveEntry]) -> Result<usize, PackagingError> {
    match write_archive(archive_path, entries) {
        Ok(count) => {
            info!("📦 压缩包已生成: {} ({} 个文件)", archive_path.display(), count);
            Ok(count)
        }
        Err(e) => {
            if archive_path.exists() {
                if let Err(remove_err) = std::fs::remove_file(archive_path) {
                    warn!("⚠️ 无法删除不完整的压缩包 {}: {}", archive_path.display(), remove_err);
                }
            }
            Err(e)
        }
    }
}

fn write_archive(archive_path: &Path, entries: &[ArchiveEntry]) -> Result<usize, PackagingError> {
    let file = File::create(archive_path).map_err(|source| PackagingError::Create {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        let write_err = |reason: String| PackagingError::Write {
            entry: entry.name.clone(),
            reason,
        };
        let mut source = File::open(&entry.source).map_err(|e| write_err(e.to_string()))?;
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| write_err(e.to_string()))?;
        std::io::copy(&mut source, &mut zip).map_err(|e| write_err(e.to_string()))?;
    }

    zip.finish().map_err(|e| PackagingError::Write {
        entry: "<central directory>".to_string(),
        reason: e.to_string(),
    })?;
    Ok(entries.len())
}
