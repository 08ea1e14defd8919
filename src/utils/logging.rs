/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::PoolStats;
use crate::models::batch_result::BatchSummary;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let log_header = format!(
        "{}\n账单处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    let generation = &config.generation;
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量账单文档生成");
    info!("📊 最大并发账单数: {}", config.max_concurrent_bills);
    info!("🖨️ 渲染器池大小: {} ({})", config.renderer_pool_size, config.renderer_command);
    info!(
        "📄 输出格式: html={} pdf={} docx={}",
        generation.html, generation.pdf, generation.docx
    );
    info!("📁 输出目录: {}", config.output_dir.display());
    info!("{}", "=".repeat(60));
}

/// 记录输入文件信息
///
/// # 参数
/// - `total`: 文件总数
/// - `max_concurrent`: 最大并发数
pub fn log_files_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 共 {} 个待处理的账单文件", total);
    info!("📋 最多同时处理 {} 个\n", max_concurrent);
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &BatchSummary, config: &Config, pool: Option<PoolStats>) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!("完成时间: {}", summary.finished_at.format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.success_count, summary.total_files);
    info!("❌ 失败: {}", summary.error_count);
    for result in summary.results.iter().filter(|r| !r.is_success()) {
        warn!(
            "   {}: {}",
            result.input_file.display(),
            result.error.as_deref().unwrap_or("未知错误")
        );
    }
    match (&summary.archive_path, &summary.archive_error) {
        (Some(path), _) => info!("📦 压缩包: {}", path.display()),
        (None, Some(e)) => warn!("⚠️ 压缩包生成失败: {}", e),
        (None, None) => {}
    }
    if let Some(stats) = pool {
        info!(
            "🖨️ 渲染器: 借出 {} 次, 峰值 {}/{}, 峰值进程 {}, 等待超时 {}",
            stats.acquired_total,
            stats.peak_in_use,
            stats.size,
            stats.peak_active_processes,
            stats.acquire_timeouts
        );
    }
    info!("⏱️ 总耗时: {:.2} 秒", summary.total_duration_ms as f64 / 1000.0);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file.display());
}
