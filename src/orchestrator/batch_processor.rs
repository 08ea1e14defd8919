//! 批量账单处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量账单的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载模板、探测外部渲染器、创建渲染器池
//! 2. **并发控制**：使用 Semaphore 限制同时处理的账单文件数量
//! 3. **故障隔离**：单个文件失败（包括任务 panic）只记录为错误，后续文件照常处理
//! 4. **打包**：把所有成功账单的产物写入一个压缩包
//! 5. **全局统计**：写出 `batch_summary.txt` / `batch_summary.json`
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有渲染器池的模块
//! - **向下委托**：委托 bill_processor 处理单个文件

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::{Config, ExtractionMode};
use crate::infrastructure::{detect_renderer, RendererPool};
use crate::models::batch_result::{BatchResult, BatchSummary};
use crate::orchestrator::bill_processor;
use crate::services::{
    package, ArchiveEntry, BillExtractor, ExtractOptions, FieldExtractor, StrictExtractor,
    TemplateRenderer,
};
use crate::utils::logging::{log_files_loaded, log_startup, print_final_stats};
use crate::workflow::BillFlow;

/// 摘要文件名
pub const SUMMARY_TEXT_FILE: &str = "batch_summary.txt";
pub const SUMMARY_JSON_FILE: &str = "batch_summary.json";

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<BillFlow>,
    extractor: Arc<dyn BillExtractor>,
    pool: Option<RendererPool>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("无法创建输出目录 {}", config.output_dir.display())
        })?;

        let renderer = Arc::new(TemplateRenderer::from_dir(&config.templates_dir));

        let mut pool = None;
        let mut pdf_unavailable = None;
        if config.generation.pdf {
            match detect_renderer(&config.renderer_command).await {
                Some(version) => {
                    info!("✓ 外部渲染器可用: {} ({})", config.renderer_command, version);
                    pool = Some(RendererPool::new(
                        config.renderer_pool_size,
                        &config.renderer_command,
                    ));
                }
                None => {
                    let reason = format!("renderer '{}' not available", config.renderer_command);
                    warn!("⚠️ 未找到外部渲染器 {}，PDF 将全部跳过", config.renderer_command);
                    pdf_unavailable = Some(reason);
                }
            }
        }

        let mut flow = BillFlow::new(renderer, pool.clone(), &config);
        if let Some(reason) = pdf_unavailable {
            flow = flow.with_pdf_unavailable(reason);
        }

        let options = ExtractOptions {
            premium_override: config.premium_override,
        };
        let extractor: Arc<dyn BillExtractor> = match config.extraction_mode {
            ExtractionMode::Heuristic => Arc::new(FieldExtractor::new(options)),
            ExtractionMode::Strict => Arc::new(StrictExtractor::new(options)),
        };
        info!("🔎 提取模式: {:?}", config.extraction_mode);

        Ok(Self {
            config,
            flow: Arc::new(flow),
            extractor,
            pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 处理全部输入文件并打包
    pub async fn run(&self, inputs: Vec<PathBuf>) -> Result<BatchSummary> {
        let started_at = chrono::Local::now();
        let started = Instant::now();

        if inputs.is_empty() {
            warn!("⚠️ 没有待处理的账单文件");
        }
        log_files_loaded(inputs.len(), self.config.max_concurrent_bills);

        let results = self.process_all_bills(inputs).await?;

        let (archive_path, archive_error) = self.package_results(&results).await;

        let success_count = results.iter().filter(|r| r.is_success()).count();
        let summary = BatchSummary {
            total_files: results.len(),
            success_count,
            error_count: results.len() - success_count,
            results,
            archive_path,
            archive_error,
            started_at,
            finished_at: chrono::Local::now(),
            total_duration_ms: started.elapsed().as_millis() as u64,
        };

        self.write_summary(&summary)?;
        print_final_stats(&summary, &self.config, self.pool.as_ref().map(RendererPool::stats));

        Ok(summary)
    }

    /// 并发处理全部文件，结果按输入顺序返回
    async fn process_all_bills(&self, inputs: Vec<PathBuf>) -> Result<Vec<BatchResult>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_bills.max(1)));
        let mut handles = Vec::with_capacity(inputs.len());

        for (idx, input) in inputs.into_iter().enumerate() {
            let bill_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let flow = self.flow.clone();
            let extractor = self.extractor.clone();
            let output_root = self.config.output_dir.clone();
            let task_input = input.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                bill_processor::process_bill(&flow, extractor, task_input, bill_index, &output_root)
                    .await
            });
            handles.push((bill_index, input, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (bill_index, input, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("[账单 {}] 任务执行失败: {}", bill_index, e);
                    results.push(BatchResult::failed(input, format!("task failed: {}", e), 0));
                }
            }
        }
        Ok(results)
    }

    /// 打包所有成功账单的产物
    async fn package_results(&self, results: &[BatchResult]) -> (Option<PathBuf>, Option<String>) {
        let entries = ArchiveEntry::collect(results);
        if entries.is_empty() {
            warn!("⚠️ 没有可打包的产物，跳过压缩包");
            return (None, None);
        }

        let archive_path = self.config.output_dir.join(&self.config.archive_name);
        let target = archive_path.clone();
        let packaged = tokio::task::spawn_blocking(move || package(&target, &entries)).await;

        match packaged {
            Ok(Ok(_)) => (Some(archive_path), None),
            Ok(Err(e)) => {
                error!("❌ 打包失败: {}", e);
                (None, Some(e.to_string()))
            }
            Err(e) => {
                error!("❌ 打包任务异常退出: {}", e);
                (None, Some(format!("packaging task failed: {}", e)))
            }
        }
    }

    fn write_summary(&self, summary: &BatchSummary) -> Result<()> {
        write_summary_files(&self.config.output_dir, summary)
    }
}

/// 写出文本和 JSON 两份摘要
pub fn write_summary_files(output_dir: &Path, summary: &BatchSummary) -> Result<()> {
    let text_path = output_dir.join(SUMMARY_TEXT_FILE);
    std::fs::write(&text_path, summary.to_text())
        .with_context(|| format!("无法写入 {}", text_path.display()))?;

    let json_path = output_dir.join(SUMMARY_JSON_FILE);
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&json_path, json).with_context(|| format!("无法写入 {}", json_path.display()))?;

    info!("📝 摘要已写入: {}", text_path.display());
    Ok(())
}
