//! 账单处理流程 - 流程层
//!
//! 核心职责：定义"一张账单"的完整处理流程
//!
//! 流程顺序：
//! 1. 标记文档：每种文档类型一个 `spawn_blocking` 渲染任务
//! 2. 汇合：等待全部标记文档完成
//! 3. PDF 转换：从渲染器池借出句柄 → 转换 → 归还（与 DOCX 生成并行）
//! 4. 收集：生成产物列表和跳过列表

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{Config, GenerationOptions};
use crate::error::{AppError, RenderError};
use crate::infrastructure::{PdfConverter, RendererPool};
use crate::models::batch_result::{Artifact, SkippedArtifact};
use crate::models::bill::BillModel;
use crate::models::render_job::{DocumentType, OutputFormat, RenderJob, RenderStatus};
use crate::services::{DisplayOptions, DocxWriter, TemplateRenderer};
use crate::workflow::bill_ctx::BillCtx;

/// 单张账单的处理结果
#[derive(Debug, Clone, Default)]
pub struct BillOutcome {
    pub jobs: Vec<RenderJob>,
    pub artifacts: Vec<Artifact>,
    pub skipped: Vec<SkippedArtifact>,
}

/// 账单处理流程
///
/// - 编排单张账单的全部文档生成
/// - 共享只读的模板渲染器和渲染器池
/// - 单个文档失败只记录为跳过，不影响其他文档
pub struct BillFlow {
    renderer: Arc<TemplateRenderer>,
    pool: Option<RendererPool>,
    converter: PdfConverter,
    docx_writer: DocxWriter,
    generation: GenerationOptions,
    acquire_timeout: Duration,
    /// 需要 PDF 但渲染器不可用时的原因
    pdf_unavailable: Option<String>,
}

impl BillFlow {
    /// 创建新的账单处理流程
    ///
    /// `pool` 为 `None` 时不做 PDF 转换。
    pub fn new(renderer: Arc<TemplateRenderer>, pool: Option<RendererPool>, config: &Config) -> Self {
        Self {
            renderer,
            pool,
            converter: PdfConverter::new(config.conversion_timeout(), config.page_margin_mm),
            docx_writer: DocxWriter::new(),
            generation: config.generation.clone(),
            acquire_timeout: config.acquire_timeout(),
            pdf_unavailable: None,
        }
    }

    /// 渲染器不可用：PDF 全部记录为跳过
    pub fn with_pdf_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.pool = None;
        self.pdf_unavailable = Some(reason.into());
        self
    }

    fn pdf_requested(&self) -> bool {
        self.generation.pdf
    }

    pub async fn run(&self, model: Arc<BillModel>, ctx: &BillCtx) -> BillOutcome {
        let options = DisplayOptions::today(self.generation.reverse_font);
        let mut outcome = BillOutcome {
            jobs: DocumentType::ALL
                .into_iter()
                .map(|doc| RenderJob::new(ctx.bill_id.clone(), doc))
                .collect(),
            ..Default::default()
        };

        // ========== 阶段 1: 标记文档 ==========
        if self.generation.html || self.pdf_requested() {
            self.render_markup(&model, &options, ctx, &mut outcome.jobs).await;
        }

        // ========== 阶段 2/3: PDF 转换与 DOCX 并行 ==========
        let (pdf_results, docx_results) = tokio::join!(
            self.convert_all(&outcome.jobs, ctx),
            self.write_docx(&model, &options, ctx)
        );

        for (idx, result) in pdf_results {
            let job = &mut outcome.jobs[idx];
            match result {
                Ok(()) => {
                    job.mark_converted();
                }
                Err(e) => {
                    warn!("{} ⚠️ {} PDF 转换失败: {}", ctx, job.document_type, e);
                    job.mark_failed(&e);
                }
            }
        }

        // ========== 阶段 4: 收集产物 ==========
        self.collect(ctx, &mut outcome, docx_results);

        if !self.generation.html {
            self.remove_markup(&outcome.jobs, ctx).await;
        }

        info!(
            "{} ✓ 完成: 生成 {} 个文件, 跳过 {} 个",
            ctx,
            outcome.artifacts.len(),
            outcome.skipped.len()
        );
        outcome
    }

    /// 每种文档一个阻塞任务，全部完成后才返回
    async fn render_markup(
        &self,
        model: &Arc<BillModel>,
        options: &DisplayOptions,
        ctx: &BillCtx,
        jobs: &mut [RenderJob],
    ) {
        info!("{} 📝 生成标记文档...", ctx);

        let handles = jobs.iter().map(|job| {
            let renderer = self.renderer.clone();
            let model = model.clone();
            let options = options.clone();
            let dir = ctx.output_dir.clone();
            let doc = job.document_type;
            tokio::task::spawn_blocking(move || renderer.write_markup(&model, doc, &options, &dir))
        });
        let results = join_all(handles).await;

        for (job, result) in jobs.iter_mut().zip(results) {
            let result = result.unwrap_or_else(|e| Err(RenderError::Panicked(e.to_string())));
            match result {
                Ok(path) => {
                    debug!("{} 已写出 {}", ctx, path.display());
                    job.mark_rendered(path);
                }
                Err(e) => {
                    warn!("{} ⚠️ {} 渲染失败: {}", ctx, job.document_type, e);
                    job.mark_failed(&e);
                }
            }
        }
    }

    /// 转换所有已渲染的文档；并发度由渲染器池大小限制
    async fn convert_all(&self, jobs: &[RenderJob], ctx: &BillCtx) -> Vec<(usize, Result<(), AppError>)> {
        let Some(pool) = self.pool.as_ref().filter(|_| self.pdf_requested()) else {
            return Vec::new();
        };
        info!("{} 🖨️ 转换 PDF (渲染器池大小 {})...", ctx, pool.size());

        let conversions = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status == RenderStatus::Rendered)
            .filter_map(|(idx, job)| job.markup_path.clone().map(|markup| (idx, job.document_type, markup)))
            .map(|(idx, doc, markup)| async move {
                let output = ctx.output_dir.join(OutputFormat::Pdf.file_name(doc));
                let result = async {
                    let renderer = pool.acquire(self.acquire_timeout).await?;
                    self.converter.convert(&renderer, &markup, &output).await?;
                    pool.release(renderer);
                    Ok::<(), AppError>(())
                }
                .await;
                (idx, result)
            });

        join_all(conversions).await
    }

    /// 每种文档一个 DOCX
    async fn write_docx(
        &self,
        model: &Arc<BillModel>,
        options: &DisplayOptions,
        ctx: &BillCtx,
    ) -> Vec<Result<PathBuf, AppError>> {
        if !self.generation.docx {
            return Vec::new();
        }
        info!("{} 📄 生成 DOCX 文档...", ctx);

        let handles = DocumentType::ALL.into_iter().map(|doc| {
            let writer = self.docx_writer;
            let model = model.clone();
            let options = options.clone();
            let dir = ctx.output_dir.clone();
            tokio::task::spawn_blocking(move || writer.write(&model, doc, &options, &dir))
        });

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result.map_err(AppError::from),
                Err(e) => Err(AppError::other(format!("DOCX 任务异常退出: {}", e))),
            })
            .collect()
    }

    fn collect(
        &self,
        ctx: &BillCtx,
        outcome: &mut BillOutcome,
        docx_results: Vec<Result<PathBuf, AppError>>,
    ) {
        let mut docx_results = docx_results.into_iter();

        for job in &outcome.jobs {
            let doc = job.document_type;
            let markup_error = || {
                job.error
                    .clone()
                    .unwrap_or_else(|| "markup was not rendered".to_string())
            };

            if self.generation.html {
                match &job.markup_path {
                    Some(path) => outcome.artifacts.push(artifact(ctx, doc, OutputFormat::Html, path.clone())),
                    None => outcome.skipped.push(skipped(doc, OutputFormat::Html, markup_error())),
                }
            }

            if self.pdf_requested() {
                match job.status {
                    RenderStatus::Converted => outcome.artifacts.push(artifact(
                        ctx,
                        doc,
                        OutputFormat::Pdf,
                        ctx.output_dir.join(OutputFormat::Pdf.file_name(doc)),
                    )),
                    RenderStatus::Rendered => {
                        let reason = self
                            .pdf_unavailable
                            .clone()
                            .unwrap_or_else(|| "pdf conversion did not run".to_string());
                        outcome.skipped.push(skipped(doc, OutputFormat::Pdf, reason));
                    }
                    RenderStatus::Failed | RenderStatus::Pending => {
                        outcome.skipped.push(skipped(doc, OutputFormat::Pdf, markup_error()));
                    }
                }
            }

            if self.generation.docx {
                match docx_results.next() {
                    Some(Ok(path)) => outcome.artifacts.push(artifact(ctx, doc, OutputFormat::Docx, path)),
                    Some(Err(e)) => {
                        warn!("{} ⚠️ {} DOCX 生成失败: {}", ctx, doc, e);
                        outcome.skipped.push(skipped(doc, OutputFormat::Docx, e.to_string()));
                    }
                    None => outcome.skipped.push(skipped(doc, OutputFormat::Docx, "docx writer did not run".to_string())),
                }
            }
        }
    }

    /// 未请求 HTML 时删除中间标记文件
    async fn remove_markup(&self, jobs: &[RenderJob], ctx: &BillCtx) {
        for path in jobs.iter().filter_map(|job| job.markup_path.as_ref()) {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!("{} ⚠️ 无法删除中间文件 {}: {}", ctx, path.display(), e);
            }
        }
    }
}

fn artifact(ctx: &BillCtx, document_type: DocumentType, format: OutputFormat, path: PathBuf) -> Artifact {
    Artifact {
        document_type,
        format,
        path,
        archive_name: ctx.archive_name(&format.file_name(document_type)),
    }
}

fn skipped(document_type: DocumentType, format: OutputFormat, reason: String) -> SkippedArtifact {
    SkippedArtifact {
        document_type,
        format,
        reason,
    }
}
