//! 单个账单处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理单个输入文件，是文件级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **提取**：在阻塞线程中加载工作簿并生成 `BillModel`
//! 2. **目录**：提取成功后才创建账单输出目录
//! 3. **流程调度**：委托 `BillFlow` 生成全部文档
//! 4. **结果记录**：任何失败都转换为 `BatchResult`，不向上抛出

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::models::batch_result::{BatchResult, FileStatus};
use crate::models::bill::BillModel;
use crate::services::BillExtractor;
use crate::workflow::{sanitize_bill_id, BillCtx, BillFlow};

/// 同一秒内同名文件最多尝试的后缀数量
const MAX_DIR_SUFFIX: usize = 1000;

/// 处理单个输入文件
///
/// # 参数
/// - `flow`: 共享的账单处理流程
/// - `extractor`: 字段提取器（启发式或严格模式）
/// - `input`: 输入工作簿
/// - `bill_index`: 文件序号（用于日志）
/// - `output_root`: 输出根目录
///
/// # 返回
/// 总是返回一条处理记录
pub async fn process_bill(
    flow: &BillFlow,
    extractor: Arc<dyn BillExtractor>,
    input: PathBuf,
    bill_index: usize,
    output_root: &Path,
) -> BatchResult {
    let started = Instant::now();
    info!("[账单 {}] 开始处理: {}", bill_index, input.display());

    // ========== 提取 ==========
    let model = match extract(extractor, input.clone()).await {
        Ok(model) => Arc::new(model),
        Err(e) => {
            error!("[账单 {}] ❌ 提取失败: {}", bill_index, e);
            return BatchResult::failed(input, e, elapsed_ms(started));
        }
    };

    // ========== 输出目录 ==========
    let bill_dir = match create_bill_dir(output_root, &input) {
        Ok(dir) => dir,
        Err(e) => {
            error!("[账单 {}] ❌ 无法创建输出目录: {}", bill_index, e);
            return BatchResult::failed(input, e, elapsed_ms(started));
        }
    };

    let ctx = BillCtx::new(
        bill_index,
        sanitize_bill_id(model.bill_number()),
        input.clone(),
        bill_dir.clone(),
    );
    log_bill_model(&ctx, &model);

    // ========== 文档生成 ==========
    let outcome = flow.run(model, &ctx).await;

    let duration_ms = elapsed_ms(started);
    info!("{} ✅ 处理完成 ({} ms)", ctx, duration_ms);

    BatchResult {
        input_file: input,
        status: FileStatus::Success,
        bill_id: Some(ctx.bill_id),
        output_dir: Some(bill_dir),
        generated_artifacts: outcome.artifacts,
        skipped: outcome.skipped,
        error: None,
        duration_ms,
    }
}

async fn extract(extractor: Arc<dyn BillExtractor>, input: PathBuf) -> AppResult<BillModel> {
    tokio::task::spawn_blocking(move || extractor.extract(&input))
        .await
        .map_err(|e| AppError::other(format!("提取任务异常退出: {}", e)))?
        .map_err(AppError::from)
}

/// 创建 `bill_<文件名>_<时间戳>` 目录；重名时追加序号
fn create_bill_dir(output_root: &Path, input: &Path) -> AppResult<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| sanitize_bill_id(&s.to_string_lossy()))
        .unwrap_or_else(|| "unknown".to_string());
    let base = format!("bill_{}_{}", stem, chrono::Local::now().format("%Y%m%d_%H%M%S"));

    for attempt in 0..MAX_DIR_SUFFIX {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{}_{}", base, attempt + 1)
        };
        let dir = output_root.join(name);
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::other(format!("无法为 {} 分配输出目录", input.display())))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

// ========== 日志辅助函数 ==========

fn log_bill_model(ctx: &BillCtx, model: &BillModel) {
    info!("{} 项目: {}", ctx, model.project_name());
    info!("{} 承包商: {}", ctx, model.contractor_name());
    info!(
        "{} 明细 {} 项 / 偏差 {} 项 / 额外 {} 项, 总金额 {:.2}",
        ctx,
        model.items().len(),
        model.deviation_items().len(),
        model.extra_items().len(),
        model.total_amount()
    );
    info!("{} 输出目录: {}", ctx, ctx.output_dir.display());
}
