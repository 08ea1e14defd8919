//! # Bill Batch
//!
//! 一个把账单工作簿批量转换为打印文档的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（外部渲染器），只暴露能力
//! - `RendererPool` - 固定大小的渲染器句柄池，借出 / 归还
//! - `PdfConverter` - 带硬超时的外部转换进程
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单张账单
//! - `FieldExtractor` / `StrictExtractor` - 工作簿 → `BillModel`
//! - `TemplateRenderer` - handlebars 模板渲染
//! - `DocxWriter` - 可编辑文档
//! - `package` / `OutputVerifier` - 打包与输出校验
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一张账单"的完整处理流程
//! - `BillCtx` - 上下文封装（bill_index + bill_id + 输出目录）
//! - `BillFlow` - 流程编排（markup → 汇合 → pdf / docx → 收集）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，管理资源、并发和打包
//! - `orchestrator/bill_processor` - 单个文件处理器
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, ExtractionMode, GenerationOptions};
pub use error::{AppError, AppResult};
pub use infrastructure::{PdfConverter, RendererPool};
pub use models::{BatchResult, BatchSummary, BillModel, DocumentType, OutputFormat};
pub use orchestrator::{process_bill, App};
pub use services::{OutputVerifier, VerificationReport};
pub use workflow::{BillCtx, BillFlow};
