//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量账单处理器
//! - 管理应用生命周期（初始化、运行）
//! - 控制并发数量（Semaphore）
//! - 持有渲染器池
//! - 打包并输出全局统计信息
//!
//! ### `bill_processor` - 单个账单处理器
//! - 提取账单模型
//! - 创建账单输出目录
//! - 调用 BillFlow 生成全部文档
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<PathBuf>)
//!     ↓
//! bill_processor (处理单个工作簿)
//!     ↓
//! workflow::BillFlow (处理单张账单的全部文档)
//!     ↓
//! services (能力层：extract / render / docx / package / verify)
//!     ↓
//! infrastructure (基础设施：RendererPool / PdfConverter)
//! ```

pub mod batch_processor;
pub mod bill_processor;

// 重新导出主要类型
pub use batch_processor::{write_summary_files, App, SUMMARY_JSON_FILE, SUMMARY_TEXT_FILE};
pub use bill_processor::process_bill;
