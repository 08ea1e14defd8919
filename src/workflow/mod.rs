//! 流程层（Workflow）
//!
//! 定义"一张账单"的完整处理流程：标记文档 → 汇合 → PDF 转换（与 DOCX 并行）→ 收集产物

pub mod bill_ctx;
pub mod bill_flow;

pub use bill_ctx::{sanitize_bill_id, BillCtx};
pub use bill_flow::{BillFlow, BillOutcome};
