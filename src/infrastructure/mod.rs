//! 基础设施层（Infrastructure）
//!
//! 持有稀缺资源（外部渲染器进程），只暴露能力，不认识账单。

pub mod pdf_converter;
pub mod renderer_pool;

pub use pdf_converter::{detect_renderer, PdfConverter};
pub use renderer_pool::{PoolStats, PooledRenderer, RendererPool};
