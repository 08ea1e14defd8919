//! 业务能力层（Services）
//!
//! 每个服务只描述"我能做什么"，不关心并发和批量调度。

pub mod archive_packager;
pub mod docx_writer;
pub mod field_extractor;
pub mod output_verifier;
pub mod strict_extractor;
pub mod template_renderer;

pub use archive_packager::{package, ArchiveEntry};
pub use docx_writer::DocxWriter;
pub use field_extractor::{BillExtractor, ExtractOptions, FieldExtractor};
pub use output_verifier::{OutputVerifier, VerificationReport, REQUIRED_DOCUMENTS};
pub use strict_extractor::StrictExtractor;
pub use template_renderer::{DisplayOptions, TemplateRenderer};
