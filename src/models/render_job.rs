//! 文档类型与渲染任务状态

use std::fmt::Display;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

/// 每张账单生成的文档类型（顺序固定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    FirstPage,
    DeviationStatement,
    ExtraItems,
    CertificateIi,
    CertificateIii,
    NoteSheet,
    BillTemplate,
    LastPage,
}

impl DocumentType {
    pub const ALL: [DocumentType; 8] = [
        DocumentType::FirstPage,
        DocumentType::DeviationStatement,
        DocumentType::ExtraItems,
        DocumentType::CertificateIi,
        DocumentType::CertificateIii,
        DocumentType::NoteSheet,
        DocumentType::BillTemplate,
        DocumentType::LastPage,
    ];

    /// 文件名主干，同时也是模板名
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::FirstPage => "first_page",
            DocumentType::DeviationStatement => "deviation_statement",
            DocumentType::ExtraItems => "extra_items",
            DocumentType::CertificateIi => "certificate_ii",
            DocumentType::CertificateIii => "certificate_iii",
            DocumentType::NoteSheet => "note_sheet",
            DocumentType::BillTemplate => "bill_template",
            DocumentType::LastPage => "last_page",
        }
    }

    /// 文档标题
    pub fn title(self) -> &'static str {
        match self {
            DocumentType::FirstPage => "First Page - Bill Summary",
            DocumentType::DeviationStatement => "Deviation Statement",
            DocumentType::ExtraItems => "Extra Items",
            DocumentType::CertificateIi => "Certificate II - Quality Compliance",
            DocumentType::CertificateIii => "Certificate III - Final Approval & Payment Authorization",
            DocumentType::NoteSheet => "Note Sheet",
            DocumentType::BillTemplate => "Bill Template",
            DocumentType::LastPage => "Last Page - Final Summary",
        }
    }

    pub fn template_file(self) -> String {
        format!("{}.html", self.as_str())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|doc| doc.as_str() == name)
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 标记文档
    Html,
    /// 分页文档（外部渲染器生成）
    Pdf,
    /// 可编辑文档
    Docx,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Html, OutputFormat::Pdf, OutputFormat::Docx];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Docx => "docx",
        }
    }

    /// `<document_type>.<ext>`
    pub fn file_name(self, document_type: DocumentType) -> String {
        format!("{}.{}", document_type.as_str(), self.extension())
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// 渲染任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Pending,
    /// 标记文档已写出
    Rendered,
    /// 已转换为分页文档
    Converted,
    Failed,
}

impl RenderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderStatus::Converted | RenderStatus::Failed)
    }
}

/// 一个 (账单, 文档类型) 组合的处理记录
#[derive(Debug, Clone, Serialize)]
pub struct RenderJob {
    pub bill_id: String,
    pub document_type: DocumentType,
    pub markup_path: Option<PathBuf>,
    pub status: RenderStatus,
    pub error: Option<String>,
}

impl RenderJob {
    pub fn new(bill_id: impl Into<String>, document_type: DocumentType) -> Self {
        Self {
            bill_id: bill_id.into(),
            document_type,
            markup_path: None,
            status: RenderStatus::Pending,
            error: None,
        }
    }

    /// pending → rendered
    pub fn mark_rendered(&mut self, markup_path: PathBuf) -> bool {
        if !self.transition(RenderStatus::Rendered) {
            return false;
        }
        self.markup_path = Some(markup_path);
        true
    }

    /// rendered → converted
    pub fn mark_converted(&mut self) -> bool {
        self.transition(RenderStatus::Converted)
    }

    /// pending/rendered → failed
    pub fn mark_failed(&mut self, error: impl Display) -> bool {
        if !self.transition(RenderStatus::Failed) {
            return false;
        }
        self.error = Some(error.to_string());
        true
    }

    fn transition(&mut self, next: RenderStatus) -> bool {
        let allowed = matches!(
            (self.status, next),
            (RenderStatus::Pending, RenderStatus::Rendered)
                | (RenderStatus::Pending, RenderStatus::Failed)
                | (RenderStatus::Rendered, RenderStatus::Converted)
                | (RenderStatus::Rendered, RenderStatus::Failed)
        );
        if allowed {
            self.status = next;
        } else {
            warn!(
                "[{}] {} 状态不允许从 {:?} 变为 {:?}",
                self.bill_id, self.document_type, self.status, next
            );
        }
        allowed
    }
}
