//! 规范化账单模型
//!
//! 由提取器构建一次，之后以 `Arc<BillModel>` 只读共享给所有渲染任务。
//! 总金额不存储，每次按明细重新计算。

use std::sync::OnceLock;

use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;

/// 数值单元格：保留原始文本用于显示，解析值用于合计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NumericCell {
    pub raw: String,
    pub value: Option<f64>,
}

fn non_numeric() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\d.\-]").ok()).as_ref()
}

impl NumericCell {
    /// 去掉数字、`.`、`-` 以外的字符后解析；失败时 `value` 为 `None`
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let cleaned = match non_numeric() {
            Some(re) => re.replace_all(&raw, "").into_owned(),
            None => raw.clone(),
        };
        let value = cleaned.parse::<f64>().ok().filter(|v| v.is_finite());
        Self { raw, value }
    }

    /// 参与合计的值，无法解析时为 0
    pub fn as_f64(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

/// 明细行
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: NumericCell,
    pub unit: String,
    pub rate: NumericCell,
    pub amount: NumericCell,
}

impl LineItem {
    /// 非空字段数量
    pub fn filled_fields(&self) -> usize {
        [
            !self.description.trim().is_empty(),
            !self.quantity.is_blank(),
            !self.unit.trim().is_empty(),
            !self.rate.is_blank(),
            !self.amount.is_blank(),
        ]
        .iter()
        .filter(|filled| **filled)
        .count()
    }
}

/// 提取阶段的表头字段，未找到时为 `None`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderFields {
    pub project_name: Option<String>,
    pub contractor_name: Option<String>,
    pub bill_number: Option<String>,
    pub bill_date: Option<String>,
    pub premium_percentage: Option<f64>,
}

impl HeaderFields {
    /// 填充默认值，得到完整表头
    pub fn resolve(self, now: DateTime<Local>) -> BillHeader {
        BillHeader {
            project_name: self
                .project_name
                .unwrap_or_else(|| "Project Name Not Available".to_string()),
            contractor_name: self
                .contractor_name
                .unwrap_or_else(|| "Contractor Name Not Available".to_string()),
            bill_number: self
                .bill_number
                .unwrap_or_else(|| format!("BILL-{}", now.format("%Y%m%d"))),
            bill_date: self
                .bill_date
                .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
            premium_percentage: self
                .premium_percentage
                .filter(|p| p.is_finite() && *p >= 0.0)
                .unwrap_or(0.0),
        }
    }
}

/// 已解析的账单表头
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillHeader {
    pub project_name: String,
    pub contractor_name: String,
    pub bill_number: String,
    pub bill_date: String,
    pub premium_percentage: f64,
}

/// 提取得到的明细集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillLines {
    pub items: Vec<LineItem>,
    pub deviation_items: Vec<LineItem>,
    pub extra_items: Vec<LineItem>,
    /// 仅用于显示的工作令数量，不计入合计
    pub work_order_items: Vec<LineItem>,
    /// 汇总表中的非空行，仅用于显示
    pub summary_rows: Vec<Vec<String>>,
}

/// 规范化账单模型
#[derive(Debug, Clone, PartialEq)]
pub struct BillModel {
    header: BillHeader,
    lines: BillLines,
    source_filename: String,
    processing_timestamp: DateTime<Local>,
}

impl BillModel {
    pub fn new(
        header: BillHeader,
        lines: BillLines,
        source_filename: impl Into<String>,
        processing_timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            header,
            lines,
            source_filename: source_filename.into(),
            processing_timestamp,
        }
    }

    pub fn header(&self) -> &BillHeader {
        &self.header
    }

    pub fn project_name(&self) -> &str {
        &self.header.project_name
    }

    pub fn contractor_name(&self) -> &str {
        &self.header.contractor_name
    }

    pub fn bill_number(&self) -> &str {
        &self.header.bill_number
    }

    pub fn bill_date(&self) -> &str {
        &self.header.bill_date
    }

    pub fn premium_percentage(&self) -> f64 {
        self.header.premium_percentage
    }

    pub fn items(&self) -> &[LineItem] {
        &self.lines.items
    }

    pub fn deviation_items(&self) -> &[LineItem] {
        &self.lines.deviation_items
    }

    pub fn extra_items(&self) -> &[LineItem] {
        &self.lines.extra_items
    }

    pub fn work_order_items(&self) -> &[LineItem] {
        &self.lines.work_order_items
    }

    pub fn summary_rows(&self) -> &[Vec<String>] {
        &self.lines.summary_rows
    }

    pub fn lines(&self) -> &BillLines {
        &self.lines
    }

    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    pub fn processing_timestamp(&self) -> DateTime<Local> {
        self.processing_timestamp
    }

    /// 三类明细金额之和（不含 premium）
    pub fn subtotal(&self) -> f64 {
        self.lines
            .items
            .iter()
            .chain(&self.lines.deviation_items)
            .chain(&self.lines.extra_items)
            .map(|item| item.amount.as_f64())
            .sum()
    }

    pub fn premium_amount(&self) -> f64 {
        self.subtotal() * self.header.premium_percentage / 100.0
    }

    /// 应付总额 = 明细合计 × (1 + premium/100)
    pub fn total_amount(&self) -> f64 {
        self.subtotal() * (1.0 + self.header.premium_percentage / 100.0)
    }
}
