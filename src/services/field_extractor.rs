//! 字段提取服务 - 业务能力层
//!
//! 对任意命名的工作表做关键字启发式扫描，生成 `BillModel`。
//!
//! 扫描规则：
//! 1. 工作表分类：按表名（不区分大小写）的子串判断，一个表可以同时属于多类
//! 2. 表头字段：逐行逐列扫描所有单元格，命中关键字后取右侧相邻单元格，先到先得
//! 3. 明细列：只看前 5 行，记录每个逻辑字段第一次命中的列
//! 4. 明细行：表头行之后、至少两个已识别字段非空的行

use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::bill::{BillLines, BillModel, HeaderFields, LineItem, NumericCell};
use crate::models::loaders::load_workbook;
use crate::models::workbook::{CellValue, Sheet, Workbook};

/// 明细列识别只检查前几行
const HEADER_SCAN_ROWS: usize = 5;

/// 提取选项
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// 覆盖工作簿中的 premium 百分比
    pub premium_override: Option<f64>,
}

/// 从工作簿构建账单模型的能力
pub trait BillExtractor: Send + Sync {
    /// 从已加载的工作簿提取
    fn extract_workbook(
        &self,
        workbook: &Workbook,
        source_filename: &str,
        now: DateTime<Local>,
    ) -> Result<BillModel, ExtractionError>;

    /// 加载文件并提取
    fn extract(&self, path: &Path) -> Result<BillModel, ExtractionError> {
        let workbook = load_workbook(path)?;
        let source_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.extract_workbook(&workbook, &source_filename, Local::now())
    }
}

// ========== 规则表 ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderField {
    ProjectName,
    ContractorName,
    BillNumber,
    BillDate,
    PremiumPercentage,
}

/// 表头规则：任一关键字组的全部子串都出现即命中
struct HeaderRule {
    field: HeaderField,
    groups: &'static [&'static [&'static str]],
}

const HEADER_RULES: &[HeaderRule] = &[
    HeaderRule {
        field: HeaderField::ProjectName,
        groups: &[&["project"]],
    },
    HeaderRule {
        field: HeaderField::ContractorName,
        groups: &[&["contractor"]],
    },
    HeaderRule {
        field: HeaderField::BillNumber,
        groups: &[&["bill", "no"]],
    },
    HeaderRule {
        field: HeaderField::BillDate,
        groups: &[&["date"]],
    },
    HeaderRule {
        field: HeaderField::PremiumPercentage,
        groups: &[&["premium"]],
    },
];

impl HeaderRule {
    fn matches(&self, lowered: &str) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|kw| lowered.contains(kw)))
    }
}

/// 工作表角色
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheetRoles {
    pub items: bool,
    pub deviation: bool,
    pub extra: bool,
    pub summary: bool,
}

impl SheetRoles {
    pub fn classify(sheet_name: &str) -> Self {
        let name = sheet_name.to_lowercase();
        Self {
            items: name.contains("bill") || name.contains("item"),
            deviation: name.contains("deviation"),
            extra: name.contains("extra"),
            summary: name.contains("summary"),
        }
    }
}

/// 识别出的明细列
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemColumns {
    pub description: Option<usize>,
    pub quantity: Option<usize>,
    pub unit: Option<usize>,
    pub rate: Option<usize>,
    pub amount: Option<usize>,
    /// 表头所在行
    pub header_row: Option<usize>,
}

impl ItemColumns {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.quantity.is_none()
            && self.unit.is_none()
            && self.rate.is_none()
            && self.amount.is_none()
    }

    fn field_count(&self) -> usize {
        [
            self.description,
            self.quantity,
            self.unit,
            self.rate,
            self.amount,
        ]
        .iter()
        .filter(|c| c.is_some())
        .count()
    }

    /// 单行作为表头时识别出的列；同一字段取第一次命中
    fn from_row(row: &[CellValue], row_idx: usize) -> Self {
        let mut cols = ItemColumns {
            header_row: Some(row_idx),
            ..Default::default()
        };
        for (col_idx, cell) in row.iter().enumerate() {
            let text = cell.as_text().to_lowercase();
            if text.is_empty() {
                continue;
            }

            let slot = if text.contains("description") || text.contains("item") {
                &mut cols.description
            } else if text.contains("quantity") || text.contains("qty") {
                &mut cols.quantity
            } else if text.contains("rate") {
                &mut cols.rate
            } else if text.contains("amount") {
                &mut cols.amount
            } else if text.contains("unit") {
                &mut cols.unit
            } else {
                continue;
            };
            slot.get_or_insert(col_idx);
        }
        cols
    }

    /// 在前 5 行内选出命中字段最多的一行作为表头（并列取靠前的行）
    ///
    /// 只有表头行参与列识别，数据行中恰好含关键字的单元格不会改变列或起始行。
    pub fn identify(sheet: &Sheet) -> Self {
        let mut best = ItemColumns::default();
        for (row_idx, row) in sheet.rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
            let candidate = Self::from_row(row, row_idx);
            if candidate.field_count() > best.field_count() {
                best = candidate;
            }
        }
        best
    }

    fn read(&self, sheet: &Sheet, row: usize) -> LineItem {
        let text = |col: Option<usize>| {
            col.and_then(|c| sheet.cell(row, c))
                .map(|cell| cell.as_text())
                .unwrap_or_default()
        };
        LineItem {
            description: text(self.description),
            quantity: NumericCell::parse(text(self.quantity)),
            unit: text(self.unit),
            rate: NumericCell::parse(text(self.rate)),
            amount: NumericCell::parse(text(self.amount)),
        }
    }
}

/// 提取一个工作表中的明细行
pub fn extract_line_items(sheet: &Sheet) -> Vec<LineItem> {
    let cols = ItemColumns::identify(sheet);
    if cols.is_empty() {
        debug!("工作表 '{}' 未识别到明细列", sheet.name);
        return Vec::new();
    }

    let first_data_row = cols.header_row.map(|r| r + 1).unwrap_or(0);
    (first_data_row..sheet.rows.len())
        .map(|row| cols.read(sheet, row))
        .filter(|item| item.filled_fields() > 1)
        .collect()
}

/// 扫描所有单元格填充表头字段
fn scan_header(sheet: &Sheet, header: &mut HeaderFields) {
    for row in &sheet.rows {
        for (col_idx, cell) in row.iter().enumerate() {
            let lowered = cell.as_text().to_lowercase();
            if lowered.is_empty() {
                continue;
            }

            for rule in HEADER_RULES {
                if field_is_set(header, rule.field) || !rule.matches(&lowered) {
                    continue;
                }
                let value = row
                    .get(col_idx + 1)
                    .map(|next| next.as_text())
                    .unwrap_or_default();
                if value.is_empty() {
                    continue;
                }
                set_field(header, rule.field, value);
            }
        }
    }
}

fn field_is_set(header: &HeaderFields, field: HeaderField) -> bool {
    match field {
        HeaderField::ProjectName => header.project_name.is_some(),
        HeaderField::ContractorName => header.contractor_name.is_some(),
        HeaderField::BillNumber => header.bill_number.is_some(),
        HeaderField::BillDate => header.bill_date.is_some(),
        HeaderField::PremiumPercentage => header.premium_percentage.is_some(),
    }
}

fn set_field(header: &mut HeaderFields, field: HeaderField, value: String) {
    match field {
        HeaderField::ProjectName => header.project_name = Some(value),
        HeaderField::ContractorName => header.contractor_name = Some(value),
        HeaderField::BillNumber => header.bill_number = Some(value),
        HeaderField::BillDate => header.bill_date = Some(value),
        // 无法解析的 premium 不占位，后续单元格仍可命中
        HeaderField::PremiumPercentage => header.premium_percentage = NumericCell::parse(value).value,
    }
}

/// 按关键字映射单个键值对（严格模式 Title 表复用）
pub(crate) fn apply_key_value(header: &mut HeaderFields, key: &str, value: &str) {
    let lowered = key.to_lowercase();
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    for rule in HEADER_RULES {
        if !field_is_set(header, rule.field) && rule.matches(&lowered) {
            set_field(header, rule.field, value.to_string());
        }
    }
}

/// 非空行，仅用于显示
pub(crate) fn non_blank_rows(sheet: &Sheet) -> Vec<Vec<String>> {
    sheet
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_text())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

/// 启发式字段提取器
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    options: ExtractOptions,
}

impl FieldExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }
}

impl BillExtractor for FieldExtractor {
    fn extract_workbook(
        &self,
        workbook: &Workbook,
        source_filename: &str,
        now: DateTime<Local>,
    ) -> Result<BillModel, ExtractionError> {
        let mut header = HeaderFields::default();
        let mut lines = BillLines::default();

        for sheet in &workbook.sheets {
            scan_header(sheet, &mut header);

            let roles = SheetRoles::classify(&sheet.name);
            if roles.items {
                lines.items.extend(extract_line_items(sheet));
            }
            if roles.deviation {
                lines.deviation_items.extend(extract_line_items(sheet));
            }
            if roles.extra {
                lines.extra_items.extend(extract_line_items(sheet));
            }
            if roles.summary {
                lines.summary_rows.extend(non_blank_rows(sheet));
            }
        }

        if let Some(premium) = self.options.premium_override {
            header.premium_percentage = Some(premium);
        }

        let model = BillModel::new(header.resolve(now), lines, source_filename, now);
        info!(
            "✓ 提取完成 '{}': 明细 {} 项, 偏差 {} 项, 额外 {} 项",
            source_filename,
            model.items().len(),
            model.deviation_items().len(),
            model.extra_items().len()
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workbook::CellValue;

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from(*c)).collect()
    }

    fn extract(workbook: &Workbook) -> BillModel {
        FieldExtractor::default()
            .extract_workbook(workbook, "bill.xlsx", Local::now())
            .unwrap()
    }

    fn bill_quantity_sheet() -> Sheet {
        Sheet::new(
            "Bill Quantity",
            vec![
                row(&["Description", "Quantity", "Rate", "Amount"]),
                vec!["Excavation".into(), 10.0.into(), 50.0.into(), 500.0.into()],
                vec!["Concrete".into(), 5.0.into(), 1000.0.into(), 5000.0.into()],
                vec!["Steel".into(), 2.0.into(), 2000.0.into(), 4000.0.into()],
            ],
        )
    }

    #[test]
    fn test_bill_quantity_sheet_yields_three_items() {
        let title = Sheet::new(
            "Title",
            vec![
                row(&["Project Name", "Road Widening"]),
                row(&["Contractor", "ACME Builders"]),
                row(&["Bill No.", "RA-07"]),
                row(&["Premium", "5"]),
            ],
        );
        let model = extract(&Workbook::new(vec![title, bill_quantity_sheet()]));

        assert_eq!(model.items().len(), 3);
        assert_eq!(model.items()[0].description, "Excavation");
        assert_eq!(model.items()[2].amount.value, Some(4000.0));
        assert_eq!(model.project_name(), "Road Widening");
        assert_eq!(model.contractor_name(), "ACME Builders");
        assert_eq!(model.bill_number(), "RA-07");
        assert!((model.total_amount() - 9500.0 * 1.05).abs() < 1e-6);
    }

    #[test]
    fn test_first_header_match_wins() {
        let sheet = Sheet::new(
            "Info",
            vec![
                row(&["Project", "First Project"]),
                row(&["Project", "Second Project"]),
            ],
        );
        let model = extract(&Workbook::new(vec![sheet]));
        assert_eq!(model.project_name(), "First Project");
    }

    #[test]
    fn test_blank_adjacent_cell_does_not_claim_field() {
        let sheet = Sheet::new(
            "Info",
            vec![row(&["Project", ""]), row(&["Project Title", "Canal Lining"])],
        );
        let model = extract(&Workbook::new(vec![sheet]));
        assert_eq!(model.project_name(), "Canal Lining");
    }

    #[test]
    fn test_bill_number_label_needs_no_substring() {
        // "Bill Number" 不包含 "no"，保持原规则
        let sheet = Sheet::new("Info", vec![row(&["Bill Number", "77"])]);
        let now = Local::now();
        let model = FieldExtractor::default()
            .extract_workbook(&Workbook::new(vec![sheet]), "b.xlsx", now)
            .unwrap();
        assert_eq!(model.bill_number(), format!("BILL-{}", now.format("%Y%m%d")));
    }

    #[test]
    fn test_sheet_without_item_columns_yields_nothing() {
        let sheet = Sheet::new(
            "Bill Notes",
            vec![row(&["Remarks", "Checked"]), row(&["Site visit", "Done"])],
        );
        let model = extract(&Workbook::new(vec![sheet]));
        assert!(model.items().is_empty());
    }

    #[test]
    fn test_keywords_inside_descriptions_do_not_move_the_header() {
        // "Community" 含 unit，"Separate" 含 rate
        let sheet = Sheet::new(
            "Bill Quantity",
            vec![
                row(&["Description", "Quantity", "Rate", "Amount"]),
                vec!["Excavation".into(), 10.0.into(), 50.0.into(), 500.0.into()],
                vec!["Community hall flooring".into(), 5.0.into(), 1000.0.into(), 5000.0.into()],
                vec!["Separate drain lining".into(), 1.0.into(), 700.0.into(), 700.0.into()],
                vec!["Steel".into(), 2.0.into(), 2000.0.into(), 4000.0.into()],
            ],
        );

        let cols = ItemColumns::identify(&sheet);
        assert_eq!(cols.header_row, Some(0));
        assert_eq!(cols.description, Some(0));
        assert_eq!(cols.unit, None);

        let model = extract(&Workbook::new(vec![sheet]));
        let descriptions: Vec<_> = model.items().iter().map(|i| i.description.as_str()).collect();
        assert_eq!(
            descriptions,
            ["Excavation", "Community hall flooring", "Separate drain lining", "Steel"]
        );
        assert!(model.items().iter().all(|i| i.unit.is_empty()));
        assert!((model.total_amount() - 10200.0).abs() < 1e-6);
    }

    #[test]
    fn test_header_below_title_rows() {
        let sheet = Sheet::new(
            "Bill Items",
            vec![
                row(&["Abstract of items"]),
                row(&["S.No.", "Item", "Unit", "Qty", "Rate", "Amount"]),
                row(&["1", "Plaster", "sqm", "20", "15", "300"]),
            ],
        );
        let cols = ItemColumns::identify(&sheet);
        assert_eq!(cols.header_row, Some(1));
        let items = extract_line_items(&sheet);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Plaster");
        assert_eq!(items[0].unit, "sqm");
    }

    #[test]
    fn test_single_field_rows_are_skipped() {
        let sheet = Sheet::new(
            "Items",
            vec![
                row(&["Item", "Qty", "Amount"]),
                row(&["Only description", "", ""]),
                row(&["Brick work", "3", "300"]),
            ],
        );
        let items = extract_line_items(&sheet);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Brick work");
    }

    #[test]
    fn test_sheet_classification_allows_multiple_roles() {
        let roles = SheetRoles::classify("Extra Items");
        assert!(roles.items && roles.extra);
        assert!(!roles.deviation && !roles.summary);

        let model = extract(&Workbook::new(vec![Sheet::new(
            "Extra Items",
            vec![row(&["Description", "Amount"]), row(&["Railing", "120"])],
        )]));
        assert_eq!(model.items().len(), 1);
        assert_eq!(model.extra_items().len(), 1);
    }

    #[test]
    fn test_summary_rows_are_kept() {
        let sheet = Sheet::new(
            "Summary",
            vec![row(&["Gross", "9500"]), row(&["", ""]), row(&["Net", "", "9000"])],
        );
        let model = extract(&Workbook::new(vec![sheet]));
        assert_eq!(
            model.summary_rows(),
            &[vec!["Gross".to_string(), "9500".to_string()], vec!["Net".to_string(), "9000".to_string()]]
        );
    }

    #[test]
    fn test_premium_override_replaces_extracted_value() {
        let workbook = Workbook::new(vec![
            Sheet::new("Title", vec![row(&["Premium %", "5"])]),
            bill_quantity_sheet(),
        ]);
        let model = FieldExtractor::new(ExtractOptions {
            premium_override: Some(10.0),
        })
        .extract_workbook(&workbook, "b.xlsx", Local::now())
        .unwrap();

        assert_eq!(model.premium_percentage(), 10.0);
        assert!((model.total_amount() - 9500.0 * 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let workbook = Workbook::new(vec![
            Sheet::new("Title", vec![row(&["Project", "Bridge"]), row(&["Bill No", "B-1"])]),
            bill_quantity_sheet(),
            Sheet::new(
                "Deviation",
                vec![row(&["Item", "Qty", "Amount"]), row(&["Extra fill", "2", "80"])],
            ),
        ]);
        let now = Local::now();
        let extractor = FieldExtractor::default();
        let first = extractor.extract_workbook(&workbook, "b.xlsx", now).unwrap();
        let second = extractor.extract_workbook(&workbook, "b.xlsx", now).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.deviation_items().len(), 1);
    }
}
