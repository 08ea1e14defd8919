//! 严格模式提取器
//!
//! 工作表名固定：`Title`、`Work Order`、`Bill Quantity`（必需）、`Extra Items`（可选）。
//! 每个明细表第一行为表头，列名允许同义词。

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::bill::{BillLines, BillModel, HeaderFields, LineItem, NumericCell};
use crate::models::workbook::{Sheet, Workbook};
use crate::services::field_extractor::{apply_key_value, BillExtractor, ExtractOptions};

pub const TITLE_SHEET: &str = "Title";
pub const WORK_ORDER_SHEET: &str = "Work Order";
pub const BILL_QUANTITY_SHEET: &str = "Bill Quantity";
pub const EXTRA_ITEMS_SHEET: &str = "Extra Items";

/// 同义词按优先级排列，靠前的优先
const DESCRIPTION_SYNONYMS: &[&str] = &["description", "particulars", "item"];
const QUANTITY_SYNONYMS: &[&str] = &["quantity", "qty"];

/// 严格模式提取器
#[derive(Debug, Clone, Default)]
pub struct StrictExtractor {
    options: ExtractOptions,
}

impl StrictExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }
}

fn required<'a>(workbook: &'a Workbook, name: &str) -> Result<&'a Sheet, ExtractionError> {
    workbook
        .sheet(name)
        .ok_or_else(|| ExtractionError::MissingSheet {
            sheet: name.to_string(),
        })
}

/// Title 表：A 列为键，B 列为值
fn read_title(sheet: &Sheet, header: &mut HeaderFields) {
    for row in &sheet.rows {
        let key = row.first().map(|c| c.as_text()).unwrap_or_default();
        let value = row.get(1).map(|c| c.as_text()).unwrap_or_default();
        if !key.is_empty() {
            apply_key_value(header, &key, &value);
        }
    }
}

/// 按同义词优先级查找列：先找完全相同的表头，再找包含关系
fn find_column(headers: &[String], synonyms: &[&str]) -> Option<usize> {
    synonyms
        .iter()
        .find_map(|s| headers.iter().position(|h| h.as_str() == *s))
        .or_else(|| {
            synonyms
                .iter()
                .find_map(|s| headers.iter().position(|h| h.contains(s)))
        })
}

/// 第一行为表头；数量为空或为 0 的行丢弃
fn read_table(sheet: &Sheet) -> Vec<LineItem> {
    let Some(header_row) = sheet.rows.first() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| c.as_text().trim().to_lowercase())
        .collect();

    let description = find_column(&headers, DESCRIPTION_SYNONYMS);
    let quantity = find_column(&headers, QUANTITY_SYNONYMS);
    let unit = find_column(&headers, &["unit"]);
    let rate = find_column(&headers, &["rate"]);
    let amount = find_column(&headers, &["amount"]);

    let text = |row: usize, col: Option<usize>| {
        col.and_then(|c| sheet.cell(row, c))
            .map(|cell| cell.as_text())
            .unwrap_or_default()
    };

    let mut items = Vec::new();
    for row in 1..sheet.rows.len() {
        let qty = NumericCell::parse(text(row, quantity));
        if quantity.is_some() && qty.value.map_or(true, |v| v == 0.0) {
            continue;
        }
        let item = LineItem {
            description: text(row, description),
            quantity: qty,
            unit: text(row, unit),
            rate: NumericCell::parse(text(row, rate)),
            amount: NumericCell::parse(text(row, amount)),
        };
        if item.filled_fields() > 0 {
            items.push(item);
        }
    }
    debug!("工作表 '{}': {} 行有效明细", sheet.name, items.len());
    items
}

impl BillExtractor for StrictExtractor {
    fn extract_workbook(
        &self,
        workbook: &Workbook,
        source_filename: &str,
        now: DateTime<Local>,
    ) -> Result<BillModel, ExtractionError> {
        let work_order = required(workbook, WORK_ORDER_SHEET)?;
        let bill_quantity = required(workbook, BILL_QUANTITY_SHEET)?;

        let mut header = HeaderFields::default();
        if let Some(title) = workbook.sheet(TITLE_SHEET) {
            read_title(title, &mut header);
        }
        if let Some(premium) = self.options.premium_override {
            header.premium_percentage = Some(premium);
        }

        let lines = BillLines {
            items: read_table(bill_quantity),
            work_order_items: read_table(work_order),
            extra_items: workbook
                .sheet(EXTRA_ITEMS_SHEET)
                .map(read_table)
                .unwrap_or_default(),
            ..Default::default()
        };

        let model = BillModel::new(header.resolve(now), lines, source_filename, now);
        info!(
            "✓ 严格模式提取完成 '{}': 工作令 {} 项, 明细 {} 项, 额外 {} 项",
            source_filename,
            model.work_order_items().len(),
            model.items().len(),
            model.extra_items().len()
        );
        Ok(model)
    }
}
