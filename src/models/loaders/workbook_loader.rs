//! 工作簿加载器
//!
//! 通过 calamine 读取 xlsx / xlsm / xls / ods，转换为与格式无关的 `Workbook`。

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::models::workbook::{CellValue, Sheet, Workbook};

/// 加载工作簿
///
/// 单个工作表读取失败只记录警告；没有任何可读工作表时返回错误。
pub fn load_workbook(path: &Path) -> Result<Workbook, ExtractionError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ExtractionError::unreadable(path, e))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        match workbook.worksheet_range(&name) {
            Ok(range) => {
                // 按绝对坐标对齐，前导空行/空列保留为空单元格
                let (start_row, start_col) = range
                    .start()
                    .map(|(r, c)| (r as usize, c as usize))
                    .unwrap_or((0, 0));

                let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row];
                for row in range.rows() {
                    let mut cells = vec![CellValue::Empty; start_col];
                    cells.extend(row.iter().map(convert_cell));
                    rows.push(cells);
                }
                debug!("读取工作表 '{}': {} 行", name, rows.len());
                sheets.push(Sheet::new(name, rows));
            }
            Err(e) => {
                warn!("⚠️ 工作表 '{}' 读取失败，已跳过: {}", name, e);
            }
        }
    }

    if sheets.is_empty() {
        return Err(ExtractionError::NoSheets {
            path: path.to_path_buf(),
        });
    }

    Ok(Workbook::new(sheets))
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Error(format!("{e:?}")),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => CellValue::Date(value.format("%Y-%m-%d").to_string()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => CellValue::Date(s.chars().take(10).collect()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
