//! 可编辑文档（DOCX）生成服务
//!
//! 直接由 `BillModel` 生成，与 HTML 模板无关。

use std::fs::File;
use std::path::{Path, PathBuf};

use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

use crate::error::DocxError;
use crate::models::bill::{BillModel, LineItem};
use crate::models::render_job::{DocumentType, OutputFormat};
use crate::services::template_renderer::DisplayOptions;
use crate::utils::format::format_currency;

fn heading(text: &str, size: usize) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).bold().size(size))
}

fn text(content: impl AsRef<str>) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(content.as_ref()))
}

fn cell(content: &str) -> TableCell {
    TableCell::new().add_paragraph(text(content))
}

fn header_cell(content: &str) -> TableCell {
    TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(content).bold()))
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut table_rows = vec![TableRow::new(headers.iter().map(|h| header_cell(h)).collect())];
    table_rows.extend(
        rows.iter()
            .map(|row| TableRow::new(row.iter().map(|c| cell(c)).collect())),
    );
    Table::new(table_rows)
}

fn project_info(docx: Docx, model: &BillModel) -> Docx {
    docx.add_paragraph(heading("Project Information", 28)).add_table(table(
        &["Field", "Value"],
        vec![
            vec!["Project Name".into(), model.project_name().into()],
            vec!["Contractor".into(), model.contractor_name().into()],
            vec!["Bill Number".into(), model.bill_number().into()],
            vec!["Bill Date".into(), model.bill_date().into()],
        ],
    ))
}

fn item_rows(items: &[LineItem]) -> Vec<Vec<String>> {
    items
        .iter()
        .map(|item| {
            vec![
                item.description.clone(),
                item.quantity.raw.clone(),
                item.unit.clone(),
                item.rate.raw.clone(),
                item.amount.raw.clone(),
            ]
        })
        .collect()
}

const ITEM_HEADERS: &[&str] = &["Description", "Quantity", "Unit", "Rate", "Amount"];

fn items_section(docx: Docx, title: &str, items: &[LineItem], empty_text: &str) -> Docx {
    let docx = docx.add_paragraph(heading(title, 28));
    if items.is_empty() {
        docx.add_paragraph(text(empty_text))
    } else {
        docx.add_table(table(ITEM_HEADERS, item_rows(items)))
    }
}

fn signature(docx: Docx, role: &str) -> Docx {
    docx.add_paragraph(text(""))
        .add_paragraph(text("Authorized Signature: ____________________"))
        .add_paragraph(text(role))
}

fn build(model: &BillModel, document_type: DocumentType, options: &DisplayOptions) -> Docx {
    let docx = Docx::new().add_paragraph(heading(document_type.title(), 36));
    let total = format!("Total Amount: {}", format_currency(model.total_amount()));
    let premium = format!("Premium Percentage: {}%", model.premium_percentage());

    match document_type {
        DocumentType::FirstPage => project_info(docx, model)
            .add_paragraph(heading("Bill Summary", 24))
            .add_paragraph(text(total))
            .add_paragraph(text(premium))
            .add_paragraph(text(format!("Generated: {}", options.generation_date))),
        DocumentType::DeviationStatement => {
            let (source, fallback) = if model.deviation_items().is_empty() {
                (model.items(), true)
            } else {
                (model.deviation_items(), false)
            };
            let docx = if fallback {
                docx.add_paragraph(text("No deviation sheet; quantities taken from the bill items."))
            } else {
                docx
            };
            if source.is_empty() {
                return docx.add_paragraph(text("No deviation items found."));
            }
            let rows = source
                .iter()
                .map(|item| {
                    vec![
                        item.description.clone(),
                        item.quantity.raw.clone(),
                        item.quantity.raw.clone(),
                        "0".to_string(),
                        item.rate.raw.clone(),
                        item.amount.raw.clone(),
                    ]
                })
                .collect();
            docx.add_table(table(
                &["Description", "Original Qty", "Revised Qty", "Difference", "Rate", "Amount"],
                rows,
            ))
        }
        DocumentType::ExtraItems => {
            items_section(docx, "Extra Items", model.extra_items(), "No extra items found.")
        }
        DocumentType::CertificateIi => {
            let docx = docx
                .add_paragraph(text("This certifies that:"))
                .add_paragraph(text(
                    "• Work has been executed in accordance with approved drawings and specifications",
                ))
                .add_paragraph(text("• Work has been inspected and found to meet quality standards"))
                .add_paragraph(text("• Work is completed as per contract requirements"))
                .add_paragraph(text(format!("Project: {}", model.project_name())))
                .add_paragraph(text(format!("Contractor: {}", model.contractor_name())))
                .add_paragraph(text(format!("Inspection Date: {}", options.generation_date)));
            signature(docx, "Quality Inspector")
        }
        DocumentType::CertificateIii => {
            let docx = docx
                .add_paragraph(text("This certifies that:"))
                .add_paragraph(text("• All work has been completed satisfactorily"))
                .add_paragraph(text(
                    "• Quality compliance certificate (Certificate II) has been verified",
                ))
                .add_paragraph(text("• Payment authorization is hereby granted"))
                .add_paragraph(text(format!("Project: {}", model.project_name())))
                .add_paragraph(text(format!("Contractor: {}", model.contractor_name())))
                .add_paragraph(text(total))
                .add_paragraph(text(format!("Authorization Date: {}", options.generation_date)));
            signature(docx, "Project Manager")
        }
        DocumentType::NoteSheet => docx
            .add_paragraph(text("Important Notes:"))
            .add_paragraph(text("• All quantities and rates have been verified"))
            .add_paragraph(text("• Work completed as per specifications"))
            .add_paragraph(text("• Quality standards maintained throughout"))
            .add_paragraph(text(format!("Bill prepared on: {}", options.generation_date)))
            .add_paragraph(text(format!("Project: {}", model.project_name())))
            .add_paragraph(text(format!("Bill Number: {}", model.bill_number()))),
        DocumentType::BillTemplate => {
            let docx = project_info(docx, model);
            let docx = if model.work_order_items().is_empty() {
                docx
            } else {
                items_section(docx, "Work Order", model.work_order_items(), "")
            };
            items_section(docx, "Bill Items", model.items(), "No items found in the bill.")
                .add_paragraph(text(total))
        }
        DocumentType::LastPage => {
            let mut docx = docx
                .add_paragraph(heading("FINAL SUMMARY", 24))
                .add_paragraph(text(format!("Bill Number: {}", model.bill_number())))
                .add_paragraph(text(total))
                .add_paragraph(text(format!("Premium Applied: {}%", model.premium_percentage())));
            for row in model.summary_rows() {
                docx = docx.add_paragraph(text(row.join("  ")));
            }
            docx.add_paragraph(text("Contractor Signature: ____________________"))
                .add_paragraph(text("Date: ____________________"))
                .add_paragraph(text("Authorizing Officer: ____________________"))
                .add_paragraph(text("Date: ____________________"))
        }
    }
}

/// DOCX 生成器
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxWriter;

impl DocxWriter {
    pub fn new() -> Self {
        Self
    }

    /// 写入 `<dir>/<document_type>.docx`
    pub fn write(
        &self,
        model: &BillModel,
        document_type: DocumentType,
        options: &DisplayOptions,
        dir: &Path,
    ) -> Result<PathBuf, DocxError> {
        let path = dir.join(OutputFormat::Docx.file_name(document_type));
        let write_err = |reason: String| DocxError::Write {
            path: path.clone(),
            reason,
        };

        let file = File::create(&path).map_err(|e| write_err(e.to_string()))?;
        build(model, document_type, options)
            .build()
            .pack(file)
            .map_err(|e| write_err(e.to_string()))?;
        Ok(path)
    }
}
