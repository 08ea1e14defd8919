//! 集成测试共用的工作簿构造工具
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// 测试单元格
pub enum Cell {
    Text(&'static str),
    Number(f64),
}

pub use Cell::{Number as N, Text as T};

pub struct SheetSpec {
    pub name: &'static str,
    pub rows: Vec<Vec<Cell>>,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn column_name(mut index: usize) -> String {
    let mut name = String::new();
    loop {
        name.insert(0, (b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(c), r + 1);
            match cell {
                Cell::Text(text) => xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    reference,
                    escape(text)
                )),
                Cell::Number(value) => {
                    xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, value))
                }
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// 写一个最小的 xlsx 包
pub fn write_xlsx(path: &Path, sheets: &[SheetSpec]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            n
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(sheet.name),
            n,
            n
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            n, n
        ));
    }
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");

    let parts = [
        ("[Content_Types].xml", content_types),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                .to_string(),
        ),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", rels),
    ];
    for (name, body) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    for (i, sheet) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
            .unwrap();
        zip.write_all(sheet_xml(&sheet.rows).as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// 一份完整的账单工作簿：Title + Work Order + Bill Quantity
pub fn write_bill(dir: &Path, stem: &str, bill_number: &'static str) -> PathBuf {
    let path = dir.join(format!("{}.xlsx", stem));
    write_xlsx(
        &path,
        &[
            SheetSpec {
                name: "Title",
                rows: vec![
                    vec![T("Project Name"), T("Road Widening")],
                    vec![T("Contractor"), T("ACME Builders")],
                    vec![T("Bill No."), T(bill_number)],
                    vec![T("Premium"), N(5.0)],
                ],
            },
            SheetSpec {
                name: "Work Order",
                rows: vec![
                    vec![T("Description"), T("Quantity"), T("Rate"), T("Amount")],
                    vec![T("Excavation"), N(12.0), N(50.0), N(600.0)],
                ],
            },
            SheetSpec {
                name: "Bill Quantity",
                rows: vec![
                    vec![T("Description"), T("Quantity"), T("Rate"), T("Amount")],
                    vec![T("Excavation"), N(10.0), N(50.0), N(500.0)],
                    vec![T("Concrete"), N(5.0), N(1000.0), N(5000.0)],
                    vec![T("Steel"), N(2.0), N(2000.0), N(4000.0)],
                ],
            },
        ],
    );
    path
}

/// 扩展名正确但内容损坏的文件
pub fn write_corrupted(dir: &Path, stem: &str) -> PathBuf {
    let path = dir.join(format!("{}.xlsx", stem));
    std::fs::write(&path, b"this is not a spreadsheet").unwrap();
    path
}

pub fn templates_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates")
}
