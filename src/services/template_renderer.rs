//! 模板渲染服务 - 业务能力层
//!
//! 每种文档类型对应 `templates_dir/<document_type>.html` 一个 handlebars 模板。
//! 渲染是纯函数 `(模型, 文档类型, 显示选项) → String`，只有 `write_markup` 写文件。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::RenderError;
use crate::models::bill::{BillModel, LineItem};
use crate::models::render_job::{DocumentType, OutputFormat};
use crate::utils::format::{format_currency, group_thousands};

/// 显示选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    pub reverse_font: bool,
    /// 文档上显示的生成日期
    pub generation_date: String,
}

impl DisplayOptions {
    pub fn today(reverse_font: bool) -> Self {
        Self {
            reverse_font,
            generation_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}

fn helper_number(h: &Helper) -> f64 {
    h.param(0)
        .and_then(|v| {
            let value = v.value();
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .unwrap_or(0.0)
}

fn format_currency_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&format_currency(helper_number(h)))?;
    Ok(())
}

fn format_number_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&group_thousands(helper_number(h), 2))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ItemView<'a> {
    index: usize,
    description: &'a str,
    quantity: &'a str,
    unit: &'a str,
    rate: &'a str,
    amount: &'a str,
    amount_value: f64,
}

impl<'a> ItemView<'a> {
    fn list(items: &'a [LineItem]) -> Vec<Self> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| ItemView {
                index: i + 1,
                description: &item.description,
                quantity: &item.quantity.raw,
                unit: &item.unit,
                rate: &item.rate.raw,
                amount: &item.amount.raw,
                amount_value: item.amount.as_f64(),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct DeviationView<'a> {
    index: usize,
    description: &'a str,
    unit: &'a str,
    original_qty: &'a str,
    revised_qty: &'a str,
    difference: f64,
    rate: &'a str,
    amount: &'a str,
    amount_value: f64,
}

#[derive(Debug, Serialize)]
struct TemplateContext<'a> {
    document_type: &'static str,
    document_title: &'static str,
    project_name: &'a str,
    contractor_name: &'a str,
    bill_number: &'a str,
    bill_date: &'a str,
    source_filename: &'a str,
    processing_timestamp: String,
    premium_percentage: f64,
    subtotal: f64,
    premium_amount: f64,
    total_amount: f64,
    items: Vec<ItemView<'a>>,
    has_items: bool,
    deviation_items: Vec<DeviationView<'a>>,
    deviation_fallback: bool,
    extra_items: Vec<ItemView<'a>>,
    has_extra_items: bool,
    work_order_items: Vec<ItemView<'a>>,
    summary_rows: &'a [Vec<String>],
    reverse_font: bool,
    generation_date: &'a str,
}

/// 偏差行：有偏差表时直接使用，否则由普通明细生成（差额为 0）
fn deviation_rows(model: &BillModel) -> (Vec<DeviationView<'_>>, bool) {
    let fallback = model.deviation_items().is_empty();
    let source = if fallback {
        model.items()
    } else {
        model.deviation_items()
    };

    let rows = source
        .iter()
        .enumerate()
        .map(|(i, item)| DeviationView {
            index: i + 1,
            description: &item.description,
            unit: &item.unit,
            original_qty: &item.quantity.raw,
            revised_qty: &item.quantity.raw,
            difference: 0.0,
            rate: &item.rate.raw,
            amount: &item.amount.raw,
            amount_value: item.amount.as_f64(),
        })
        .collect();
    (rows, fallback)
}

fn build_context<'a>(
    model: &'a BillModel,
    document_type: DocumentType,
    options: &'a DisplayOptions,
) -> TemplateContext<'a> {
    let (deviation_items, deviation_fallback) = deviation_rows(model);
    TemplateContext {
        document_type: document_type.as_str(),
        document_title: document_type.title(),
        project_name: model.project_name(),
        contractor_name: model.contractor_name(),
        bill_number: model.bill_number(),
        bill_date: model.bill_date(),
        source_filename: model.source_filename(),
        processing_timestamp: model
            .processing_timestamp()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        premium_percentage: model.premium_percentage(),
        subtotal: model.subtotal(),
        premium_amount: model.premium_amount(),
        total_amount: model.total_amount(),
        items: ItemView::list(model.items()),
        has_items: !model.items().is_empty(),
        deviation_items,
        deviation_fallback,
        extra_items: ItemView::list(model.extra_items()),
        has_extra_items: !model.extra_items().is_empty(),
        work_order_items: ItemView::list(model.work_order_items()),
        summary_rows: model.summary_rows(),
        reverse_font: options.reverse_font,
        generation_date: &options.generation_date,
    }
}

/// 模板渲染器
///
/// 构建后只读，多个渲染任务通过 `Arc<TemplateRenderer>` 共享。
pub struct TemplateRenderer {
    engine: Handlebars<'static>,
    /// 存在但无法解析的模板
    invalid: HashMap<DocumentType, String>,
}

impl TemplateRenderer {
    fn empty() -> Self {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(false);
        engine.register_helper("formatCurrency", Box::new(format_currency_helper));
        engine.register_helper("formatNumber", Box::new(format_number_helper));
        Self {
            engine,
            invalid: HashMap::new(),
        }
    }

    fn register(&mut self, document_type: DocumentType, source: &str) {
        if let Err(e) = self
            .engine
            .register_template_string(document_type.as_str(), source)
        {
            warn!("⚠️ 模板 {} 无法解析: {}", document_type.template_file(), e);
            self.invalid.insert(document_type, e.to_string());
        }
    }

    /// 从模板目录加载；缺失的模板只记录警告
    pub fn from_dir(templates_dir: &Path) -> Self {
        let mut renderer = Self::empty();
        for doc in DocumentType::ALL {
            let path = templates_dir.join(doc.template_file());
            match std::fs::read_to_string(&path) {
                Ok(source) => {
                    renderer.register(doc, &source);
                    debug!("已加载模板: {}", path.display());
                }
                Err(e) => warn!("⚠️ 模板缺失 {}: {}", path.display(), e),
            }
        }
        renderer
    }

    /// 从内存中的模板构建
    pub fn from_sources<'s>(sources: impl IntoIterator<Item = (DocumentType, &'s str)>) -> Self {
        let mut renderer = Self::empty();
        for (doc, source) in sources {
            renderer.register(doc, source);
        }
        renderer
    }

    pub fn has_template(&self, document_type: DocumentType) -> bool {
        self.engine.has_template(document_type.as_str())
    }

    /// 渲染为标记文本
    pub fn render(
        &self,
        model: &BillModel,
        document_type: DocumentType,
        options: &DisplayOptions,
    ) -> Result<String, RenderError> {
        let name = document_type.template_file();
        if let Some(reason) = self.invalid.get(&document_type) {
            return Err(RenderError::TemplateInvalid {
                template: name,
                reason: reason.clone(),
            });
        }
        if !self.has_template(document_type) {
            return Err(RenderError::TemplateMissing { template: name });
        }

        let context = build_context(model, document_type, options);
        self.engine
            .render(document_type.as_str(), &context)
            .map_err(|e| RenderError::render(name, e))
    }

    /// 渲染并写入 `<dir>/<document_type>.html`
    pub fn write_markup(
        &self,
        model: &BillModel,
        document_type: DocumentType,
        options: &DisplayOptions,
        dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let markup = self.render(model, document_type, options)?;
        let path = dir.join(OutputFormat::Html.file_name(document_type));
        std::fs::write(&path, markup).map_err(|source| RenderError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bill::{BillLines, HeaderFields, NumericCell};
    use chrono::Local;

    fn line(description: &str, qty: &str, amount: &str) -> LineItem {
        LineItem {
            description: description.into(),
            quantity: NumericCell::parse(qty),
            unit: "cum".into(),
            rate: NumericCell::parse("50"),
            amount: NumericCell::parse(amount),
        }
    }

    fn model(extra: Vec<LineItem>, deviation: Vec<LineItem>) -> BillModel {
        let header = HeaderFields {
            project_name: Some("Ring Road <Phase 1>".into()),
            bill_number: Some("RA-3".into()),
            premium_percentage: Some(5.0),
            ..Default::default()
        }
        .resolve(Local::now());
        BillModel::new(
            header,
            BillLines {
                items: vec![line("Excavation", "10", "500"), line("Concrete", "5", "5000")],
                deviation_items: deviation,
                extra_items: extra,
                ..Default::default()
            },
            "ring.xlsx",
            Local::now(),
        )
    }

    fn options() -> DisplayOptions {
        DisplayOptions {
            reverse_font: false,
            generation_date: "2024-01-31".into(),
        }
    }

    #[test]
    fn test_render_escapes_and_formats() {
        let renderer = TemplateRenderer::from_sources([(
            DocumentType::FirstPage,
            "<h1>{{project_name}}</h1>{{#each items}}<tr><td>{{index}}</td><td>{{description}}</td></tr>{{/each}}<p>{{formatCurrency total_amount}}</p><p>{{generation_date}}</p>",
        )]);
        let html = renderer
            .render(&model(vec![], vec![]), DocumentType::FirstPage, &options())
            .unwrap();

        assert!(html.contains("Ring Road &lt;Phase 1&gt;"));
        assert!(html.contains("<td>1</td><td>Excavation</td>"));
        assert!(html.contains("<td>2</td><td>Concrete</td>"));
        assert!(html.contains("₹ 5,775.00"));
        assert!(html.contains("2024-01-31"));
    }

    #[test]
    fn test_deviation_falls_back_to_items() {
        let renderer = TemplateRenderer::from_sources([(
            DocumentType::DeviationStatement,
            "{{#if deviation_fallback}}FALLBACK{{/if}}{{#each deviation_items}}[{{description}}:{{original_qty}}/{{revised_qty}}/{{difference}}]{{/each}}",
        )]);

        let html = renderer
            .render(&model(vec![], vec![]), DocumentType::DeviationStatement, &options())
            .unwrap();
        assert!(html.starts_with("FALLBACK"));
        assert!(html.contains("[Excavation:10/10/0"));

        let html = renderer
            .render(
                &model(vec![], vec![line("Rock cutting", "4", "400")]),
                DocumentType::DeviationStatement,
                &options(),
            )
            .unwrap();
        assert!(!html.contains("FALLBACK"));
        assert!(html.contains("Rock cutting"));
        assert!(!html.contains("Excavation"));
    }

    #[test]
    fn test_empty_extra_items_state() {
        let renderer = TemplateRenderer::from_sources([(
            DocumentType::ExtraItems,
            "{{#if has_extra_items}}{{#each extra_items}}{{description}}{{/each}}{{else}}No extra items{{/if}}",
        )]);
        let html = renderer
            .render(&model(vec![], vec![]), DocumentType::ExtraItems, &options())
            .unwrap();
        assert_eq!(html, "No extra items");

        let html = renderer
            .render(
                &model(vec![line("Handrail", "1", "900")], vec![]),
                DocumentType::ExtraItems,
                &options(),
            )
            .unwrap();
        assert_eq!(html, "Handrail");
    }

    #[test]
    fn test_missing_and_invalid_templates() {
        let renderer =
            TemplateRenderer::from_sources([(DocumentType::NoteSheet, "{{#each items}}unclosed")]);
        let bill = model(vec![], vec![]);

        let err = renderer
            .render(&bill, DocumentType::CertificateIi, &options())
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateMissing { .. }));

        let err = renderer
            .render(&bill, DocumentType::NoteSheet, &options())
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateInvalid { .. }));
    }

    #[test]
    fn test_write_markup_uses_document_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = TemplateRenderer::from_sources([(DocumentType::LastPage, "{{bill_number}}")]);

        let path = renderer
            .write_markup(&model(vec![], vec![]), DocumentType::LastPage, &options(), dir.path())
            .unwrap();
        assert_eq!(path, dir.path().join("last_page.html"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "RA-3");
    }

    #[test]
    fn test_bundled_templates_render() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
        let renderer = TemplateRenderer::from_dir(&dir);
        let bill = model(vec![line("Handrail", "1", "900")], vec![]);

        for doc in DocumentType::ALL {
            let html = renderer.render(&bill, doc, &options()).unwrap();
            assert!(html.contains("RA-3"), "{} should show the bill number", doc);
        }
    }
}
