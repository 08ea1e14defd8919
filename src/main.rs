use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bill_batch::utils::logging::init_log_file;
use bill_batch::{logger, App, Config, ExtractionMode};
use clap::Parser;

/// 把账单工作簿批量转换为 HTML / PDF / DOCX 文档
#[derive(Debug, Parser)]
#[command(name = "bill_batch", version, about)]
struct Cli {
    /// 输入工作簿（xlsx / xls / ods）
    #[arg(required = true)]
    input_files: Vec<PathBuf>,

    /// 输出根目录
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 模板使用反色字体
    #[arg(long)]
    reverse_font: bool,

    #[arg(long)]
    no_html: bool,

    #[arg(long)]
    no_pdf: bool,

    #[arg(long)]
    no_docx: bool,

    /// 同时处理的文件数量
    #[arg(long)]
    workers: Option<usize>,

    /// 渲染器池大小
    #[arg(long)]
    pool_size: Option<usize>,

    /// 外部渲染器命令
    #[arg(long)]
    renderer: Option<String>,

    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// 使用固定工作表名提取
    #[arg(long)]
    strict: bool,

    /// 覆盖 premium 百分比
    #[arg(long)]
    premium: Option<f64>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// 配置层级：TOML → 环境变量 → 命令行
    fn load_config(&self) -> Result<Config> {
        let base = match &self.config {
            Some(path) => Config::from_toml_file(path)
                .with_context(|| format!("加载配置文件失败: {}", path.display()))?,
            None => Config::default(),
        };
        let mut config = base.apply_env();

        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.templates_dir {
            config.templates_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.max_concurrent_bills = workers;
        }
        if let Some(size) = self.pool_size {
            config.renderer_pool_size = size;
        }
        if let Some(renderer) = &self.renderer {
            config.renderer_command = renderer.clone();
        }
        if let Some(premium) = self.premium {
            config.premium_override = Some(premium);
        }
        if self.strict {
            config.extraction_mode = ExtractionMode::Strict;
        }
        config.generation.reverse_font |= self.reverse_font;
        config.generation.html &= !self.no_html;
        config.generation.pdf &= !self.no_pdf;
        config.generation.docx &= !self.no_docx;
        config.verbose_logging |= self.verbose;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // 初始化日志
    init_log_file(&config.output_log_file)?;
    logger::init(config.verbose_logging, Some(config.output_log_file.as_path()))?;

    // 初始化并运行应用
    let app = App::initialize(config).await?;
    let summary = app.run(cli.input_files).await?;

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
