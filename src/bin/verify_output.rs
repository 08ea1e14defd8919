use std::path::PathBuf;
use std::process::ExitCode;

use bill_batch::services::{OutputVerifier, REQUIRED_DOCUMENTS};
use bill_batch::{logger, OutputFormat};
use clap::Parser;

/// 校验批量处理的输出目录
#[derive(Debug, Parser)]
#[command(name = "verify_output", version, about)]
struct Cli {
    #[arg(short, long, default_value = "batch_processing_output")]
    output_dir: PathBuf,

    /// 不要求 HTML 文件
    #[arg(long)]
    no_html: bool,

    /// 不要求 PDF 文件
    #[arg(long)]
    no_pdf: bool,

    /// 不要求 DOCX 文件
    #[arg(long)]
    no_docx: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logger::init(cli.verbose, None) {
        eprintln!("日志初始化失败: {}", e);
    }

    let formats: Vec<OutputFormat> = OutputFormat::ALL
        .into_iter()
        .filter(|format| match format {
            OutputFormat::Html => !cli.no_html,
            OutputFormat::Pdf => !cli.no_pdf,
            OutputFormat::Docx => !cli.no_docx,
        })
        .collect();

    let report = OutputVerifier::new(&cli.output_dir)
        .with_required(REQUIRED_DOCUMENTS.to_vec(), formats)
        .run();
    println!("{}", report.summary_text());

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
