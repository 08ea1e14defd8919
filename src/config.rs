use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 提取模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// 关键字启发式扫描（任意工作表名）
    #[default]
    Heuristic,
    /// 固定工作表名（Title / Work Order / Bill Quantity / Extra Items）
    Strict,
}

/// 需要生成的输出格式
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub html: bool,
    pub pdf: bool,
    pub docx: bool,
    /// 模板使用反色字体
    pub reverse_font: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            html: true,
            pdf: true,
            docx: true,
            reverse_font: false,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的账单文件数量
    pub max_concurrent_bills: usize,
    /// 外部渲染器句柄数量
    pub renderer_pool_size: usize,
    /// 外部渲染器命令（wkhtmltopdf 兼容）
    pub renderer_command: String,
    /// 等待空闲渲染器的最长时间（秒）
    pub acquire_timeout_secs: u64,
    /// 单个 PDF 转换的硬超时（秒）
    pub conversion_timeout_secs: u64,
    /// 页边距（毫米）
    pub page_margin_mm: u32,
    /// 模板目录
    pub templates_dir: PathBuf,
    /// 输出根目录
    pub output_dir: PathBuf,
    /// 批量压缩包文件名
    pub archive_name: String,
    /// 输出日志文件
    pub output_log_file: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 提取模式
    pub extraction_mode: ExtractionMode,
    /// 覆盖工作簿中的 premium 百分比
    pub premium_override: Option<f64>,
    pub generation: GenerationOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_bills: 4,
            renderer_pool_size: 4,
            renderer_command: "wkhtmltopdf".to_string(),
            acquire_timeout_secs: 30,
            conversion_timeout_secs: 10,
            page_margin_mm: 10,
            templates_dir: PathBuf::from("templates"),
            output_dir: PathBuf::from("batch_processing_output"),
            archive_name: "billing_documents.zip".to_string(),
            output_log_file: PathBuf::from("batch_processing.log"),
            verbose_logging: false,
            extraction_mode: ExtractionMode::Heuristic,
            premium_override: None,
            generation: GenerationOptions::default(),
        }
    }
}

impl Config {
    /// 从 TOML 文件加载配置，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 使用环境变量覆盖配置
    pub fn apply_env(self) -> Self {
        Self {
            max_concurrent_bills: env_parse("BILL_MAX_WORKERS").unwrap_or(self.max_concurrent_bills),
            renderer_pool_size: env_parse("RENDERER_POOL_SIZE").unwrap_or(self.renderer_pool_size),
            renderer_command: std::env::var("RENDERER_COMMAND").unwrap_or(self.renderer_command),
            acquire_timeout_secs: env_parse("RENDERER_ACQUIRE_TIMEOUT_SECS").unwrap_or(self.acquire_timeout_secs),
            conversion_timeout_secs: env_parse("CONVERSION_TIMEOUT_SECS").unwrap_or(self.conversion_timeout_secs),
            templates_dir: std::env::var("TEMPLATES_DIR").map(PathBuf::from).unwrap_or(self.templates_dir),
            output_dir: std::env::var("BILL_OUTPUT_DIR").map(PathBuf::from).unwrap_or(self.output_dir),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").map(PathBuf::from).unwrap_or(self.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            ..self
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
