use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 工作簿提取错误
    #[error("提取错误: {0}")]
    Extraction(#[from] ExtractionError),
    /// 模板渲染错误
    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),
    /// 外部渲染器转换错误
    #[error("转换错误: {0}")]
    Conversion(#[from] ConversionError),
    /// 渲染器池耗尽
    #[error("渲染器池错误: {0}")]
    PoolExhausted(#[from] PoolExhaustedError),
    /// 打包错误
    #[error("打包错误: {0}")]
    Packaging(#[from] PackagingError),
    /// DOCX 写入错误
    #[error("文档错误: {0}")]
    Docx(#[from] DocxError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 工作簿提取错误
///
/// 只有整个工作簿无法打开时才会让该文件的处理失败；
/// 单个工作表读取失败只记录警告并跳过。
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// 无法打开或解析工作簿
    #[error("无法读取工作簿 {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    /// 工作簿中没有任何可读的工作表
    #[error("工作簿 {path} 中没有可读的工作表")]
    NoSheets { path: PathBuf },
    /// 严格模式下缺少必需的工作表
    #[error("缺少必需的工作表: {sheet}")]
    MissingSheet { sheet: String },
}

/// 模板渲染错误（只跳过一个文档类型）
#[derive(Debug, Error)]
pub enum RenderError {
    /// 模板文件不存在
    #[error("模板不存在: {template}")]
    TemplateMissing { template: String },
    /// 模板语法错误
    #[error("模板 {template} 无法解析: {reason}")]
    TemplateInvalid { template: String, reason: String },
    /// 渲染过程出错
    #[error("渲染 {template} 失败: {reason}")]
    Render { template: String, reason: String },
    /// 写入标记文件失败
    #[error("写入标记文件失败 ({path}): {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 渲染任务崩溃
    #[error("渲染任务异常退出: {0}")]
    Panicked(String),
}

/// 外部渲染器转换错误（只跳过一个产物）
#[derive(Debug, Error)]
pub enum ConversionError {
    /// 无法启动外部进程
    #[error("无法启动渲染器 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// 外部进程返回非零退出码
    #[error("渲染器退出码 {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    /// 进程成功但没有产出文件
    #[error("未生成输出文件: {path}")]
    MissingOutput { path: PathBuf },
    /// 超时，进程已被强制终止
    #[error("转换超时 ({timeout:?})，进程已终止")]
    Timeout { timeout: Duration },
    /// 临时文件等 IO 错误
    #[error("转换 IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 渲染器池获取失败
#[derive(Debug, Error)]
pub enum PoolExhaustedError {
    /// 等待空闲句柄超时
    #[error("等待渲染器句柄超时 ({waited:?}, 池大小 {pool_size})")]
    Timeout { waited: Duration, pool_size: usize },
    /// 池已关闭
    #[error("渲染器池已关闭")]
    Closed,
}

/// 打包错误（不影响已经生成的单个产物）
#[derive(Debug, Error)]
pub enum PackagingError {
    /// 无法创建压缩包
    #[error("无法创建压缩包 {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入压缩包条目失败
    #[error("写入压缩包失败 ({entry}): {reason}")]
    Write { entry: String, reason: String },
}

/// DOCX 写入错误
#[derive(Debug, Error)]
pub enum DocxError {
    #[error("写入 DOCX 失败 ({path}): {reason}")]
    Write { path: PathBuf, reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl ExtractionError {
    /// 创建工作簿无法读取错误
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ExtractionError::Unreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl RenderError {
    /// 创建渲染失败错误
    pub fn render(template: impl Into<String>, reason: impl ToString) -> Self {
        RenderError::Render {
            template: template.into(),
            reason: reason.to_string(),
        }
    }
}

impl AppError {
    /// 创建其他错误
    pub fn other(message: impl Into<String>) -> Self {
        AppError::Other(message.into())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
