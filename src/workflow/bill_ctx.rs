//! 账单处理上下文
//!
//! 封装"我正在处理第几个文件、哪张账单、输出到哪里"这一信息

use std::fmt::Display;
use std::path::PathBuf;

/// 账单处理上下文
#[derive(Debug, Clone)]
pub struct BillCtx {
    /// 文件在批次中的序号（从1开始，仅用于日志显示）
    pub bill_index: usize,

    /// 账单编号（已清理为可用作文件名的形式）
    pub bill_id: String,

    /// 输入文件
    pub input_file: PathBuf,

    /// 该账单的输出目录
    pub output_dir: PathBuf,
}

impl BillCtx {
    /// 创建新的账单上下文
    pub fn new(bill_index: usize, bill_id: String, input_file: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            bill_index,
            bill_id,
            input_file,
            output_dir,
        }
    }

    /// 压缩包中的条目名：`<账单编号>_<文件名>`
    pub fn archive_name(&self, file_name: &str) -> String {
        format!("{}_{}", self.bill_id, file_name)
    }
}

impl Display for BillCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[账单 {} #{}]", self.bill_index, self.bill_id)
    }
}

/// 把账单编号清理为文件名安全的形式
pub fn sanitize_bill_id(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '_' || c == '.').to_string();
    if cleaned.is_empty() {
        "BILL".to_string()
    } else {
        cleaned
    }
}
