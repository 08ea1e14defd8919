//! 外部 PDF 转换进程 - 基础设施层
//!
//! 调用 wkhtmltopdf 兼容的外部渲染器把标记文档转换为分页文档。
//! 每次转换都有硬超时；超时后进程被终止并回收，临时文件在所有路径上删除。

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ConversionError;
use crate::infrastructure::renderer_pool::PooledRenderer;

/// Windows 下不弹出控制台窗口
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// stderr 只保留这么多字符
const STDERR_LIMIT: usize = 2000;

/// PDF 转换器
#[derive(Debug, Clone)]
pub struct PdfConverter {
    timeout: Duration,
    margin_mm: u32,
}

impl PdfConverter {
    pub fn new(timeout: Duration, margin_mm: u32) -> Self {
        Self { timeout, margin_mm }
    }

    fn command(&self, renderer: &PooledRenderer, input: &Path, output: &Path) -> Command {
        let margin = format!("{}mm", self.margin_mm);
        let mut cmd = Command::new(renderer.program());
        cmd.args(renderer.leading_args())
            .arg("--quiet")
            .args(["--margin-top", margin.as_str()])
            .args(["--margin-right", margin.as_str()])
            .args(["--margin-bottom", margin.as_str()])
            .args(["--margin-left", margin.as_str()])
            .arg("--enable-local-file-access")
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);
        cmd
    }

    /// 把 `markup` 转换为 `output`
    ///
    /// 调用方必须持有一个借出的渲染器句柄。
    pub async fn convert(
        &self,
        renderer: &PooledRenderer,
        markup: &Path,
        output: &Path,
    ) -> Result<(), ConversionError> {
        // 在临时副本上转换，drop 时删除
        let temp = tempfile::Builder::new()
            .prefix("bill_markup_")
            .suffix(".html")
            .tempfile()?;
        tokio::fs::copy(markup, temp.path()).await?;

        if tokio::fs::try_exists(output).await.unwrap_or(false) {
            tokio::fs::remove_file(output).await?;
        }

        let mut child = self
            .command(renderer, temp.path(), output)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                program: renderer.program().to_string(),
                source,
            })?;
        let _process = renderer.track_process();
        debug!(
            "渲染器 #{} 开始转换 {} (pid {:?})",
            renderer.slot(),
            markup.display(),
            child.id()
        );

        // 并发读取 stderr，避免管道写满阻塞子进程
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stderr_task.abort();
                return Err(ConversionError::Io(e));
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("⚠️ 无法终止超时的渲染进程: {}", e);
                }
                stderr_task.abort();
                return Err(ConversionError::Timeout {
                    timeout: self.timeout,
                });
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(ConversionError::NonZeroExit {
                code: status.code(),
                stderr: stderr.trim().chars().take(STDERR_LIMIT).collect(),
            });
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(ConversionError::MissingOutput {
                path: output.to_path_buf(),
            }),
        }
    }
}

/// 探测外部渲染器是否可用，返回版本信息
pub async fn detect_renderer(command: &str) -> Option<String> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?;
    let mut cmd = Command::new(program);
    cmd.args(parts)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    match timeout(Duration::from_secs(5), cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            Some(version.lines().next().unwrap_or_default().trim().to_string())
        }
        Ok(Ok(output)) => {
            debug!("渲染器 {} --version 退出码 {:?}", command, output.status.code());
            None
        }
        Ok(Err(e)) => {
            debug!("渲染器 {} 无法启动: {}", command, e);
            None
        }
        Err(_) => None,
    }
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    /// 写一个假的渲染器脚本，返回可用作 renderer_command 的命令
    pub fn fake_renderer(dir: &Path, name: &str, body: &str) -> String {
        let path: PathBuf = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        format!("sh {}", path.display())
    }

    /// 正常输出：把内容写到最后一个参数
    pub const WRITES_PDF: &str = "for last; do :; done\nprintf '%%PDF-1.4 fake' > \"$last\"";
}

#[cfg(all(test, unix))]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::infrastructure::renderer_pool::RendererPool;
    use std::sync::Arc;
    use std::time::Instant;

    async fn run(command: &str, timeout: Duration) -> (tempfile::TempDir, Result<(), ConversionError>) {
        let dir = tempfile::tempdir().unwrap();
        let markup = dir.path().join("first_page.html");
        std::fs::write(&markup, "<h1>Bill</h1>").unwrap();
        let output = dir.path().join("first_page.pdf");

        let pool = RendererPool::new(1, command);
        let renderer = pool.acquire(Duration::from_secs(1)).await.unwrap();
        let result = PdfConverter::new(timeout, 10)
            .convert(&renderer, &markup, &output)
            .await;
        (dir, result)
    }

    #[tokio::test]
    async fn test_successful_conversion() {
        let scripts = tempfile::tempdir().unwrap();
        let cmd = fake_renderer(scripts.path(), "ok.sh", WRITES_PDF);

        let (dir, result) = run(&cmd, Duration::from_secs(10)).await;
        assert!(result.is_ok(), "{:?}", result);
        let pdf = std::fs::read(dir.path().join("first_page.pdf")).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_renderer_receives_margins_and_flags() {
        let scripts = tempfile::tempdir().unwrap();
        let cmd = fake_renderer(
            scripts.path(),
            "args.sh",
            "for last; do :; done\necho \"$@\" > \"$last\"",
        );

        let (dir, result) = run(&cmd, Duration::from_secs(10)).await;
        assert!(result.is_ok(), "{:?}", result);
        let args = std::fs::read_to_string(dir.path().join("first_page.pdf")).unwrap();
        assert!(args.starts_with("--quiet --margin-top 10mm --margin-right 10mm"));
        assert!(args.contains("--enable-local-file-access"));
        // 输入是临时副本而不是原文件
        assert!(args.contains("bill_markup_"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_captures_stderr() {
        let scripts = tempfile::tempdir().unwrap();
        let cmd = fake_renderer(scripts.path(), "fail.sh", "echo 'cannot load page' >&2\nexit 3");

        let (_dir, result) = run(&cmd, Duration::from_secs(10)).await;
        match result {
            Err(ConversionError::NonZeroExit { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("cannot load page"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_without_output_is_missing_output() {
        let scripts = tempfile::tempdir().unwrap();
        let cmd = fake_renderer(scripts.path(), "silent.sh", "exit 0");

        let (_dir, result) = run(&cmd, Duration::from_secs(10)).await;
        assert!(matches!(result, Err(ConversionError::MissingOutput { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let scripts = tempfile::tempdir().unwrap();
        let cmd = fake_renderer(scripts.path(), "hang.sh", "exec sleep 30");

        let started = Instant::now();
        let (_dir, result) = run(&cmd, Duration::from_millis(300)).await;
        assert!(matches!(result, Err(ConversionError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let (_dir, result) = run("definitely-not-a-renderer-binary", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ConversionError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_pool() {
        let scripts = tempfile::tempdir().unwrap();
        let cmd = fake_renderer(
            scripts.path(),
            "slow.sh",
            &format!("sleep 0.3\n{}", WRITES_PDF),
        );
        let work = tempfile::tempdir().unwrap();
        let pool = RendererPool::new(2, &cmd);
        let converter = Arc::new(PdfConverter::new(Duration::from_secs(10), 10));

        let mut handles = Vec::new();
        for i in 0..6 {
            let markup = work.path().join(format!("doc_{}.html", i));
            std::fs::write(&markup, "<p>x</p>").unwrap();
            let output = work.path().join(format!("doc_{}.pdf", i));
            let pool = pool.clone();
            let converter = converter.clone();
            handles.push(tokio::spawn(async move {
                let renderer = pool.acquire(Duration::from_secs(30)).await?;
                converter
                    .convert(&renderer, &markup, &output)
                    .await
                    .map_err(crate::error::AppError::from)
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let stats = pool.stats();
        assert!(stats.peak_active_processes <= 2);
        assert!(stats.peak_in_use <= 2);
        assert_eq!(stats.acquired_total, 6);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.active_processes, 0);
    }

    #[tokio::test]
    async fn test_detect_missing_renderer() {
        assert!(detect_renderer("definitely-not-a-renderer-binary").await.is_none());
        assert!(detect_renderer("").await.is_none());
    }
}
