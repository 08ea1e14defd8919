//! 外部渲染器池 - 基础设施层
//!
//! 持有稀缺资源（外部渲染器句柄），只暴露"借出 / 归还"的能力。
//!
//! - 大小固定，等待超时返回 `PoolExhaustedError`，从不扩容
//! - 句柄在 drop 时自动归还，任何退出路径都不会泄漏
//! - 通过 `Clone` 共享（内部是 `Arc`），没有全局单例

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::error::PoolExhaustedError;

/// 池的运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub in_use: usize,
    pub peak_in_use: usize,
    pub active_processes: usize,
    pub peak_active_processes: usize,
    pub acquired_total: usize,
    pub acquire_timeouts: usize,
}

#[derive(Debug, Default)]
struct Counters {
    in_use: AtomicUsize,
    peak_in_use: AtomicUsize,
    active_processes: AtomicUsize,
    peak_active_processes: AtomicUsize,
    acquired_total: AtomicUsize,
    acquire_timeouts: AtomicUsize,
}

#[derive(Debug)]
struct PoolInner {
    size: usize,
    program: String,
    leading_args: Vec<String>,
    semaphore: Arc<Semaphore>,
    free_slots: Mutex<Vec<usize>>,
    counters: Counters,
}

impl PoolInner {
    fn take_slot(&self) -> usize {
        let mut slots = self.free_slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.pop().unwrap_or_default()
    }

    fn return_slot(&self, slot: usize) {
        let mut slots = self.free_slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.push(slot);
    }
}

/// 渲染器池
#[derive(Debug, Clone)]
pub struct RendererPool {
    inner: Arc<PoolInner>,
}

impl RendererPool {
    /// 创建大小为 `size` 的池
    ///
    /// `command` 可以带前置参数，例如 `xvfb-run -a wkhtmltopdf`。
    pub fn new(size: usize, command: &str) -> Self {
        let size = size.max(1);
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        let leading_args = parts.collect();

        Self {
            inner: Arc::new(PoolInner {
                size,
                program,
                leading_args,
                semaphore: Arc::new(Semaphore::new(size)),
                // 反序存放，先借出 0 号句柄
                free_slots: Mutex::new((0..size).rev().collect()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// 借出一个句柄，最多等待 `timeout`
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledRenderer, PoolExhaustedError> {
        let permit = match tokio::time::timeout(timeout, self.inner.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolExhaustedError::Closed),
            Err(_) => {
                self.inner.counters.acquire_timeouts.fetch_add(1, Ordering::SeqCst);
                warn!("⚠️ 等待渲染器句柄超时 ({:?})，池大小 {}", timeout, self.inner.size);
                return Err(PoolExhaustedError::Timeout {
                    waited: timeout,
                    pool_size: self.inner.size,
                });
            }
        };

        let slot = self.inner.take_slot();
        let counters = &self.inner.counters;
        let in_use = counters.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_use.fetch_max(in_use, Ordering::SeqCst);
        counters.acquired_total.fetch_add(1, Ordering::SeqCst);
        debug!("借出渲染器 #{} (使用中 {}/{})", slot, in_use, self.inner.size);

        Ok(PooledRenderer {
            slot,
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// 归还句柄；等同于 drop
    pub fn release(&self, renderer: PooledRenderer) {
        drop(renderer);
    }

    /// 关闭池，之后的借出全部失败
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.inner.counters;
        PoolStats {
            size: self.inner.size,
            in_use: c.in_use.load(Ordering::SeqCst),
            peak_in_use: c.peak_in_use.load(Ordering::SeqCst),
            active_processes: c.active_processes.load(Ordering::SeqCst),
            peak_active_processes: c.peak_active_processes.load(Ordering::SeqCst),
            acquired_total: c.acquired_total.load(Ordering::SeqCst),
            acquire_timeouts: c.acquire_timeouts.load(Ordering::SeqCst),
        }
    }
}

/// 借出的渲染器句柄
#[derive(Debug)]
pub struct PooledRenderer {
    slot: usize,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledRenderer {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn program(&self) -> &str {
        &self.pool.program
    }

    /// 命令中的前置参数
    pub fn leading_args(&self) -> &[String] {
        &self.pool.leading_args
    }

    /// 标记一个外部进程正在运行，guard 释放时计数减一
    pub fn track_process(&self) -> ProcessGuard {
        let c = &self.pool.counters;
        let active = c.active_processes.fetch_add(1, Ordering::SeqCst) + 1;
        c.peak_active_processes.fetch_max(active, Ordering::SeqCst);
        ProcessGuard {
            pool: self.pool.clone(),
        }
    }
}

impl Drop for PooledRenderer {
    fn drop(&mut self) {
        // 先归还槽位，permit 随后释放
        self.pool.return_slot(self.slot);
        self.pool.counters.in_use.fetch_sub(1, Ordering::SeqCst);
        debug!("归还渲染器 #{}", self.slot);
    }
}

/// 外部进程计数 guard
#[derive(Debug)]
pub struct ProcessGuard {
    pool: Arc<PoolInner>,
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.pool.counters.active_processes.fetch_sub(1, Ordering::SeqCst);
    }
}
