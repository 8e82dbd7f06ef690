//! 配置热更新模块
//!
//! 提供 `ConfigWatcher` trait 和基于文件系统事件的实现。
//!
//! ```text
//! ConfigWatcher trait
//!  └── FileConfigWatcher — 监听文件所在目录，文件变更经 debounce 后触发 ReloadHandler
//! ```
//!
//! 监听器只负责发出"需要重新加载"的信号，重新加载本身（读取、校验、替换快照）
//! 由 `ReloadHandler` 实现，失败时应保留当前正在使用的配置。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use notify::RecommendedWatcher;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{error, info, warn};

// ============================================================================
// ConfigWatcher trait
// ============================================================================

/// 配置监听器抽象
#[async_trait]
pub trait ConfigWatcher: Send + Sync {
    /// 启动监听
    async fn start(&self) -> Result<()>;

    /// 停止监听并释放资源
    async fn stop(&self) -> Result<()>;
}

/// 重新加载回调
pub trait ReloadHandler: Send + Sync + 'static {
    /// 重新加载配置；返回错误时调用方只记录日志
    fn reload(&self) -> Result<()>;
}

// ============================================================================
// FileConfigWatcher — 基于文件系统事件的配置热更新
// ============================================================================

/// 基于文件系统事件的配置监听器
///
/// 编辑器保存文件时常见"写临时文件再重命名"，直接监听文件会丢失后续事件，
/// 因此监听父目录并按文件名过滤。
pub struct FileConfigWatcher {
    /// 监听的配置文件路径
    watch_path: PathBuf,
    /// debounce 窗口
    debounce: Duration,
    handler: Arc<dyn ReloadHandler>,
    /// notify watcher 必须存活，drop 后停止监听
    watcher: Mutex<Option<RecommendedWatcher>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl FileConfigWatcher {
    pub fn new(
        watch_path: impl AsRef<Path>,
        debounce: Duration,
        handler: Arc<dyn ReloadHandler>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            watch_path: watch_path.as_ref().to_path_buf(),
            debounce,
            handler,
            watcher: Mutex::new(None),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// 被监听的目录（相对路径的父目录为空时使用当前目录）
    fn watch_dir(&self) -> PathBuf {
        match self.watch_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// 事件是否涉及被监听的文件
    fn concerns(file_name: Option<&std::ffi::OsStr>, event: &notify::Event) -> bool {
        match file_name {
            Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
            None => true,
        }
    }
}

#[async_trait]
impl ConfigWatcher for FileConfigWatcher {
    async fn start(&self) -> Result<()> {
        use notify::{EventKind, RecursiveMode, Watcher};

        let watch_dir = self.watch_dir();
        let file_name = self.watch_path.file_name().map(|n| n.to_os_string());
        let debounce = self.debounce;
        let handler = self.handler.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        // notify 事件通过 channel 转发到 tokio 异步任务
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<()>(16);

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        // 只关心写入/创建/删除事件
                        let relevant = matches!(
                            event.kind,
                            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                        );
                        if relevant && Self::concerns(file_name.as_deref(), &event) {
                            let _ = event_tx.try_send(());
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "文件监听器事件错误");
                    }
                }
            })
            .context("创建文件监听器失败")?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("启动文件监听失败: {}", watch_dir.display()))?;

        *self.watcher.lock() = Some(watcher);
        info!(path = %self.watch_path.display(), "配置文件监听已启动");

        let watch_path = self.watch_path.clone();

        // 异步 debounce 循环：收到文件事件后等待 debounce 窗口再重载
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = event_rx.recv() => {
                        tokio::time::sleep(debounce).await;
                        // 清空积压的重复事件
                        while event_rx.try_recv().is_ok() {}

                        info!(path = %watch_path.display(), "配置文件变更，重新加载");
                        let handler = handler.clone();
                        match tokio::task::spawn_blocking(move || handler.reload()).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                error!(error = %e, "配置文件重新加载失败，保留当前配置");
                            }
                            Err(e) => {
                                error!(error = %e, "配置重新加载任务异常退出");
                            }
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        // 发送端已释放（监听器未调用 stop 就被 drop）同样退出
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("配置文件监听已停止");
                            break;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.watcher.lock().take();
        let _ = self.shutdown_tx.send(true);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    impl ReloadHandler for CountingHandler {
        fn reload(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_handler() -> (Arc<AtomicUsize>, Arc<dyn ReloadHandler>) {
        let count = Arc::new(AtomicUsize::new(0));
        (count.clone(), Arc::new(CountingHandler(count)))
    }

    #[test]
    fn test_watch_dir_for_relative_file() {
        let (_, handler) = counting_handler();
        let watcher = FileConfigWatcher::new("config.json", Duration::from_millis(10), handler);
        assert_eq!(watcher.watch_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_watch_dir_for_nested_file() {
        let (_, handler) = counting_handler();
        let watcher =
            FileConfigWatcher::new("/etc/calproxy/config.json", Duration::from_millis(10), handler);
        assert_eq!(watcher.watch_dir(), PathBuf::from("/etc/calproxy"));
    }

    #[test]
    fn test_handler_counts_reloads() {
        let (count, handler) = counting_handler();
        handler.reload().unwrap();
        handler.reload().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_file_change_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let (count, handler) = counting_handler();
        let watcher = FileConfigWatcher::new(&path, Duration::from_millis(50), handler);
        watcher.start().await.unwrap();

        std::fs::write(&path, r#"{"a": 1}"#).unwrap();

        // 等待事件投递和 debounce 窗口
        for _ in 0..50 {
            if count.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(count.load(Ordering::SeqCst) >= 1);

        watcher.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_other_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let (count, handler) = counting_handler();
        let watcher = FileConfigWatcher::new(&path, Duration::from_millis(20), handler);
        watcher.start().await.unwrap();

        std::fs::write(dir.path().join("other.txt"), "noise").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        watcher.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_watcher_ends_reload_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let (_, handler) = counting_handler();
        let watcher = FileConfigWatcher::new(&path, Duration::from_millis(20), handler.clone());
        watcher.start().await.unwrap();
        assert_eq!(Arc::strong_count(&handler), 3);

        // 不调用 stop 直接释放，后台任务应退出并释放 handler
        drop(watcher);
        for _ in 0..50 {
            if Arc::strong_count(&handler) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(Arc::strong_count(&handler), 1);
    }
}
