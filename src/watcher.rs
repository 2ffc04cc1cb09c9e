// watcher.rs - 文件变更监控
//! 递归监控内容根目录，把 notify 事件规范化为 `FileEvent`，交给工作线程执行同步。
//!
//! 事件流: notify 回调 → 无界通道 → 分发线程 → 有界任务队列 → 工作线程池。
//! notify 回调只做路径过滤，从不等待下游；阻塞 IO 全部在工作线程里完成。

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::error::{SyncError, SyncResult};
use crate::files::FileStore;
use crate::sync::Synchronizer;

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
}

/// 规范化后的文件事件（不持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    /// 相对内容根目录的路径
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 监控器状态: Idle → Watching → Stopped（终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Watching,
    Stopped,
}

/// 文件变更监控器
pub struct ChangeWatcher {
    sync: Arc<Synchronizer>,
    config: WatcherConfig,
    state: WatcherState,
    running: Option<Running>,
}

struct Running {
    // 先于分发线程释放，停止产生新事件
    watcher: Option<RecommendedWatcher>,
    stopping: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl ChangeWatcher {
    pub fn new(sync: Arc<Synchronizer>, config: WatcherConfig) -> Self {
        Self {
            sync,
            config,
            state: WatcherState::Idle,
            running: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// 开始监控内容根目录
    pub fn start(&mut self) -> SyncResult<()> {
        self.ensure_idle()?;

        let (event_tx, event_rx) = unbounded();
        let files = self.sync.files().clone();
        let root = files.root().to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for file_event in normalize_event(&files, &event) {
                        // 接收端已关闭说明正在停止，丢弃即可
                        let _ = event_tx.send(file_event);
                    }
                }
                Err(e) => error!(error = %e, "监控错误"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        info!(root = %root.display(), "开始监控");
        self.spawn(event_rx, Some(watcher));
        Ok(())
    }

    /// 接入外部事件流（不创建 notify 监控）
    pub fn attach(&mut self, events: Receiver<FileEvent>) -> SyncResult<()> {
        self.ensure_idle()?;
        self.spawn(events, None);
        Ok(())
    }

    /// 停止监控：不再分发新事件，已分发的事件处理完毕后返回
    pub fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            if self.state == WatcherState::Idle {
                self.state = WatcherState::Stopped;
            }
            return;
        };

        running.stopping.store(true, Ordering::SeqCst);
        drop(running.watcher.take());
        drop(running.stop_tx.take());

        if running.dispatcher.join().is_err() {
            error!("分发线程异常退出");
        }
        for worker in running.workers {
            if worker.join().is_err() {
                error!("工作线程异常退出");
            }
        }

        self.state = WatcherState::Stopped;
        info!("监控已停止");
    }

    fn ensure_idle(&self) -> SyncResult<()> {
        match self.state {
            WatcherState::Idle => Ok(()),
            state => Err(SyncError::InvalidInput(format!(
                "watcher cannot start from state {state:?}"
            ))),
        }
    }

    fn spawn(&mut self, events: Receiver<FileEvent>, watcher: Option<RecommendedWatcher>) {
        let (task_tx, task_rx) = bounded::<FileEvent>(self.config.queue_capacity.max(1));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let stopping = Arc::new(AtomicBool::new(false));

        let workers = (0..self.config.worker_threads.max(1))
            .map(|_| {
                let task_rx = task_rx.clone();
                let sync = self.sync.clone();
                thread::spawn(move || {
                    for event in task_rx.iter() {
                        apply_event(&sync, &event);
                    }
                })
            })
            .collect();

        let dispatcher = {
            let stopping = stopping.clone();
            thread::spawn(move || dispatch(events, stop_rx, task_tx, stopping))
        };

        self.running = Some(Running {
            watcher,
            stopping,
            stop_tx: Some(stop_tx),
            dispatcher,
            workers,
        });
        self.state = WatcherState::Watching;
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch(
    events: Receiver<FileEvent>,
    stop_rx: Receiver<()>,
    task_tx: Sender<FileEvent>,
    stopping: Arc<AtomicBool>,
) {
    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(event) => {
                    if stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    debug!(kind = ?event.kind, path = %event.path, "文件事件");
                    if task_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(stop_rx) -> _ => break,
        }
    }
    // task_tx 在这里释放，工作线程处理完队列后退出
}

/// 按事件执行同步；以事件处理时磁盘上的实际状态为准，重复或乱序的事件最终收敛
pub fn apply_event(sync: &Synchronizer, event: &FileEvent) {
    match sync.refresh(&event.path) {
        Ok(outcome) => {
            debug!(path = %event.path, kind = ?event.kind, outcome = ?outcome, "事件已处理");
        }
        Err(err) if err.is_missing_file() => {
            debug!(path = %event.path, "文件已消失，记录已移除");
        }
        Err(err) if err.is_skippable() => {
            warn!(path = %event.path, error = %err, "跳过文件");
        }
        Err(err) => {
            error!(path = %event.path, error = %err, "同步失败");
        }
    }
}

/// 把 notify 事件规范化为内容文件事件；非内容文件和隐藏路径被过滤掉
pub fn normalize_event(files: &FileStore, event: &notify::Event) -> Vec<FileEvent> {
    let kinds: Vec<(FileEventKind, &PathBuf)> = match event.kind {
        EventKind::Create(_) => tag(&event.paths, FileEventKind::Created),
        EventKind::Remove(_) => tag(&event.paths, FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            tag(&event.paths, FileEventKind::Deleted)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            tag(&event.paths, FileEventKind::Created)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let kind = if i == 0 { FileEventKind::Deleted } else { FileEventKind::Created };
                (kind, p)
            })
            .collect(),
        EventKind::Modify(_) | EventKind::Any => tag(&event.paths, FileEventKind::Modified),
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    };

    kinds
        .into_iter()
        .filter_map(|(kind, path)| {
            let rel = files.relative_key(path)?;
            files.is_content_file(&rel).then(|| FileEvent::new(kind, rel))
        })
        .collect()
}

fn tag(paths: &[PathBuf], kind: FileEventKind) -> Vec<(FileEventKind, &PathBuf)> {
    paths.iter().map(|p| (kind, p)).collect()
}
