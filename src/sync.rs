// sync.rs - 单文件同步
//! 比较文件校验和与索引记录，决定是否需要 upsert 或删除。
//!
//! `index` 在校验和门控下是幂等的：无论显式调用方和监控事件谁先到、到几次，
//! 最终状态都相同。同一路径上的操作通过路径锁串行化。

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::IndexStore;
use crate::error::{SyncError, SyncResult};
use crate::files::{self, FileStore};
use crate::registry::{PathGuard, PathLocks};
use crate::schema::PromptRecord;

/// 一次 `index` 调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// 新建记录
    Inserted,
    /// 校验和变化，原地更新
    Updated,
    /// 校验和相同，没有写入
    Unchanged,
}

/// `refresh` 的结果：按磁盘现状索引或删除
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// 文件存在，已按 `index` 处理
    Indexed(IndexOutcome),
    /// 文件不存在，记录已删除
    Removed,
    /// 文件和记录都不存在
    Absent,
}

/// 批量索引时每次提交包含的最大文件数
const BATCH_SIZE: usize = 64;

/// 持锁时读取文件后得出的处理方式
enum Plan {
    Unchanged,
    Write(PromptRecord, IndexOutcome),
    /// 文件消失或元数据头损坏，记录应被删除
    Drop(SyncError),
}

/// 同步器
pub struct Synchronizer {
    files: Arc<FileStore>,
    store: Arc<dyn IndexStore>,
    locks: PathLocks,
}

impl Synchronizer {
    pub fn new(files: Arc<FileStore>, store: Arc<dyn IndexStore>) -> Self {
        Self {
            files,
            store,
            locks: PathLocks::new(),
        }
    }

    pub fn files(&self) -> &Arc<FileStore> {
        &self.files
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// 索引单个文件（绝对路径或相对内容根目录的路径）
    pub fn index(&self, path: impl AsRef<Path>) -> SyncResult<IndexOutcome> {
        let rel = self.key_for(path.as_ref())?;
        let _guard = self.locks.lock(&rel);
        self.index_locked(&rel)
    }

    /// 删除路径对应的记录；不存在时什么也不做
    pub fn remove(&self, path: impl AsRef<Path>) -> SyncResult<bool> {
        let rel = self.key_for(path.as_ref())?;
        let _guard = self.locks.lock(&rel);
        self.remove_locked(&rel)
    }

    /// 在路径锁内检查文件是否存在，再决定索引还是删除。
    ///
    /// 适用于只知道"这个路径可能变了"的调用方（对账、监控事件），
    /// 避免在锁外判断存在性后与并发写入交错。
    pub fn refresh(&self, path: impl AsRef<Path>) -> SyncResult<Refresh> {
        let rel = self.key_for(path.as_ref())?;
        let _guard = self.locks.lock(&rel);
        if self.files.exists(&rel) {
            self.index_locked(&rel).map(Refresh::Indexed)
        } else if self.remove_locked(&rel)? {
            Ok(Refresh::Removed)
        } else {
            Ok(Refresh::Absent)
        }
    }

    fn index_locked(&self, rel: &str) -> SyncResult<IndexOutcome> {
        match self.plan(rel)? {
            Plan::Unchanged => Ok(IndexOutcome::Unchanged),
            Plan::Write(record, outcome) => {
                self.store.upsert(&record)?;
                info!(path = %rel, id = %record.id, outcome = ?outcome, "已索引");
                Ok(outcome)
            }
            Plan::Drop(err) => {
                self.remove_locked(rel)?;
                Err(err)
            }
        }
    }

    /// 读取文件并与已有记录比较；调用方必须持有该路径的锁
    fn plan(&self, rel: &str) -> SyncResult<Plan> {
        let file = match self.files.read(rel) {
            Ok(file) => file,
            // 文件消失或元数据头损坏时，记录不应继续存在
            Err(err) if err.is_missing_file() || matches!(err, SyncError::MalformedMetadata { .. }) => {
                return Ok(Plan::Drop(err));
            }
            Err(err) => return Err(err),
        };

        let existing = self.store.get_by_path(rel)?;
        if let Some(ref record) = existing {
            if record.checksum == file.checksum {
                debug!(path = %rel, "文件未变化，跳过");
                return Ok(Plan::Unchanged);
            }
        }

        let now = Utc::now();
        let (id, created_at, outcome) = match existing {
            Some(record) => (record.id, record.created_at, IndexOutcome::Updated),
            None => (Uuid::new_v4().to_string(), now, IndexOutcome::Inserted),
        };

        let title = file.meta.title.clone().unwrap_or_else(|| file_stem(rel));
        let record = PromptRecord {
            id,
            file_path: rel.to_string(),
            title,
            content: file.body,
            category: files::category_for(rel),
            model: file.meta.model.filter(|m| !m.is_empty()),
            tags: file.meta.tags,
            metadata: file.raw_meta,
            checksum: file.checksum,
            last_modified: file.modified,
            created_at,
            updated_at: now,
        };
        Ok(Plan::Write(record, outcome))
    }

    fn remove_locked(&self, rel: &str) -> SyncResult<bool> {
        let removed = self.store.delete(rel)?;
        if removed {
            info!(path = %rel, "已从索引移除");
        }
        Ok(removed)
    }

    fn key_for(&self, path: &Path) -> SyncResult<String> {
        let rel = self.files.relative_key(path).ok_or_else(|| {
            SyncError::InvalidInput(format!("{} is outside the content root", path.display()))
        })?;
        if !self.files.is_content_file(&rel) {
            return Err(SyncError::InvalidInput(format!("{rel} is not a content file")));
        }
        Ok(rel)
    }
}

/// 批量索引的结果
#[derive(Debug, Default)]
pub struct BatchReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failures: Vec<(String, SyncError)>,
}

impl BatchReport {
    pub fn record(&mut self, path: &str, result: SyncResult<IndexOutcome>) {
        match result {
            Ok(IndexOutcome::Inserted) => self.inserted += 1,
            Ok(IndexOutcome::Updated) => self.updated += 1,
            Ok(IndexOutcome::Unchanged) => self.unchanged += 1,
            Err(err) => {
                warn!(path = %path, error = %err, "跳过文件");
                self.failures.push((path.to_string(), err));
            }
        }
    }
}

impl Synchronizer {
    /// 批量索引；单个文件的失败被记录，不影响其他文件。
    ///
    /// 路径按排序分块，每块内的写入和删除合并为一次提交。
    pub fn index_many<I, S>(&self, paths: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        let mut keys = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match self.key_for(Path::new(path)) {
                Ok(rel) => keys.push(rel),
                Err(err) => report.record(path, Err(err)),
            }
        }
        keys.sort();
        keys.dedup();

        for chunk in keys.chunks(BATCH_SIZE) {
            self.index_chunk(chunk, &mut report);
        }
        report
    }

    fn index_chunk(&self, chunk: &[String], report: &mut BatchReport) {
        // chunk 已排序去重，按固定顺序加锁不会与其他批次互相等待
        let _guards: Vec<PathGuard> = chunk.iter().map(|rel| self.locks.lock(rel)).collect();

        let mut writes: Vec<(PromptRecord, IndexOutcome)> = Vec::new();
        let mut stale: Vec<String> = Vec::new();
        let mut dropped: Vec<(&str, SyncError)> = Vec::new();

        for rel in chunk {
            match self.plan(rel) {
                Ok(Plan::Unchanged) => report.record(rel, Ok(IndexOutcome::Unchanged)),
                Ok(Plan::Write(record, outcome)) => writes.push((record, outcome)),
                Ok(Plan::Drop(err)) => {
                    match self.store.get_by_path(rel) {
                        Ok(Some(_)) => stale.push(rel.clone()),
                        Ok(None) => {}
                        Err(store_err) => warn!(path = %rel, error = %store_err, "查询记录失败"),
                    }
                    dropped.push((rel.as_str(), err));
                }
                Err(err) => report.record(rel, Err(err)),
            }
        }

        let records: Vec<PromptRecord> = writes.iter().map(|(record, _)| record.clone()).collect();
        match self.store.apply_batch(&records, &stale) {
            Ok(()) => {
                for (record, outcome) in &writes {
                    info!(path = %record.file_path, id = %record.id, outcome = ?outcome, "已索引");
                    report.record(&record.file_path, Ok(*outcome));
                }
                for rel in &stale {
                    info!(path = %rel, "已从索引移除");
                }
            }
            Err(err) => {
                // 整批未生效，逐个重试以隔离出错的文件
                warn!(files = chunk.len(), error = %err, "批量提交失败，逐个重试");
                for (record, outcome) in &writes {
                    let result = self.store.upsert(record).map(|_| *outcome);
                    report.record(&record.file_path, result);
                }
                for rel in &stale {
                    if let Err(err) = self.remove_locked(rel) {
                        warn!(path = %rel, error = %err, "删除记录失败");
                    }
                }
            }
        }

        for (rel, err) in dropped {
            report.record(rel, Err(err));
        }
    }
}

fn file_stem(rel: &str) -> String {
    Path::new(rel)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
