// reconcile.rs - 全量对账
//! 比较磁盘上的文件集合与索引中的路径集合，删除多余记录并分批索引现有文件。
//!
//! 只在内存中保存两个路径集合，不保存文件内容；
//! 只持有当前批次的路径锁，不持有全局锁，可与监控线程并发运行。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::sync::{BatchReport, IndexOutcome, Refresh, Synchronizer};

/// 对账结果
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub failures: Vec<(String, SyncError)>,
    pub took_ms: u64,
}

/// 可序列化的对账摘要
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub failed: Vec<String>,
    pub took_ms: u64,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> ReconcileSummary {
        ReconcileSummary {
            inserted: self.inserted,
            updated: self.updated,
            unchanged: self.unchanged,
            removed: self.removed,
            failed: self.failures.iter().map(|(path, _)| path.clone()).collect(),
            took_ms: self.took_ms,
        }
    }
}

/// 对账器
#[derive(Clone)]
pub struct Reconciler {
    sync: Arc<Synchronizer>,
}

impl Reconciler {
    pub fn new(sync: Arc<Synchronizer>) -> Self {
        Self { sync }
    }

    /// 全量对账
    ///
    /// 只有枚举磁盘或读取索引路径集合失败时返回错误；
    /// 单个文件的失败记录在报告里。
    pub fn reindex_all(&self) -> SyncResult<ReconcileReport> {
        let start = Instant::now();
        info!("开始全量对账");

        let on_disk = self.sync.files().enumerate()?;
        let disk_set: HashSet<&str> = on_disk.iter().map(String::as_str).collect();
        let indexed = self.sync.store().file_paths()?;

        let mut report = ReconcileReport::default();

        // 索引中有、磁盘上没有: 被外部删除或漏掉了删除事件
        let mut stale: Vec<&String> = indexed
            .iter()
            .filter(|path| !disk_set.contains(path.as_str()))
            .collect();
        stale.sort();
        for path in stale {
            // 枚举之后才写入的文件也会出现在这里，持锁复查磁盘后再决定
            match self.sync.refresh(path.as_str()) {
                Ok(Refresh::Removed) => report.removed += 1,
                Ok(Refresh::Absent) => {}
                Ok(Refresh::Indexed(IndexOutcome::Inserted)) => report.inserted += 1,
                Ok(Refresh::Indexed(IndexOutcome::Updated)) => report.updated += 1,
                Ok(Refresh::Indexed(IndexOutcome::Unchanged)) => report.unchanged += 1,
                Err(err) => {
                    warn!(path = %path, error = %err, "删除过期记录失败");
                    report.failures.push((path.clone(), err));
                }
            }
        }

        let batch: BatchReport = self.sync.index_many(&on_disk);
        report.inserted += batch.inserted;
        report.updated += batch.updated;
        report.unchanged += batch.unchanged;
        report.failures.extend(batch.failures);
        report.took_ms = start.elapsed().as_millis() as u64;

        info!(
            files = on_disk.len(),
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            removed = report.removed,
            failed = report.failures.len(),
            took_ms = report.took_ms,
            "对账完成"
        );
        Ok(report)
    }
}
