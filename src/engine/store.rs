// engine/store.rs - 索引存储接口
//! 同步器和对账器只通过这个 trait 访问索引

use std::collections::HashSet;

use crate::error::SyncResult;
use crate::query::{QueryFilters, QueryOptions};
use crate::schema::PromptRecord;

/// 持久化索引存储
///
/// 实现必须保证读到之前已返回的写入（写后读一致）。
pub trait IndexStore: Send + Sync {
    /// 按文件路径查找记录
    fn get_by_path(&self, file_path: &str) -> SyncResult<Option<PromptRecord>>;

    /// 按 id 查找记录
    fn get_by_id(&self, id: &str) -> SyncResult<Option<PromptRecord>>;

    /// 插入或按 file_path 替换记录
    fn upsert(&self, record: &PromptRecord) -> SyncResult<()>;

    /// 删除 file_path 对应的记录，返回是否存在过
    fn delete(&self, file_path: &str) -> SyncResult<bool>;

    /// 一次写入多条记录并删除多个路径。
    ///
    /// 默认逐条执行；实现可以合并为一次提交，失败时整批都不生效。
    fn apply_batch(&self, upserts: &[PromptRecord], deletes: &[String]) -> SyncResult<()> {
        for record in upserts {
            self.upsert(record)?;
        }
        for file_path in deletes {
            self.delete(file_path)?;
        }
        Ok(())
    }

    /// 当前索引中的所有文件路径
    fn file_paths(&self) -> SyncResult<HashSet<String>>;

    /// 按过滤条件列出记录，更新时间倒序
    fn query(&self, filters: &QueryFilters) -> SyncResult<Vec<PromptRecord>>;

    /// 在标题和正文上全文检索，可叠加过滤条件
    fn search(
        &self,
        text: &str,
        filters: &QueryFilters,
        options: &QueryOptions,
    ) -> SyncResult<Vec<PromptRecord>>;
}
