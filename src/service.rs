// service.rs - 提示词服务
//! 对外的增删改查入口：先写文件，再同步索引，返回时索引已反映这次写入。
//!
//! 监控线程可能在同一时间收到同一文件的事件；两条路径都走 `Synchronizer`，
//! 校验和门控保证结果一致。

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::api::{
    CategoryCount, CreatePromptRequest, PromptResponse, QueryInfo, SearchRequest, SearchResponse,
    UpdatePromptRequest,
};
use crate::error::{SyncError, SyncResult};
use crate::files::{self, FileStore};
use crate::frontmatter::{self, PromptMeta};
use crate::engine::IndexStore;
use crate::query::QueryFilters;
use crate::reconcile::{ReconcileSummary, Reconciler};
use crate::schema::PromptRecord;
use crate::sync::Synchronizer;

/// 新建提示词的初始版本号
pub const INITIAL_VERSION: &str = "1.0";

/// 提示词服务
#[derive(Clone)]
pub struct PromptService {
    sync: Arc<Synchronizer>,
    reconciler: Reconciler,
}

impl PromptService {
    pub fn new(sync: Arc<Synchronizer>) -> Self {
        let reconciler = Reconciler::new(sync.clone());
        Self { sync, reconciler }
    }

    fn files(&self) -> &FileStore {
        self.sync.files()
    }

    fn store(&self) -> &Arc<dyn IndexStore> {
        self.sync.store()
    }

    /// 新建提示词，写入 `<category>/<slug>.md`
    pub fn create(&self, req: CreatePromptRequest) -> SyncResult<PromptResponse> {
        req.validate()?;

        let meta = PromptMeta {
            title: Some(req.title.trim().to_string()),
            model: req.model.filter(|m| !m.trim().is_empty()),
            tags: clean_tags(req.tags),
            created: Some(today()),
            version: Some(INITIAL_VERSION.to_string()),
            ..Default::default()
        };

        let slug = files::slugify(&req.title);
        let rel = self.create_unique(&req.category, &slug, &meta, &req.content)?;
        self.sync.index(&rel)?;

        let record = self.record_at(&rel)?;
        info!(id = %record.id, path = %rel, "已创建提示词");
        Ok(record.into())
    }

    /// 修改提示词；分类变化时移动文件
    pub fn update(&self, id: &str, req: UpdatePromptRequest) -> SyncResult<PromptResponse> {
        req.validate()?;
        let record = self.record_by_id(id)?;
        let old_rel = record.file_path.clone();

        // 以磁盘上的文件为准合并，索引里的元数据可能落后
        let current = match self.files().read(&old_rel) {
            Ok(current) => current,
            Err(err) if err.is_missing_file() => {
                self.sync.remove(&old_rel)?;
                return Err(SyncError::NotFound(id.to_string()));
            }
            Err(err) => return Err(err),
        };

        let mut meta = current.meta;
        if let Some(title) = req.title {
            meta.title = Some(title.trim().to_string());
        }
        if let Some(model) = req.model {
            meta.model = Some(model).filter(|m| !m.trim().is_empty());
        }
        if let Some(tags) = req.tags {
            meta.tags = clean_tags(tags);
        }
        meta.updated = Some(today());
        meta.version = Some(frontmatter::bump_version(meta.version.as_deref()));
        let body = req.content.unwrap_or(current.body);

        let target = req.category.filter(|c| *c != record.category);
        let rel = match target {
            None => {
                self.files().write_path(&old_rel, &meta, &body)?;
                self.sync.index(&old_rel)?;
                old_rel
            }
            Some(category) => self.move_prompt(&old_rel, &category, &meta, &body)?,
        };

        let updated = self.record_at(&rel)?;
        info!(id = %updated.id, path = %rel, "已更新提示词");
        Ok(updated.into())
    }

    /// 移动到新分类: 写新文件 → 索引 → 确认 → 删旧文件 → 删旧记录。
    /// 任何一步失败时旧文件仍然存在，不会丢失内容。
    fn move_prompt(
        &self,
        old_rel: &str,
        category: &str,
        meta: &PromptMeta,
        body: &str,
    ) -> SyncResult<String> {
        let filename = Path::new(old_rel)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| SyncError::InvalidInput(format!("{old_rel} has no file name")))?;
        let new_rel = match self.files().create(category, &filename, meta, body) {
            Ok(rel) => rel,
            Err(err) if err.is_already_exists() => {
                return Err(SyncError::InvalidInput(format!(
                    "{category}/{filename} already exists"
                )));
            }
            Err(err) => return Err(err),
        };
        self.sync.index(&new_rel)?;
        if self.store().get_by_path(&new_rel)?.is_none() {
            return Err(SyncError::NotFound(new_rel));
        }

        match self.files().delete(old_rel) {
            Ok(()) => {}
            Err(err) if err.is_missing_file() => {}
            Err(err) => {
                warn!(path = %old_rel, error = %err, "旧文件删除失败，两份文件同时存在");
                return Err(err);
            }
        }
        self.sync.remove(old_rel)?;

        info!(from = %old_rel, to = %new_rel, "已移动提示词");
        Ok(new_rel)
    }

    /// 删除提示词文件和记录
    pub fn delete(&self, id: &str) -> SyncResult<()> {
        let record = self.record_by_id(id)?;
        match self.files().delete(&record.file_path) {
            Ok(()) => {}
            // 文件已被外部删除，只剩记录
            Err(err) if err.is_missing_file() => {}
            Err(err) => return Err(err),
        }
        self.sync.remove(&record.file_path)?;
        info!(id = %id, path = %record.file_path, "已删除提示词");
        Ok(())
    }

    pub fn get(&self, id: &str) -> SyncResult<PromptResponse> {
        self.record_by_id(id).map(Into::into)
    }

    /// 按搜索表达式列出提示词
    pub fn list(&self, expression: &str) -> SyncResult<Vec<PromptResponse>> {
        self.search(&SearchRequest::new(expression))
            .map(|response| response.results)
    }

    pub fn search(&self, req: &SearchRequest) -> SyncResult<SearchResponse> {
        let start = Instant::now();
        let parsed = req.to_parsed();
        let records = self
            .store()
            .search(&parsed.text, &parsed.filters, &parsed.options)?;

        let results = records.into_iter().map(PromptResponse::from).collect();
        Ok(SearchResponse::new(QueryInfo::from(&parsed), results)
            .with_took(start.elapsed().as_millis() as u64))
    }

    /// 所有分类及数量，按名称排序
    pub fn categories(&self) -> SyncResult<Vec<CategoryCount>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in self.store().query(&QueryFilters::default())? {
            *counts.entry(record.category).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(name, count)| CategoryCount { name, count })
            .collect())
    }

    /// 手动触发全量对账
    pub fn reindex(&self) -> SyncResult<ReconcileSummary> {
        self.reconciler.reindex_all().map(|report| report.summary())
    }

    fn record_by_id(&self, id: &str) -> SyncResult<PromptRecord> {
        self.store()
            .get_by_id(id)?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    fn record_at(&self, rel: &str) -> SyncResult<PromptRecord> {
        self.store()
            .get_by_path(rel)?
            .ok_or_else(|| SyncError::NotFound(rel.to_string()))
    }

    /// 依次尝试 `slug.md`、`slug-2.md`…，由文件系统保证不覆盖已有文件
    fn create_unique(
        &self,
        category: &str,
        slug: &str,
        meta: &PromptMeta,
        body: &str,
    ) -> SyncResult<String> {
        let ext = self.files().default_extension();
        let mut n = 1;
        loop {
            let filename = match n {
                1 => format!("{slug}.{ext}"),
                _ => format!("{slug}-{n}.{ext}"),
            };
            match self.files().create(category, &filename, meta, body) {
                Err(err) if err.is_already_exists() => n += 1,
                result => return result,
            }
        }
    }
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
