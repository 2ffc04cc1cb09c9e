// engine/core.rs - 索引存储核心
//! 基于 Tantivy 的记录存储: 按路径 / id 查找、按字段过滤、全文检索

use std::cmp::Reverse;
use std::collections::HashSet;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tantivy::{
    DocAddress, Index, IndexWriter, IndexReader, Searcher,
    TantivyDocument, Term,
    query::{Query, AllQuery, BooleanQuery, TermQuery, QueryParser as TantivyQueryParser, Occur},
    collector::{DocSetCollector, TopDocs},
    schema::{Field, IndexRecordOption, Value},
};
use tracing::debug;

use crate::error::SyncResult;
use crate::query::{FilterBuilder, PathMatcher, QueryFilters, QueryOptions, SortBy};
use crate::schema::PromptRecord;

use super::store::IndexStore;

/// 提示词索引
pub struct PromptIndex {
    pub(crate) index: Index,
    pub(crate) writer: Mutex<IndexWriter>,
    pub(crate) reader: IndexReader,
    pub(crate) commits: AtomicU64,

    // 字段缓存
    pub(crate) field_id: Field,
    pub(crate) field_file_path: Field,
    pub(crate) field_title: Field,
    pub(crate) field_content: Field,
    pub(crate) field_category: Field,
    pub(crate) field_model: Field,
    pub(crate) field_tags: Field,
    pub(crate) field_metadata: Field,
    pub(crate) field_checksum: Field,
    pub(crate) field_last_modified: Field,
    pub(crate) field_created_at: Field,
    pub(crate) field_updated_at: Field,
}

/// 索引统计信息
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub total_documents: u64,
    /// 打开以来的提交次数
    pub commits: u64,
}

impl PromptIndex {
    /// 获取 Index 引用
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// 获取索引统计
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_documents: self.reader.searcher().num_docs(),
            commits: self.commits.load(Ordering::Relaxed),
        }
    }

    // === 私有方法 ===

    /// 提交并立即刷新 reader，调用方持有 writer 锁
    fn commit(&self, writer: &mut IndexWriter) -> SyncResult<()> {
        writer.commit()?;
        self.reader.reload()?;
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 暂存一批删除和写入；调用方持有 writer 锁并负责提交或回滚
    fn stage(
        &self,
        writer: &mut IndexWriter,
        upserts: &[PromptRecord],
        deletes: &[String],
    ) -> SyncResult<()> {
        for file_path in deletes {
            writer.delete_term(Term::from_field_text(self.field_file_path, file_path));
        }
        // 先删除旧文档，再写入新文档
        for record in upserts {
            writer.delete_term(Term::from_field_text(self.field_file_path, &record.file_path));
            writer.add_document(self.record_to_doc(record))?;
        }
        Ok(())
    }

    fn find_one(&self, field: Field, value: &str) -> SyncResult<Option<PromptRecord>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic);

        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top_docs.first() {
            Some((_score, address)) => Ok(Some(self.load(&searcher, *address)?)),
            None => Ok(None),
        }
    }

    fn load(&self, searcher: &Searcher, address: DocAddress) -> SyncResult<PromptRecord> {
        let doc: TantivyDocument = searcher.doc(address)?;
        Ok(self.doc_to_record(&doc))
    }

    fn filtered_query(&self, base: Box<dyn Query>, filters: &QueryFilters) -> Box<dyn Query> {
        let schema = self.index.schema();
        match FilterBuilder::new(&schema).build_filter_query(filters) {
            Some(filter) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, base),
                (Occur::Must, filter),
            ])),
            None => base,
        }
    }

    /// 收集所有命中文档，按更新时间倒序
    fn collect_by_update(
        &self,
        query: &dyn Query,
        filters: &QueryFilters,
    ) -> SyncResult<Vec<PromptRecord>> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(query, &DocSetCollector)?;
        let path_matcher = PathMatcher::new(&filters.paths);

        let mut records = Vec::with_capacity(addresses.len());
        for address in addresses {
            let record = self.load(&searcher, address)?;
            if path_matcher.matches(&record.file_path) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| {
            Reverse(a.updated_at)
                .cmp(&Reverse(b.updated_at))
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        Ok(records)
    }

    fn build_text_query(&self, text: &str) -> SyncResult<Box<dyn Query>> {
        let mut query_parser =
            TantivyQueryParser::for_index(&self.index, vec![self.field_title, self.field_content]);
        query_parser.set_conjunction_by_default();
        Ok(query_parser.parse_query(text)?)
    }

    fn doc_to_record(&self, doc: &TantivyDocument) -> PromptRecord {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let time = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_i64())
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .unwrap_or_default()
        };

        let model = doc.get_first(self.field_model)
            .and_then(|v| v.as_str())
            .filter(|m| !m.is_empty())
            .map(|m| m.to_string());

        let tags: Vec<String> = doc.get_all(self.field_tags)
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();

        PromptRecord {
            id: text(self.field_id),
            file_path: text(self.field_file_path),
            title: text(self.field_title),
            content: text(self.field_content),
            category: text(self.field_category),
            model,
            tags,
            metadata: text(self.field_metadata),
            checksum: text(self.field_checksum),
            last_modified: time(self.field_last_modified),
            created_at: time(self.field_created_at),
            updated_at: time(self.field_updated_at),
        }
    }

    fn record_to_doc(&self, record: &PromptRecord) -> TantivyDocument {
        let mut doc = TantivyDocument::new();

        doc.add_text(self.field_id, &record.id);
        doc.add_text(self.field_file_path, &record.file_path);
        doc.add_text(self.field_title, &record.title);
        doc.add_text(self.field_content, &record.content);
        doc.add_text(self.field_category, &record.category);
        if let Some(ref model) = record.model {
            doc.add_text(self.field_model, model);
        }
        for tag in &record.tags {
            doc.add_text(self.field_tags, tag);
        }
        doc.add_text(self.field_metadata, &record.metadata);
        doc.add_text(self.field_checksum, &record.checksum);

        doc.add_i64(self.field_last_modified, record.last_modified.timestamp_millis());
        doc.add_i64(self.field_created_at, record.created_at.timestamp_millis());
        doc.add_i64(self.field_updated_at, record.updated_at.timestamp_millis());

        doc
    }
}

impl IndexStore for PromptIndex {
    fn get_by_path(&self, file_path: &str) -> SyncResult<Option<PromptRecord>> {
        self.find_one(self.field_file_path, file_path)
    }

    fn get_by_id(&self, id: &str) -> SyncResult<Option<PromptRecord>> {
        self.find_one(self.field_id, id)
    }

    fn upsert(&self, record: &PromptRecord) -> SyncResult<()> {
        self.apply_batch(slice::from_ref(record), &[])?;
        debug!(path = %record.file_path, id = %record.id, "记录已写入索引");
        Ok(())
    }

    fn apply_batch(&self, upserts: &[PromptRecord], deletes: &[String]) -> SyncResult<()> {
        if upserts.is_empty() && deletes.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock();

        let result = self
            .stage(&mut writer, upserts, deletes)
            .and_then(|_| self.commit(&mut writer));
        if let Err(err) = result {
            // 丢弃未提交的操作，避免下一次提交带出半批数据
            writer.rollback()?;
            return Err(err);
        }

        if upserts.len() + deletes.len() > 1 {
            debug!(upserts = upserts.len(), deletes = deletes.len(), "批量写入索引");
        }
        Ok(())
    }

    fn delete(&self, file_path: &str) -> SyncResult<bool> {
        let mut writer = self.writer.lock();

        if self.find_one(self.field_file_path, file_path)?.is_none() {
            return Ok(false);
        }
        writer.delete_term(Term::from_field_text(self.field_file_path, file_path));
        self.commit(&mut writer)?;

        debug!(path = %file_path, "记录已从索引删除");
        Ok(true)
    }

    fn file_paths(&self) -> SyncResult<HashSet<String>> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(&AllQuery, &DocSetCollector)?;

        let mut paths = HashSet::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(path) = doc.get_first(self.field_file_path).and_then(|v| v.as_str()) {
                paths.insert(path.to_string());
            }
        }
        Ok(paths)
    }

    fn query(&self, filters: &QueryFilters) -> SyncResult<Vec<PromptRecord>> {
        let query = self.filtered_query(Box::new(AllQuery), filters);
        self.collect_by_update(query.as_ref(), filters)
    }

    fn search(
        &self,
        text: &str,
        filters: &QueryFilters,
        options: &QueryOptions,
    ) -> SyncResult<Vec<PromptRecord>> {
        let text = text.trim();
        if text.is_empty() {
            let mut records = self.query(filters)?;
            options.truncate(&mut records);
            return Ok(records);
        }

        let query = self.filtered_query(self.build_text_query(text)?, filters);

        if options.sort_by == SortBy::UpdatedDesc {
            let mut records = self.collect_by_update(query.as_ref(), filters)?;
            options.truncate(&mut records);
            return Ok(records);
        }

        let searcher = self.reader.searcher();
        let path_matcher = PathMatcher::new(&filters.paths);
        // 没有数量限制或有路径过滤时需要取全部命中再后处理
        let limit = match options.limit {
            Some(limit) if filters.paths.is_empty() => limit.max(1),
            _ => (searcher.num_docs() as usize).max(1),
        };

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;
        let mut records = Vec::new();
        for (_score, address) in top_docs {
            let record = self.load(&searcher, address)?;
            if !path_matcher.matches(&record.file_path) {
                continue;
            }
            records.push(record);
            if options.limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }
        }
        Ok(records)
    }
}
