// engine/builder.rs - 索引存储构建器
//! 使用 Builder 模式构建 PromptIndex

use std::path::PathBuf;
use std::sync::atomic::AtomicU64;

use parking_lot::Mutex;
use tantivy::{Index, IndexWriter, ReloadPolicy, directory::MmapDirectory, schema::Schema};
use tantivy::schema::Field;

use crate::error::{SyncError, SyncResult};
use crate::schema;
use crate::schema::fields::*;

use super::core::PromptIndex;

/// 索引存储构建器
pub struct PromptIndexBuilder {
    storage_path: Option<PathBuf>,
    heap_size: usize,
}

impl Default for PromptIndexBuilder {
    fn default() -> Self {
        Self {
            storage_path: None,
            heap_size: 50_000_000, // 50MB
        }
    }
}

impl PromptIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置存储路径；不设置则使用内存索引
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// 设置 IndexWriter 堆大小
    pub fn with_heap_size(mut self, size: usize) -> Self {
        self.heap_size = size;
        self
    }

    /// 构建索引存储
    pub fn build(self) -> SyncResult<PromptIndex> {
        // 构建 Schema
        let schema = schema::build_schema();

        // 创建或打开索引
        let index = match self.storage_path {
            Some(ref storage_path) => {
                std::fs::create_dir_all(storage_path)?;
                let dir = MmapDirectory::open(storage_path)
                    .map_err(|e| SyncError::Config(format!("cannot open index directory: {e}")))?;
                Index::open_or_create(dir, schema.clone())?
            }
            None => Index::create_in_ram(schema.clone()),
        };

        // 注册分词器（必须在创建 writer 之前）
        schema::register_tokenizers(&index);

        // 创建 Writer
        let writer: IndexWriter = index.writer(self.heap_size)?;

        // 创建 Reader；每次提交后手动刷新，保证写后读一致
        let reader = index.reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(PromptIndex {
            field_id: field(&schema, FIELD_ID)?,
            field_file_path: field(&schema, FIELD_FILE_PATH)?,
            field_title: field(&schema, FIELD_TITLE)?,
            field_content: field(&schema, FIELD_CONTENT)?,
            field_category: field(&schema, FIELD_CATEGORY)?,
            field_model: field(&schema, FIELD_MODEL)?,
            field_tags: field(&schema, FIELD_TAGS)?,
            field_metadata: field(&schema, FIELD_METADATA)?,
            field_checksum: field(&schema, FIELD_CHECKSUM)?,
            field_last_modified: field(&schema, FIELD_LAST_MODIFIED)?,
            field_created_at: field(&schema, FIELD_CREATED_AT)?,
            field_updated_at: field(&schema, FIELD_UPDATED_AT)?,
            index,
            writer: Mutex::new(writer),
            reader,
            commits: AtomicU64::new(0),
        })
    }
}

fn field(schema: &Schema, name: &str) -> SyncResult<Field> {
    schema.get_field(name)
        .map_err(|_| SyncError::Config(format!("Missing field: {name}")))
}
