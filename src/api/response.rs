// api/response.rs - 响应类型
//! 提示词、搜索结果和分类统计的结构化响应

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::query::ParsedQuery;
use crate::schema::PromptRecord;

/// 单个提示词
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    pub id: String,
    pub file_path: String,
    pub title: String,
    pub content: String,
    pub category: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// 元数据头的全部字段
    pub metadata: Map<String, Value>,

    pub last_modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PromptRecord> for PromptResponse {
    fn from(record: PromptRecord) -> Self {
        let metadata = record.metadata_map();
        Self {
            id: record.id,
            file_path: record.file_path,
            title: record.title,
            content: record.content,
            category: record.category,
            model: record.model,
            tags: record.tags,
            metadata,
            last_modified: record.last_modified,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// 搜索响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: QueryInfo,
    pub results: Vec<PromptResponse>,
    pub total: usize,
    /// 搜索耗时（毫秒）
    pub took_ms: u64,
}

impl SearchResponse {
    pub fn new(query: QueryInfo, results: Vec<PromptResponse>) -> Self {
        Self {
            total: results.len(),
            query,
            results,
            took_ms: 0,
        }
    }

    pub fn with_took(mut self, took_ms: u64) -> Self {
        self.took_ms = took_ms;
        self
    }
}

/// 查询信息（用于调试和展示）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInfo {
    pub raw_query: String,

    /// 去除过滤语法后的全文表达式
    pub search_text: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applied_filters: Vec<String>,
}

impl From<&ParsedQuery> for QueryInfo {
    fn from(parsed: &ParsedQuery) -> Self {
        let filters = &parsed.filters;
        let mut applied = Vec::new();
        if let Some(ref category) = filters.category {
            applied.push(format!("category={category}"));
        }
        if let Some(ref model) = filters.model {
            applied.push(format!("model={model}"));
        }
        if !filters.tags.is_empty() {
            applied.push(format!("tags={}", filters.tags.join(",")));
        }
        for path in &filters.paths {
            let key = if path.exclude { "exclude-path" } else { "path" };
            applied.push(format!("{key}={}", path.pattern));
        }

        Self {
            raw_query: parsed.raw_text.clone(),
            search_text: parsed.text.clone(),
            applied_filters: applied,
        }
    }
}

/// 分类及其提示词数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

/// 错误响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&SyncError> for ErrorResponse {
    fn from(err: &SyncError) -> Self {
        let code = match err {
            SyncError::NotFound(_) => "not_found",
            SyncError::InvalidInput(_) | SyncError::QueryParse(_) => "invalid_input",
            SyncError::Read { .. } | SyncError::MalformedMetadata { .. } => "unreadable_file",
            SyncError::Write { .. } => "write_failed",
            _ => "internal",
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}
