// api/request.rs - 请求类型
//! 提示词增删改查与搜索请求

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::files::UNCATEGORIZED;
use crate::query::{ParsedQuery, QueryParser};

/// 新建提示词
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePromptRequest {
    pub title: String,
    pub content: String,

    /// 目标分类（内容根目录下的一级子目录）
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_category() -> String {
    UNCATEGORIZED.to_string()
}

impl CreatePromptRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category: default_category(),
            model: None,
            tags: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.title.trim().is_empty() {
            return Err(SyncError::InvalidInput("title must not be empty".into()));
        }
        if self.content.trim().is_empty() {
            return Err(SyncError::InvalidInput("content must not be empty".into()));
        }
        Ok(())
    }
}

/// 修改提示词；未给出的字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePromptRequest {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub content: Option<String>,

    /// 改变分类会把文件移动到新目录
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl UpdatePromptRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(SyncError::InvalidInput("title must not be empty".into()));
        }
        if self.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(SyncError::InvalidInput("content must not be empty".into()));
        }
        if self.category.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(SyncError::InvalidInput("category must not be empty".into()));
        }
        Ok(())
    }
}

/// 搜索请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// 原始查询文本（包含过滤语法）
    #[serde(default)]
    pub query: String,

    /// 覆盖查询文本里的 `--limit`
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 解析为内部查询
    pub fn to_parsed(&self) -> ParsedQuery {
        let mut parsed = QueryParser::new().parse(&self.query);
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            parsed.options.limit = Some(limit);
        }
        parsed
    }
}
