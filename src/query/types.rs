// query/types.rs - 查询相关类型定义
//! 定义查询请求和过滤条件的结构

use serde::{Serialize, Deserialize};

/// 解析后的查询请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// 全文检索表达式（去除过滤参数后的文本）
    pub text: String,
    /// 原始查询文本
    pub raw_text: String,
    /// 过滤条件
    pub filters: QueryFilters,
    /// 排序与分页
    pub options: QueryOptions,
}

/// 查询过滤条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// 分类精确匹配
    pub category: Option<String>,
    /// 模型精确匹配
    pub model: Option<String>,
    /// 标签过滤（匹配任一标签）
    pub tags: Vec<String>,
    /// 路径过滤（支持通配符）
    /// 例如: ["debugging/*"]
    pub paths: Vec<PathFilter>,
}

impl QueryFilters {
    pub fn category(category: impl Into<String>) -> Self {
        Self { category: Some(category.into()), ..Default::default() }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.model.is_none() && self.tags.is_empty() && self.paths.is_empty()
    }
}

/// 路径过滤条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathFilter {
    /// 路径模式（支持 glob 通配符）
    pub pattern: String,
    /// 是否排除（true 表示排除匹配的路径）
    pub exclude: bool,
}

impl PathFilter {
    pub fn include(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), exclude: false }
    }

    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), exclude: true }
    }
}

/// 排序方式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// 按相关度（全文检索默认）
    #[default]
    Relevance,
    /// 按更新时间（最新优先）
    UpdatedDesc,
}

/// 查询选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOptions {
    /// 排序方式
    pub sort_by: SortBy,
    /// 返回数量限制；None 表示返回全部匹配
    pub limit: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            sort_by: SortBy::Relevance,
            limit: None,
        }
    }
}

impl QueryOptions {
    pub(crate) fn truncate<T>(&self, items: &mut Vec<T>) {
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
    }
}
