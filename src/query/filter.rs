// query/filter.rs - 过滤条件构建器
//! 将解析后的过滤条件转换为 Tantivy 查询

use glob::Pattern;
use tantivy::query::{Query, BooleanQuery, TermQuery, Occur};
use tantivy::schema::{Schema, IndexRecordOption};
use tantivy::Term;

use super::types::*;
use crate::schema::fields::*;

/// 过滤器构建器
pub struct FilterBuilder<'a> {
    schema: &'a Schema,
}

impl<'a> FilterBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// 构建完整的过滤查询；路径过滤不在这里处理，由 `PathMatcher` 后处理
    pub fn build_filter_query(&self, filters: &QueryFilters) -> Option<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let Some(ref category) = filters.category {
            if let Some(query) = self.build_term_query(FIELD_CATEGORY, category) {
                clauses.push((Occur::Must, query));
            }
        }

        if let Some(ref model) = filters.model {
            if let Some(query) = self.build_term_query(FIELD_MODEL, model) {
                clauses.push((Occur::Must, query));
            }
        }

        // 标签过滤（使用 Should，匹配任一标签）
        if !filters.tags.is_empty() {
            if let Some(query) = self.build_tags_query(&filters.tags) {
                clauses.push((Occur::Must, query));
            }
        }

        if clauses.is_empty() {
            None
        } else {
            Some(Box::new(BooleanQuery::new(clauses)))
        }
    }

    /// 精确匹配查询
    pub fn build_term_query(&self, field_name: &str, value: &str) -> Option<Box<dyn Query>> {
        let field = self.schema.get_field(field_name).ok()?;
        let term = Term::from_field_text(field, value);
        Some(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
    }

    /// 构建标签查询
    fn build_tags_query(&self, tags: &[String]) -> Option<Box<dyn Query>> {
        let clauses: Vec<(Occur, Box<dyn Query>)> = tags.iter()
            .filter_map(|tag| self.build_term_query(FIELD_TAGS, tag))
            .map(|query| (Occur::Should, query))
            .collect();

        if clauses.is_empty() {
            None
        } else {
            Some(Box::new(BooleanQuery::new(clauses)))
        }
    }
}

/// 路径匹配器（使用 glob 模式）
pub struct PathMatcher {
    patterns: Vec<(Pattern, bool)>, // (pattern, is_exclude)
}

impl PathMatcher {
    pub fn new(filters: &[PathFilter]) -> Self {
        let patterns = filters.iter()
            .filter_map(|f| {
                Pattern::new(&f.pattern).ok().map(|p| (p, f.exclude))
            })
            .collect();

        Self { patterns }
    }

    /// 检查路径是否匹配过滤条件
    /// 返回 true 表示路径应该被包含在结果中
    pub fn matches(&self, path: &str) -> bool {
        if self.patterns.is_empty() {
            return true; // 没有过滤条件，全部包含
        }

        let mut included = false;
        let mut has_include_patterns = false;

        for (pattern, is_exclude) in &self.patterns {
            if *is_exclude {
                // 排除模式：如果匹配则排除
                if pattern.matches(path) {
                    return false;
                }
            } else {
                has_include_patterns = true;
                if pattern.matches(path) {
                    included = true;
                }
            }
        }

        // 如果有包含模式，必须至少匹配一个
        // 如果只有排除模式，默认包含
        !has_include_patterns || included
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_schema;

    #[test]
    fn test_path_matcher() {
        let filters = vec![
            PathFilter::include("debugging/*"),
            PathFilter::exclude("debugging/old-*"),
        ];

        let matcher = PathMatcher::new(&filters);

        assert!(matcher.matches("debugging/trace.md"));
        assert!(!matcher.matches("debugging/old-trace.md"));
        assert!(!matcher.matches("writing/essay.md"));
    }

    #[test]
    fn test_empty_filters_build_nothing() {
        let schema = build_schema();
        let builder = FilterBuilder::new(&schema);
        assert!(builder.build_filter_query(&QueryFilters::default()).is_none());
        assert!(builder.build_filter_query(&QueryFilters::category("debugging")).is_some());
    }
}
