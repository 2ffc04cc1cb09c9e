// query/parser.rs - 查询解析器
//! 解析全文检索表达式 + 结构化过滤语法
//!
//! 支持的语法:
//! - 全文: "borrow checker"
//! - 分类: --category=debugging
//! - 模型: --model=gpt-4 或 --model="claude 3"
//! - 标签: --tag=rust,review
//! - 路径过滤: --path=debugging/* ，排除: --exclude-path=drafts/*
//! - 排序: --sort=relevance|updated
//! - 数量: --limit=20

use regex::Regex;
use std::collections::HashMap;
use once_cell::sync::Lazy;

use super::types::*;

/// 查询解析器
#[derive(Debug, Default)]
pub struct QueryParser;

// 正则表达式预编译
static ARG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // 匹配 --key=value 或 --key="value with spaces"
    Regex::new(r#"--([a-z\-]+)=(?:"([^"]+)"|([^\s]+))"#).expect("valid argument pattern")
});

impl QueryParser {
    /// 创建新的解析器
    pub fn new() -> Self {
        Self
    }

    /// 解析查询字符串
    pub fn parse(&self, input: &str) -> ParsedQuery {
        let input = input.trim();
        let mut args: HashMap<String, Vec<String>> = HashMap::new();
        let mut text_parts: Vec<&str> = Vec::new();

        // 提取所有 --key=value 参数
        let mut last_end = 0;
        for cap in ARG_PATTERN.captures_iter(input) {
            let Some(full_match) = cap.get(0) else { continue };

            // 收集参数之前的文本
            if full_match.start() > last_end {
                text_parts.push(input[last_end..full_match.start()].trim());
            }
            last_end = full_match.end();

            let key = cap.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            // 优先使用带引号的值，否则使用不带引号的值
            let value = cap.get(2)
                .or_else(|| cap.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();

            args.entry(key).or_default().push(value);
        }

        // 收集最后一个参数之后的文本
        if last_end < input.len() {
            text_parts.push(input[last_end..].trim());
        }

        let text = text_parts.iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        let filters = self.parse_filters(&args);
        let options = self.parse_options(&args, &text);

        ParsedQuery {
            text,
            raw_text: input.to_string(),
            filters,
            options,
        }
    }

    /// 解析过滤条件
    fn parse_filters(&self, args: &HashMap<String, Vec<String>>) -> QueryFilters {
        let mut filters = QueryFilters::default();

        filters.category = last_value(args, "category");
        filters.model = last_value(args, "model");

        // 标签
        if let Some(tags) = args.get("tag") {
            for t in tags {
                filters.tags.extend(
                    t.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
                );
            }
        }

        // 路径过滤
        if let Some(paths) = args.get("path") {
            for path in paths {
                filters.paths.push(PathFilter::include(path.clone()));
            }
        }
        if let Some(paths) = args.get("exclude-path") {
            for path in paths {
                filters.paths.push(PathFilter::exclude(path.clone()));
            }
        }

        filters
    }

    fn parse_options(&self, args: &HashMap<String, Vec<String>>, text: &str) -> QueryOptions {
        let mut options = QueryOptions::default();

        // 没有全文表达式时只能按时间排序
        options.sort_by = match last_value(args, "sort").as_deref() {
            Some("updated") => SortBy::UpdatedDesc,
            Some("relevance") if !text.is_empty() => SortBy::Relevance,
            _ if text.is_empty() => SortBy::UpdatedDesc,
            _ => SortBy::Relevance,
        };

        if let Some(limit) = last_value(args, "limit").and_then(|v| v.parse::<usize>().ok()) {
            if limit > 0 {
                options.limit = Some(limit);
            }
        }

        options
    }
}

fn last_value(args: &HashMap<String, Vec<String>>, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.last()).cloned()
}
