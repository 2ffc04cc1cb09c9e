// schema/record.rs - 索引记录结构定义
//! 一个内容文件在索引中的镜像

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// 提示词记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// 不透明 id，更新时保持不变
    pub id: String,
    /// 相对内容根目录的路径，唯一
    pub file_path: String,
    pub title: String,
    pub content: String,
    /// 由路径推导，不是独立的数据来源
    pub category: String,
    pub model: Option<String>,
    pub tags: Vec<String>,
    /// 元数据头原文（JSON 文本）
    pub metadata: String,
    /// 上次成功索引时文件字节的校验和
    pub checksum: String,
    pub last_modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptRecord {
    /// 获取标签字符串（逗号分隔）
    pub fn tags_string(&self) -> String {
        self.tags.join(", ")
    }

    /// 解析存储的元数据头
    pub fn metadata_map(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::from_str(&self.metadata).unwrap_or_default()
    }
}
