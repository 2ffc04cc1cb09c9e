// schema/fields.rs - 字段名常量定义
//! 统一管理所有 Schema 字段名，避免魔法字符串

/// 记录 id
pub const FIELD_ID: &str = "id";
/// 相对内容根目录的文件路径（唯一键）
pub const FIELD_FILE_PATH: &str = "file_path";
/// 标题
pub const FIELD_TITLE: &str = "title";
/// 正文
pub const FIELD_CONTENT: &str = "content";
/// 分类（由目录位置推导）
pub const FIELD_CATEGORY: &str = "category";
/// 模型
pub const FIELD_MODEL: &str = "model";
/// 标签
pub const FIELD_TAGS: &str = "tags";
/// 元数据头原文（JSON）
pub const FIELD_METADATA: &str = "metadata";
/// 文件字节的校验和
pub const FIELD_CHECKSUM: &str = "checksum";
/// 文件修改时间（毫秒时间戳）
pub const FIELD_LAST_MODIFIED: &str = "last_modified";
/// 记录创建时间
pub const FIELD_CREATED_AT: &str = "created_at";
/// 记录更新时间
pub const FIELD_UPDATED_AT: &str = "updated_at";
