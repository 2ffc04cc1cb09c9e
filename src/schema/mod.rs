// schema/mod.rs - Schema 定义模块
//! 定义索引的 Schema 结构和记录类型

mod record;
pub mod fields;

pub use record::*;
pub use fields::*;

use tantivy::schema::{Schema, SchemaBuilder, TextOptions, TextFieldIndexing, IndexRecordOption, FAST, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer};
use tantivy_jieba::JiebaTokenizer;
use tantivy::Index;

/// 全文字段使用的分词器名
pub const TOKENIZER: &str = "jieba_lower";

/// 创建记录 Schema
///
/// 标题和正文走全文索引；id、路径、分类、模型、标签是精确匹配字段；
/// 时间戳存为毫秒并建 FAST 列用于排序。
pub fn build_schema() -> Schema {
    let mut schema_builder = SchemaBuilder::default();

    // 文本索引选项（带分词）
    let text_options = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions)
        )
        .set_stored();

    // === 标识字段 ===
    schema_builder.add_text_field(FIELD_ID, STRING | STORED);
    schema_builder.add_text_field(FIELD_FILE_PATH, STRING | STORED);

    // === 全文字段 ===
    schema_builder.add_text_field(FIELD_TITLE, text_options.clone());
    schema_builder.add_text_field(FIELD_CONTENT, text_options);

    // === 过滤字段 ===
    schema_builder.add_text_field(FIELD_CATEGORY, STRING | STORED);
    schema_builder.add_text_field(FIELD_MODEL, STRING | STORED);
    schema_builder.add_text_field(FIELD_TAGS, STRING | STORED);

    // === 仅存储 ===
    schema_builder.add_text_field(FIELD_METADATA, STORED);
    schema_builder.add_text_field(FIELD_CHECKSUM, STORED);

    // === 时间字段 ===
    schema_builder.add_i64_field(FIELD_LAST_MODIFIED, FAST | STORED);
    schema_builder.add_i64_field(FIELD_CREATED_AT, FAST | STORED);
    schema_builder.add_i64_field(FIELD_UPDATED_AT, FAST | STORED);

    schema_builder.build()
}

/// 注册分词器到索引
pub fn register_tokenizers(index: &Index) {
    let analyzer = TextAnalyzer::builder(JiebaTokenizer {})
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(TOKENIZER, analyzer);
}
