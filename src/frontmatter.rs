// frontmatter.rs - 元数据头解析与序列化
//! 内容文件格式: 以 `---` 行包围的 YAML 元数据头，后面跟正文。
//!
//! ```text
//! ---
//! title: Code Review
//! model: gpt-4
//! tags: [review, rust]
//! version: '1.0'
//! ---
//! 正文...
//! ```
//!
//! 分类不写入元数据头，只由目录位置决定。

use serde_json::{Map, Value};

const FENCE: &str = "---";

/// 元数据头中已知的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptMeta {
    pub title: Option<String>,
    pub model: Option<String>,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub version: Option<String>,
    /// 未识别的键，重写文件时原样保留
    pub extra: Map<String, Value>,
}

/// 解析后的内容文件
#[derive(Debug, Clone)]
pub struct ParsedContent {
    pub meta: PromptMeta,
    /// 元数据头原文的 JSON 形式
    pub raw: Map<String, Value>,
    pub body: String,
}

/// 解析内容文件文本；错误信息由调用方包装成 `MalformedMetadata`
pub fn parse(text: &str) -> Result<ParsedContent, String> {
    let (header, body) = split_header(text)?;

    let raw = match header {
        None => Map::new(),
        Some(header) => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(header).map_err(|e| format!("invalid YAML header: {e}"))?;
            match serde_json::to_value(&yaml).map_err(|e| e.to_string())? {
                Value::Null => Map::new(),
                Value::Object(map) => map,
                _ => return Err("metadata header is not a key-value mapping".to_string()),
            }
        }
    };

    Ok(ParsedContent {
        meta: PromptMeta::from_map(&raw),
        raw,
        body: body.to_string(),
    })
}

/// 序列化为规范格式: `---\n<yaml>---\n<body>`，正文以换行结尾
pub fn render(meta: &PromptMeta, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(&Value::Object(meta.to_map()))?;

    let mut out = String::with_capacity(yaml.len() + body.len() + 8);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&yaml);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// 版本号加 0.1，保留一位小数；无法解析时从 1.0 起算
pub fn bump_version(version: Option<&str>) -> String {
    let current = version
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(1.0);
    format!("{:.1}", current + 0.1)
}

impl PromptMeta {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut extra = map.clone();
        for key in ["title", "model", "tags", "created", "updated", "version"] {
            extra.remove(key);
        }

        Self {
            title: map.get("title").and_then(scalar_string),
            model: map.get("model").and_then(scalar_string),
            tags: normalize_tags(map.get("tags")),
            created: map.get("created").and_then(scalar_string),
            updated: map.get("updated").and_then(scalar_string),
            version: map.get("version").and_then(scalar_string),
            extra,
        }
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        let known = [
            ("title", &self.title),
            ("model", &self.model),
            ("created", &self.created),
            ("updated", &self.updated),
            ("version", &self.version),
        ];
        for (key, value) in known {
            if let Some(v) = value {
                map.insert(key.to_string(), Value::String(v.clone()));
            }
        }
        map.insert(
            "tags".to_string(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );
        map
    }
}

/// 标签规范化为扁平有序列表: YAML 列表或逗号分隔字符串
pub fn normalize_tags(value: Option<&Value>) -> Vec<String> {
    let tags: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn split_header(text: &str) -> Result<(Option<&str>, &str), String> {
    let (first, rest) = match text.find('\n') {
        Some(i) => (&text[..i], &text[i + 1..]),
        None => (text, ""),
    };
    if first.trim_end_matches('\r') != FENCE {
        return Ok((None, text));
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == FENCE {
            return Ok((Some(&rest[..offset]), &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err("unterminated metadata header".to_string())
}
