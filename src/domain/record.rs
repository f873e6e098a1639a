// ==========================================
// 后台导入系统 - 行记录模型
// ==========================================
// 职责: 原始行 / 类型转换后行 / 上传文件 的数据结构
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 原始行: 表头 → 原始字符串（缺失单元格不出现在 map 中）
pub type RawRow = HashMap<String, String>;

// ==========================================
// UploadedFile - 上传文件
// ==========================================
// 用途: 文件选择/拖拽后交给编排器的内容
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,         // 文件名（含扩展名）
    pub mime: Option<String>, // 浏览器上报的 MIME 类型
    pub bytes: Vec<u8>,       // 文件内容（只读）
}

impl UploadedFile {
    pub fn new(name: &str, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime: mime.map(|m| m.to_string()),
            bytes,
        }
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            size_bytes: self.bytes.len(),
        }
    }
}

/// 会话内保留的文件元信息（内容解析后即释放）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size_bytes: usize,
}

// ==========================================
// ParsedCsv - 解析结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub headers: Vec<String>, // 已 trim、已去重命名
    pub rows: Vec<RawRow>,    // 数据行（已跳过空行）
}

// ==========================================
// FieldValue - 转换后的字段值
// ==========================================
// 注意: Number 可能为 NaN，由存储端逐行拒绝
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// 空值判定: Null 或空白文本
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 转为 JSON 值（NaN 无法表示，返回 None）
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            FieldValue::Null => Some(serde_json::Value::Null),
            FieldValue::Text(s) => Some(serde_json::Value::String(s.clone())),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number),
            FieldValue::Boolean(b) => Some(serde_json::Value::Bool(*b)),
        }
    }
}

// ==========================================
// TransformedRow - 类型转换后的行
// ==========================================
// 键为目标字段 key，不再是 CSV 表头
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformedRow {
    pub row_number: usize, // 数据行序号（从 1 开始，不含表头）
    pub values: BTreeMap<String, FieldValue>,
}

impl TransformedRow {
    pub fn get(&self, db_field: &str) -> Option<&FieldValue> {
        self.values.get(db_field)
    }
}
