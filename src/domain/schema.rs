// ==========================================
// 后台导入系统 - 目标字段模型
// ==========================================
// 职责: 描述一次导入会话要填充的目标字段（键/名称/必填/类型）
// 生命周期: 由调用方按实体提供，会话内不可变
// ==========================================

use crate::importer::error::{ImportError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ==========================================
// FieldType - 字段值类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,  // 文本，原样透传
    Number,  // 数值，逗号小数 → 浮点
    Date,    // 日期，原样透传（由存储端校验）
    Boolean, // 布尔，true/1/sim/yes
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// FieldDescriptor - 目标字段描述
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub key: String,   // 字段键（schema 内唯一）
    pub label: String, // 显示名称
    #[serde(default)]
    pub required: bool, // 是否必填
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(key: &str, label: &str, required: bool, field_type: FieldType) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            required,
            field_type,
        }
    }

    /// 映射界面使用的显示名称（必填字段带 `*`）
    pub fn display_label(&self) -> String {
        if self.required {
            format!("{} *", self.label)
        } else {
            self.label.clone()
        }
    }
}

// ==========================================
// FieldSchema - 有序字段列表
// ==========================================
// 不变量: 非空、key 非空且唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldSchema {
    fields: Vec<FieldDescriptor>,
}

impl FieldSchema {
    /// 校验并构造字段列表
    ///
    /// # 返回
    /// - Err(InvalidSchema): 字段列表为空、存在空 key 或重复 key
    pub fn new(fields: Vec<FieldDescriptor>) -> PipelineResult<Self> {
        if fields.is_empty() {
            return Err(ImportError::InvalidSchema("字段列表为空".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            let key = field.key.trim();
            if key.is_empty() {
                return Err(ImportError::InvalidSchema(format!(
                    "字段 key 为空 (label: {})",
                    field.label
                )));
            }
            if !seen.insert(key.to_string()) {
                return Err(ImportError::InvalidSchema(format!("字段 key 重复: {}", key)));
            }
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'de> Deserialize<'de> for FieldSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let fields = Vec::<FieldDescriptor>::deserialize(deserializer)?;
        FieldSchema::new(fields).map_err(serde::de::Error::custom)
    }
}

// ==========================================
// ImportTarget - 导入目标实体
// ==========================================
// 用途: 命令行驱动与参考存储的配置文件格式
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTarget {
    pub entity: String,                  // 实体名（如 clientes / skus）
    #[serde(default)]
    pub unique_key: Option<String>,      // 判重字段（如 nome / id）
    pub fields: FieldSchema,
    #[serde(default)]
    pub sample_data: Vec<serde_json::Map<String, serde_json::Value>>, // 示例行
}
