// ==========================================
// 后台导入系统 - 列映射模型
// ==========================================
// 职责: CSV 列 → 目标字段 的映射集合
// 不变量: 每个 csv_column 至多一条；每个 db_field 至多被一列映射
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// ColumnMapping - 单条列映射
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub csv_column: String, // CSV 表头
    pub db_field: String,   // 目标字段 key
    pub required: bool,     // 映射时刻的必填标记（冗余副本）
}

// ==========================================
// ColumnMappings - 映射集合
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMappings {
    entries: Vec<ColumnMapping>,
}

impl ColumnMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入映射
    ///
    /// - 同一列已有映射: 原位覆盖
    /// - 目标字段已被其他列占用: 移除旧映射（字段只能来自一列）
    ///
    /// # 返回
    /// - Some(String): 被挤掉的旧列名
    pub fn upsert(&mut self, mapping: ColumnMapping) -> Option<String> {
        let displaced = self
            .entries
            .iter()
            .position(|m| m.db_field == mapping.db_field && m.csv_column != mapping.csv_column)
            .map(|idx| self.entries.remove(idx).csv_column);

        match self
            .entries
            .iter_mut()
            .find(|m| m.csv_column == mapping.csv_column)
        {
            Some(existing) => *existing = mapping,
            None => self.entries.push(mapping),
        }

        displaced
    }

    /// 删除某列的映射，返回是否存在
    pub fn remove(&mut self, csv_column: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|m| m.csv_column != csv_column);
        self.entries.len() != before
    }

    pub fn for_column(&self, csv_column: &str) -> Option<&ColumnMapping> {
        self.entries.iter().find(|m| m.csv_column == csv_column)
    }

    pub fn for_field(&self, db_field: &str) -> Option<&ColumnMapping> {
        self.entries.iter().find(|m| m.db_field == db_field)
    }

    pub fn is_field_mapped(&self, db_field: &str) -> bool {
        self.for_field(db_field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[ColumnMapping] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<ColumnMapping> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
