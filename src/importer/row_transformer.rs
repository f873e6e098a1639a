// ==========================================
// 后台导入系统 - 行转换器实现
// ==========================================
// 阶段 3: 原始行 + 映射 + 字段类型 → 转换后的行
// 规则:
// - number: 首个逗号换成点，再按浮点解析；非数值 → NaN（不在此阶段拒绝）
// - boolean: 忽略大小写属于 {true, 1, sim, yes} → true，否则 false
// - date / string: 原样透传
// 纯函数，可在映射变更后重复执行，无需重新解析文件
// ==========================================

use crate::domain::{ColumnMappings, FieldSchema, FieldType, FieldValue, RawRow, TransformedRow};
use std::collections::BTreeMap;

const TRUTHY: [&str; 4] = ["true", "1", "sim", "yes"];

pub struct RowTransformer;

impl RowTransformer {
    /// 转换全部行（row_number 从 1 开始）
    pub fn transform(
        &self,
        rows: &[RawRow],
        mappings: &ColumnMappings,
        schema: &FieldSchema,
    ) -> Vec<TransformedRow> {
        rows.iter()
            .enumerate()
            .map(|(idx, row)| self.transform_row(idx + 1, row, mappings, schema))
            .collect()
    }

    pub fn transform_row(
        &self,
        row_number: usize,
        row: &RawRow,
        mappings: &ColumnMappings,
        schema: &FieldSchema,
    ) -> TransformedRow {
        let mut values = BTreeMap::new();

        for mapping in mappings.iter() {
            // 映射指向的字段不在 schema 中时按文本处理
            let field_type = schema
                .get(&mapping.db_field)
                .map(|f| f.field_type)
                .unwrap_or(FieldType::String);

            let raw = row.get(&mapping.csv_column).map(|s| s.as_str());
            values.insert(mapping.db_field.clone(), self.coerce(raw, field_type));
        }

        TransformedRow { row_number, values }
    }

    /// 单元格类型转换
    pub fn coerce(&self, raw: Option<&str>, field_type: FieldType) -> FieldValue {
        match field_type {
            FieldType::Boolean => FieldValue::Boolean(parse_bool(raw.unwrap_or(""))),
            FieldType::Number => match raw {
                Some(v) if !v.trim().is_empty() => FieldValue::Number(parse_number(v)),
                _ => FieldValue::Null,
            },
            FieldType::String | FieldType::Date => match raw {
                Some(v) => FieldValue::Text(v.to_string()),
                None => FieldValue::Null,
            },
        }
    }
}

/// 逗号小数 → 浮点
///
/// 首个 `,` 替换为 `.` 后取最长的合法数值前缀（"12 kg" → 12，"1,2,3" → 1.2）；
/// 没有数值前缀或结果非有限值时返回 NaN
pub fn parse_number(raw: &str) -> f64 {
    let normalized = raw.trim().replacen(',', ".", 1);
    let prefix = &normalized[..numeric_prefix_len(normalized.as_bytes())];

    match prefix.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => f64::NAN,
    }
}

/// 数值前缀长度: [+-] 数字 [. 数字] [e [+-] 数字]，尾数至少一位数字
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }

    let int_end = digits_from(i);
    let mut end = int_end;
    let mut mantissa_digits = int_end - i;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }

    if mantissa_digits == 0 {
        return 0;
    }

    // 指数部分必须带数字才计入
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut j = end + 1;
        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            end = exp_end;
        }
    }

    end
}

pub fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_lowercase();
    TRUTHY.contains(&lowered.as_str())
}
