// ==========================================
// 后台导入系统 - 示例 CSV 生成
// ==========================================
// 表头: 字段 label；数据: 示例行按字段顺序取值
// 含逗号/引号/换行的值加双引号
// ==========================================

use crate::domain::FieldSchema;
use crate::importer::error::{ImportError, PipelineResult};
use csv::{QuoteStyle, WriterBuilder};
use serde_json::{Map, Value};

pub struct SampleExporter;

impl SampleExporter {
    /// 示例文件名: `<模块>_exemplo.csv`
    pub fn file_name(&self, module_name: &str) -> String {
        format!("{}_exemplo.csv", module_name)
    }

    /// 生成示例 CSV 文本（行分隔符 `\n`）
    pub fn render(&self, schema: &FieldSchema, samples: &[Map<String, Value>]) -> PipelineResult<String> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(schema.fields().iter().map(|f| f.label.as_str()))?;

        for sample in samples {
            let cells: Vec<String> = schema
                .fields()
                .iter()
                .map(|f| cell_text(sample.get(&f.key)))
                .collect();
            writer.write_record(&cells)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ImportError::InternalError(format!("示例 CSV 写入失败: {}", e)))?;

        let mut text = String::from_utf8(bytes)
            .map_err(|e| ImportError::InternalError(format!("示例 CSV 编码错误: {}", e)))?;
        if text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }
}

/// 示例值 → 单元格文本（缺失/null 为空串）
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
