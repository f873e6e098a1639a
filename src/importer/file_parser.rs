// ==========================================
// 后台导入系统 - CSV 解析器实现
// ==========================================
// 阶段 1: 文件类型检查 → 读取表头 → 读取数据行
// 规则: 首个非空行为表头；空行跳过；单元格 TRIM；UTF-8
// ==========================================

use crate::domain::{ParsedCsv, RawRow};
use crate::importer::error::{ImportError, PipelineResult};
use crate::importer::import_trait::FileParser;
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 上传前的类型检查（扩展名 .csv 或 MIME text/csv 任一满足即可）
    pub fn check_file_type(name: &str, mime: Option<&str>) -> PipelineResult<()> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let mime_ok = mime
            .map(|m| m.trim().to_lowercase().starts_with("text/csv"))
            .unwrap_or(false);

        if ext == "csv" || mime_ok {
            return Ok(());
        }

        let described = match (mime, ext.is_empty()) {
            (Some(m), _) if !m.trim().is_empty() => m.trim().to_string(),
            (_, false) => ext,
            _ => name.to_string(),
        };
        Err(ImportError::UnsupportedFormat(described))
    }

    /// 从磁盘读取并解析（命令行驱动使用）
    pub fn parse_path<P: AsRef<Path>>(&self, file_path: P) -> PipelineResult<ParsedCsv> {
        let path = file_path.as_ref();

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileReadError(format!(
                "文件不存在: {}",
                path.display()
            )));
        }

        Self::check_file_type(&path.to_string_lossy(), None)?;

        let bytes = fs::read(path)?;
        self.parse(&bytes)
    }
}

impl FileParser for CsvParser {
    fn parse(&self, bytes: &[u8]) -> PipelineResult<ParsedCsv> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        // 列名为 None 表示该列表头为空，忽略整列
        let mut columns: Option<Vec<Option<String>>> = None;
        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for result in reader.records() {
            let record = result?;

            if is_blank_line(&record) {
                skipped += 1;
                continue;
            }

            let cols = match &columns {
                None => {
                    columns = Some(build_headers(&record));
                    continue;
                }
                Some(cols) => cols,
            };

            let mut row = RawRow::new();
            for (idx, value) in record.iter().enumerate() {
                if let Some(Some(header)) = cols.get(idx) {
                    row.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row.values().all(|v| v.is_empty()) {
                skipped += 1;
                continue;
            }

            rows.push(row);
        }

        let headers: Vec<String> = match columns {
            Some(cols) => cols.into_iter().flatten().collect(),
            None => return Err(ImportError::EmptyFile),
        };

        if headers.is_empty() {
            return Err(ImportError::NoHeaders);
        }
        if rows.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        debug!(
            headers = headers.len(),
            rows = rows.len(),
            skipped = skipped,
            "CSV 解析完成"
        );

        Ok(ParsedCsv { headers, rows })
    }
}

/// 空行: 仅一个单元格且为空白
fn is_blank_line(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// 表头 TRIM；空表头忽略；重名表头追加 _1/_2 后缀
fn build_headers(record: &StringRecord) -> Vec<Option<String>> {
    let mut seen = HashSet::new();

    record
        .iter()
        .map(|raw| {
            let name = raw.trim();
            if name.is_empty() {
                return None;
            }

            let mut candidate = name.to_string();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}_{}", name, suffix);
                suffix += 1;
            }
            Some(candidate)
        })
        .collect()
}
