// ==========================================
// 后台导入系统 - 导入管道 Trait
// ==========================================
// 职责: 定义文件解析与外部导入调用接口（不包含实现）
// ==========================================

use crate::domain::{ImportRequest, ImportResult, ParsedCsv};
use crate::importer::error::PipelineResult;
use async_trait::async_trait;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 上传文件内容 → 表头 + 原始行
// 实现者: CsvParser
pub trait FileParser: Send + Sync {
    /// 解析文件内容
    ///
    /// # 参数
    /// - bytes: 文件原始字节（只读，不做修改）
    ///
    /// # 返回
    /// - Ok(ParsedCsv): 表头与数据行
    /// - Err(CsvParseError / EmptyFile / NoHeaders): 三类输入拒绝
    fn parse(&self, bytes: &[u8]) -> PipelineResult<ParsedCsv>;
}

// ==========================================
// RecordImporter Trait
// ==========================================
// 用途: 外部存储的批量导入调用（编排器只负责等待与超时竞速）
// 实现者: SqliteRecordStore，或调用方提供的 HTTP 客户端
#[async_trait]
pub trait RecordImporter: Send + Sync {
    /// 导入一批转换后的行
    ///
    /// # 参数
    /// - request: 批次令牌 + 转换后的行 + 冻结的映射
    ///
    /// # 返回
    /// - Ok(ImportResult): 存储端的结构化结果（可含逐行错误）
    /// - Err: 调用整体失败，编排器会转换为失败结果
    async fn import_batch(&self, request: ImportRequest) -> PipelineResult<ImportResult>;
}
